//! Unit attribute lookup

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::client::{DirectoryClient, DirectoryError};
use crate::race::{ParticipantId, Unit};

/// Catalog lookup errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Unit {0} not found")]
    NotFound(String),

    #[error("Unit catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<DirectoryError> for CatalogError {
    fn from(err: DirectoryError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Resolves a participant's unit reference into its race attributes
#[async_trait]
pub trait UnitCatalog: Send + Sync {
    async fn lookup(&self, owner: ParticipantId, unit_ref: &str) -> Result<Unit, CatalogError>;
}

/// Unit record as served by the directory and stored in unit files
#[derive(Debug, Clone, Deserialize)]
struct UnitRecord {
    id: String,
    name: String,
    attack: u32,
    health: u32,
    /// Restricts the unit to one owner when set
    #[serde(default)]
    owner: Option<ParticipantId>,
}

impl From<UnitRecord> for Unit {
    fn from(record: UnitRecord) -> Self {
        Unit::new(record.id, record.name, record.attack, record.health)
    }
}

/// Catalog backed by the directory service
pub struct HttpUnitCatalog {
    client: DirectoryClient,
}

impl HttpUnitCatalog {
    pub fn new(client: DirectoryClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UnitCatalog for HttpUnitCatalog {
    async fn lookup(&self, owner: ParticipantId, unit_ref: &str) -> Result<Unit, CatalogError> {
        let record: Option<UnitRecord> = self
            .client
            .get_one(&["units", unit_ref], &[("owner", owner.to_string())])
            .await?;
        record
            .map(Unit::from)
            .ok_or_else(|| CatalogError::NotFound(unit_ref.to_string()))
    }
}

/// Fixed in-memory catalog
#[derive(Debug, Default)]
pub struct StaticUnitCatalog {
    units: HashMap<String, (Unit, Option<ParticipantId>)>,
}

impl StaticUnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit any participant may pick
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.units.insert(unit.id.clone(), (unit, None));
        self
    }

    /// Register a unit only `owner` may pick
    pub fn with_owned_unit(mut self, owner: ParticipantId, unit: Unit) -> Self {
        self.units.insert(unit.id.clone(), (unit, Some(owner)));
        self
    }

    /// Load a JSON array of `{id, name, attack, health, owner?}`
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let records: Vec<UnitRecord> = serde_json::from_str(&raw)
            .map_err(|e| CatalogError::Unavailable(format!("{}: {}", path.display(), e)))?;

        let units = records
            .into_iter()
            .map(|r| {
                let owner = r.owner;
                (r.id.clone(), (Unit::from(r), owner))
            })
            .collect();
        Ok(Self { units })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[async_trait]
impl UnitCatalog for StaticUnitCatalog {
    async fn lookup(&self, owner: ParticipantId, unit_ref: &str) -> Result<Unit, CatalogError> {
        match self.units.get(unit_ref) {
            Some((unit, None)) => Ok(unit.clone()),
            Some((unit, Some(o))) if *o == owner => Ok(unit.clone()),
            _ => Err(CatalogError::NotFound(unit_ref.to_string())),
        }
    }
}
