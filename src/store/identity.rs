//! Participant display-name resolution

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::client::{DirectoryClient, DirectoryError};
use crate::race::ParticipantId;

/// Identity lookup failure (never fatal to a race)
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Participant {0} is unknown")]
    Unknown(ParticipantId),

    #[error("Identity lookup failed: {0}")]
    Lookup(#[from] DirectoryError),
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn display_name(&self, participant: ParticipantId) -> Result<String, IdentityError>;
}

/// Name to show for a participant in events and listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantLabel {
    pub participant: ParticipantId,
    pub display_name: String,
    /// False when the placeholder name is in use
    pub resolved: bool,
}

impl ParticipantLabel {
    pub fn placeholder(participant: ParticipantId) -> Self {
        Self {
            participant,
            display_name: format!("Participant {}", participant),
            resolved: false,
        }
    }
}

/// Resolve a label, falling back to a placeholder on failure
pub async fn resolve_label(resolver: &dyn IdentityResolver, participant: ParticipantId) -> ParticipantLabel {
    match resolver.display_name(participant).await {
        Ok(display_name) => ParticipantLabel {
            participant,
            display_name,
            resolved: true,
        },
        Err(e) => {
            warn!(participant = %participant, error = %e, "Identity resolution failed, using placeholder");
            ParticipantLabel::placeholder(participant)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ParticipantRecord {
    display_name: String,
}

/// Resolver backed by the directory service
pub struct HttpIdentityResolver {
    client: DirectoryClient,
}

impl HttpIdentityResolver {
    pub fn new(client: DirectoryClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn display_name(&self, participant: ParticipantId) -> Result<String, IdentityError> {
        let id = participant.to_string();
        let record: Option<ParticipantRecord> = self
            .client
            .get_one(&["participants", id.as_str()], &[])
            .await?;
        record
            .map(|r| r.display_name)
            .ok_or(IdentityError::Unknown(participant))
    }
}

/// Fixed name table; unknown participants fail resolution
#[derive(Debug, Default)]
pub struct StaticIdentityResolver {
    names: HashMap<ParticipantId, String>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, participant: ParticipantId, name: impl Into<String>) -> Self {
        self.names.insert(participant, name.into());
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn display_name(&self, participant: ParticipantId) -> Result<String, IdentityError> {
        self.names
            .get(&participant)
            .cloned()
            .ok_or(IdentityError::Unknown(participant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unresolved_participant_gets_placeholder() {
        let resolver = StaticIdentityResolver::new().with_name(ParticipantId(1), "Ada");

        let known = resolve_label(&resolver, ParticipantId(1)).await;
        assert_eq!(known.display_name, "Ada");
        assert!(known.resolved);

        let unknown = resolve_label(&resolver, ParticipantId(2)).await;
        assert_eq!(unknown, ParticipantLabel::placeholder(ParticipantId(2)));
        assert_eq!(unknown.display_name, "Participant 2");
    }
}
