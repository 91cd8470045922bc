//! Win counting and leaderboard

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::race::ParticipantId;

/// Default number of leaderboard rows
pub const LEADERBOARD_SIZE: usize = 10;

/// Win store errors
#[derive(Debug, thiserror::Error)]
pub enum WinStoreError {
    #[error("Failed to persist wins to {path}: {source}")]
    Persist {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to encode wins: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub rank: usize,
    pub participant: ParticipantId,
    pub wins: u64,
}

/// Counter store the engine reports match winners to
#[async_trait]
pub trait WinCounter: Send + Sync {
    /// Add one win, returning the new total
    async fn increment(&self, participant: ParticipantId) -> Result<u64, WinStoreError>;

    async fn wins(&self, participant: ParticipantId) -> Result<u64, WinStoreError>;

    /// Highest totals first, ties broken by participant id
    async fn leaderboard(&self, limit: usize) -> Result<Vec<Standing>, WinStoreError>;
}

/// In-memory win totals, optionally mirrored to a JSON file of
/// `{"<participant id>": wins}`
#[derive(Debug)]
pub struct WinLedger {
    counts: Mutex<HashMap<ParticipantId, u64>>,
    path: Option<PathBuf>,
}

impl WinLedger {
    pub fn in_memory() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            path: None,
        }
    }

    /// Open a file-backed ledger. A missing or unreadable file starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let counts = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => parse_counts(&raw, &path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read win file, starting empty");
                HashMap::new()
            }
        };

        debug!(path = %path.display(), participants = counts.len(), "Win ledger loaded");

        Self {
            counts: Mutex::new(counts),
            path: Some(path),
        }
    }

    async fn persist(&self, counts: &HashMap<ParticipantId, u64>) -> Result<(), WinStoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let on_disk: BTreeMap<String, u64> = counts
            .iter()
            .map(|(participant, wins)| (participant.to_string(), *wins))
            .collect();
        let json = serde_json::to_string(&on_disk)?;

        tokio::fs::write(path, json)
            .await
            .map_err(|source| WinStoreError::Persist {
                path: path.display().to_string(),
                source,
            })
    }
}

fn parse_counts(raw: &str, path: &std::path::Path) -> HashMap<ParticipantId, u64> {
    let parsed: BTreeMap<String, u64> = match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Win file is not valid JSON, starting empty");
            return HashMap::new();
        }
    };

    parsed
        .into_iter()
        .filter_map(|(key, wins)| match key.parse::<u64>() {
            Ok(id) => Some((ParticipantId(id), wins)),
            Err(_) => {
                warn!(key = %key, "Skipping malformed participant id in win file");
                None
            }
        })
        .collect()
}

#[async_trait]
impl WinCounter for WinLedger {
    async fn increment(&self, participant: ParticipantId) -> Result<u64, WinStoreError> {
        // held across the write so the file never lags a later increment
        let mut counts = self.counts.lock().await;
        let total = {
            let entry = counts.entry(participant).or_insert(0);
            *entry += 1;
            *entry
        };
        self.persist(&counts).await?;
        Ok(total)
    }

    async fn wins(&self, participant: ParticipantId) -> Result<u64, WinStoreError> {
        Ok(self.counts.lock().await.get(&participant).copied().unwrap_or(0))
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<Standing>, WinStoreError> {
        let counts = self.counts.lock().await;
        let mut rows: Vec<(ParticipantId, u64)> = counts
            .iter()
            .filter(|(_, wins)| **wins > 0)
            .map(|(p, w)| (*p, *w))
            .collect();
        drop(counts);

        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(rows
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (participant, wins))| Standing {
                rank: i + 1,
                participant,
                wins,
            })
            .collect())
    }
}
