//! Event delivery to whoever is watching a race

pub mod render;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::race::RaceEvent;
use crate::store::ParticipantLabel;
use crate::ws::protocol::ServerMsg;

pub use render::{render_event, render_outcome};

/// Events from one tick (or a forfeit), in emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    pub match_id: Uuid,
    pub tick: u64,
    /// Party A first
    pub participants: [ParticipantLabel; 2],
    pub events: Vec<RaceEvent>,
    pub emitted_at: DateTime<Utc>,
}

impl EventBatch {
    pub fn lines(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|e| render_event(e, &self.participants))
            .collect()
    }
}

/// Delivery failures. Reported to the scheduler, never rolled back.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("No subscribers for match {0}")]
    NoSubscribers(Uuid),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, batch: &EventBatch) -> Result<(), NotifyError>;
}

/// Publishes batches on the in-process feed read by WebSocket sessions
#[derive(Clone)]
pub struct BroadcastNotifier {
    feed_tx: broadcast::Sender<ServerMsg>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (feed_tx, _) = broadcast::channel(capacity);
        Self { feed_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.feed_tx.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn deliver(&self, batch: &EventBatch) -> Result<(), NotifyError> {
        let lines = batch.lines();
        for line in &lines {
            debug!(match_id = %batch.match_id, tick = batch.tick, "{}", line);
        }

        let msg = ServerMsg::RaceUpdate {
            match_id: batch.match_id,
            tick: batch.tick,
            participants: batch.participants.clone(),
            events: batch.events.clone(),
            lines,
            emitted_at: batch.emitted_at,
        };

        self.feed_tx
            .send(msg)
            .map(|_| ())
            .map_err(|_| NotifyError::NoSubscribers(batch.match_id))
    }
}
