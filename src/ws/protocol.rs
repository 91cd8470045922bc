//! WebSocket feed message definitions
//! These are the wire types for race spectators and participants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::race::{ParticipantId, RaceEvent};
use crate::store::ParticipantLabel;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Narrow the feed to one match, or widen it again with `None`
    Watch { match_id: Option<Uuid> },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        participant: ParticipantId,
        server_time: u64,
    },

    /// Events from one resolved tick
    RaceUpdate {
        match_id: Uuid,
        tick: u64,
        participants: [ParticipantLabel; 2],
        events: Vec<RaceEvent>,
        /// Rendered text, one line per event
        lines: Vec<String>,
        emitted_at: DateTime<Utc>,
    },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    /// Match this message belongs to, if any
    pub fn match_id(&self) -> Option<Uuid> {
        match self {
            Self::RaceUpdate { match_id, .. } => Some(*match_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"watch","match_id":null}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Watch { match_id: None }));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"ping","t":17}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Ping { t: 17 }));
    }

    #[test]
    fn pong_serializes_with_tag() {
        let json = serde_json::to_value(ServerMsg::Pong { t: 5 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "pong", "t": 5}));
    }
}
