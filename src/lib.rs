//! Race Server - authoritative server for two-party roster races
//!
//! Participants challenge each other, pick rosters of units, lock in, and the
//! server resolves one turn per interval until someone crosses the finish
//! line, both rosters are spent, or a participant forfeits. Progress goes out
//! over a WebSocket feed; wins are tallied in a persistent ledger.

pub mod app;
pub mod config;
pub mod http;
pub mod lobby;
pub mod notify;
pub mod race;
pub mod store;
pub mod util;
pub mod ws;
