//! HTTP surface

pub mod middleware;
pub mod routes;

pub use middleware::{issue_token, verify_token, AuthenticatedParticipant, TokenClaims};
pub use routes::{build_router, AppError};
