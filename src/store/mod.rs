//! External collaborators: unit catalog, identity directory, win counter

pub mod catalog;
pub mod client;
pub mod identity;
pub mod wins;

pub use catalog::{CatalogError, HttpUnitCatalog, StaticUnitCatalog, UnitCatalog};
pub use client::DirectoryClient;
pub use identity::{
    resolve_label, HttpIdentityResolver, IdentityError, IdentityResolver, ParticipantLabel,
    StaticIdentityResolver,
};
pub use wins::{Standing, WinCounter, WinLedger, WinStoreError, LEADERBOARD_SIZE};
