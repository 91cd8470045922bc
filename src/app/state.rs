//! Application state shared across routes

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::lobby::LobbyService;
use crate::notify::BroadcastNotifier;
use crate::race::{MatchScheduler, MatchTable, ParticipantRegistry};
use crate::store::{
    DirectoryClient, HttpIdentityResolver, HttpUnitCatalog, IdentityResolver,
    StaticIdentityResolver, StaticUnitCatalog, UnitCatalog, WinCounter, WinLedger,
};
use crate::util::rate_limit::CommandLimiter;

/// Buffered feed messages per subscriber
const FEED_CAPACITY: usize = 256;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub table: Arc<MatchTable>,
    pub registry: Arc<ParticipantRegistry>,
    pub scheduler: Arc<MatchScheduler>,
    pub lobby: Arc<LobbyService>,
    pub wins: Arc<dyn WinCounter>,
    pub identities: Arc<dyn IdentityResolver>,
    pub feed: BroadcastNotifier,
    pub limiter: CommandLimiter,
}

impl AppState {
    /// Wire up collaborators from configuration
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let directory = match &config.directory_url {
            Some(url) => Some(DirectoryClient::new(url, config.directory_api_key.clone())?),
            None => None,
        };

        let catalog: Arc<dyn UnitCatalog> = match (&directory, &config.units_file) {
            (Some(client), _) => {
                info!("Using directory service for unit lookups");
                Arc::new(HttpUnitCatalog::new(client.clone()))
            }
            (None, Some(path)) => {
                let catalog = StaticUnitCatalog::load(path).await?;
                info!(units = catalog.len(), path = %path.display(), "Loaded unit catalog");
                Arc::new(catalog)
            }
            (None, None) => {
                warn!("No DIRECTORY_URL or UNITS_FILE configured, every pick will fail");
                Arc::new(StaticUnitCatalog::new())
            }
        };

        let identities: Arc<dyn IdentityResolver> = match directory {
            Some(client) => Arc::new(HttpIdentityResolver::new(client)),
            None => Arc::new(StaticIdentityResolver::new()),
        };

        let wins = Arc::new(WinLedger::open(config.wins_file.clone()).await);

        Ok(Self::with_parts(config, catalog, identities, wins))
    }

    /// Assemble state around explicit collaborators
    pub fn with_parts(
        config: Config,
        catalog: Arc<dyn UnitCatalog>,
        identities: Arc<dyn IdentityResolver>,
        wins: Arc<dyn WinCounter>,
    ) -> Self {
        let config = Arc::new(config);
        let table = Arc::new(MatchTable::new());
        let registry = Arc::new(ParticipantRegistry::new());
        let feed = BroadcastNotifier::new(FEED_CAPACITY);

        let scheduler = Arc::new(MatchScheduler::new(
            table.clone(),
            registry.clone(),
            Arc::new(feed.clone()),
            wins.clone(),
            identities.clone(),
            config.turn_interval,
        ));

        let lobby = Arc::new(LobbyService::new(
            table.clone(),
            registry.clone(),
            scheduler.clone(),
            catalog,
        ));

        Self {
            config,
            table,
            registry,
            scheduler,
            lobby,
            wins,
            identities,
            feed,
            limiter: CommandLimiter::default(),
        }
    }
}
