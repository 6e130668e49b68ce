use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use corsair_application::sessions::SessionStore;
use corsair_application::{AppState, Metrics};
use corsair_infrastructure::{
    ApiHitRepository, ApiRosterClient, AppConfig, CachedPriceTable, DiscordThreadService,
    HttpExtractionOracle,
};

pub struct AppContext {
    pub state: AppState,
}

impl AppContext {
    pub async fn new() -> Result<Self> {
        let config = AppConfig::load(None).await?;
        let runtime_config = config.to_runtime_config();

        let state = AppState {
            hits: Arc::new(ApiHitRepository::new(&runtime_config)?),
            pricing: Arc::new(CachedPriceTable::new(&runtime_config)?),
            oracle: Arc::new(HttpExtractionOracle::new(&runtime_config)?),
            roster: Arc::new(ApiRosterClient::new(&runtime_config)?),
            notifier: Arc::new(DiscordThreadService::new(&runtime_config)?),
            sessions: Arc::new(Mutex::new(SessionStore::new())),
            metrics: Arc::new(Metrics::default()),
            config: runtime_config,
        };

        Ok(Self { state })
    }
}
