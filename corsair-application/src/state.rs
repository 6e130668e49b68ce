use std::sync::Arc;

use corsair_domain::entities::RuntimeConfig;
use corsair_domain::ports::{
    ExtractionOracle, HitRepository, PricingPort, RosterPort, ThreadNotifier,
};
use tokio::sync::Mutex;

use crate::sessions::SessionStore;
use crate::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub hits: Arc<dyn HitRepository>,
    pub pricing: Arc<dyn PricingPort>,
    pub oracle: Arc<dyn ExtractionOracle>,
    pub roster: Arc<dyn RosterPort>,
    pub notifier: Arc<dyn ThreadNotifier>,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub metrics: Arc<Metrics>,
}
