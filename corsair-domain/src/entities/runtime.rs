/// Runtime configuration as seen by the application layer.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub gateway_url: String,
    pub discord_api_base: String,
    pub bot_token: String,
    pub persistence_base_url: String,
    pub persistence_token: Option<String>,
    pub oracle_url: Option<String>,
    pub oracle_model: String,
    pub oracle_min_confidence: f64,
    pub price_api_url: String,
    pub price_refresh_seconds: u64,
    pub resolver_min_score: f64,
    pub session_ttl_minutes: i64,
    pub privileged_role_ids: Vec<String>,
    pub request_timeout_seconds: u64,
}
