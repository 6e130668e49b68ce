use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use corsair_domain::entities::RuntimeConfig;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".to_string(),
            discord_api_base: "https://discord.com/api/v10".to_string(),
            bot_token: String::new(),
            persistence_base_url: "http://127.0.0.1:8320".to_string(),
            persistence_token: None,
            oracle_url: None,
            oracle_model: "gpt-4o-mini".to_string(),
            oracle_min_confidence: 0.6,
            price_api_url: "http://127.0.0.1:8320/prices".to_string(),
            price_refresh_seconds: 900,
            resolver_min_score: 0.58,
            session_ttl_minutes: 30,
            privileged_role_ids: Vec::new(),
            request_timeout_seconds: 15,
        }
    }
}

impl AppConfig {
    pub async fn load(path_override: Option<&str>) -> Result<Self> {
        let path = match path_override {
            Some(path) => path.to_string(),
            None => env::var("CORSAIR_CONFIG").unwrap_or_else(|_| "./config.toml".to_string()),
        };
        let file_path = Path::new(&path);
        if !file_path.exists() {
            warn!("config.toml not found, using defaults");
            let mut config = AppConfig::default();
            config.apply_env_overrides();
            config.normalize();
            config.validate()?;
            return Ok(config);
        }
        let content = fs::read_to_string(file_path).await?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn normalize(&mut self) {
        if let Some(token) = &self.persistence_token {
            if token.trim().is_empty() {
                self.persistence_token = None;
            }
        }
        if let Some(url) = &self.oracle_url {
            if url.trim().is_empty() {
                self.oracle_url = None;
            }
        }
        self.persistence_base_url = self.persistence_base_url.trim_end_matches('/').to_string();
        self.discord_api_base = self.discord_api_base.trim_end_matches('/').to_string();
        self.privileged_role_ids =
            normalize_id_list(std::mem::take(&mut self.privileged_role_ids));
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(anyhow!("bot_token must not be empty"));
        }
        if !self.gateway_url.starts_with("ws://") && !self.gateway_url.starts_with("wss://") {
            return Err(anyhow!("gateway_url must be a websocket url"));
        }
        if self.persistence_base_url.trim().is_empty() {
            return Err(anyhow!("persistence_base_url must not be empty"));
        }
        if self.price_api_url.trim().is_empty() {
            return Err(anyhow!("price_api_url must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.oracle_min_confidence) {
            return Err(anyhow!("oracle_min_confidence must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&self.resolver_min_score) {
            return Err(anyhow!("resolver_min_score must be within 0..=1"));
        }
        if self.session_ttl_minutes <= 0 {
            return Err(anyhow!("session_ttl_minutes must be greater than 0"));
        }
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            gateway_url: self.gateway_url.clone(),
            discord_api_base: self.discord_api_base.clone(),
            bot_token: self.bot_token.clone(),
            persistence_base_url: self.persistence_base_url.clone(),
            persistence_token: self.persistence_token.clone(),
            oracle_url: self.oracle_url.clone(),
            oracle_model: self.oracle_model.clone(),
            oracle_min_confidence: self.oracle_min_confidence,
            price_api_url: self.price_api_url.clone(),
            price_refresh_seconds: self.price_refresh_seconds,
            resolver_min_score: self.resolver_min_score,
            session_ttl_minutes: self.session_ttl_minutes,
            privileged_role_ids: self.privileged_role_ids.clone(),
            request_timeout_seconds: self.request_timeout_seconds,
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("CORSAIR_GATEWAY_URL") {
            self.gateway_url = value;
        }
        if let Ok(value) = env::var("CORSAIR_DISCORD_API_BASE") {
            self.discord_api_base = value;
        }
        if let Ok(value) = env::var("CORSAIR_BOT_TOKEN") {
            self.bot_token = value;
        }
        if let Ok(value) = env::var("CORSAIR_PERSISTENCE_BASE_URL") {
            self.persistence_base_url = value;
        }
        if let Ok(value) = env::var("CORSAIR_PERSISTENCE_TOKEN") {
            self.persistence_token = Some(value);
        }
        if let Ok(value) = env::var("CORSAIR_ORACLE_URL") {
            self.oracle_url = Some(value);
        }
        if let Ok(value) = env::var("CORSAIR_ORACLE_MODEL") {
            self.oracle_model = value;
        }
        if let Ok(value) = env::var("CORSAIR_ORACLE_MIN_CONFIDENCE") {
            self.oracle_min_confidence = value.parse().unwrap_or(self.oracle_min_confidence);
        }
        if let Ok(value) = env::var("CORSAIR_PRICE_API_URL") {
            self.price_api_url = value;
        }
        if let Ok(value) = env::var("CORSAIR_PRICE_REFRESH_SECONDS") {
            self.price_refresh_seconds = value.parse().unwrap_or(self.price_refresh_seconds);
        }
        if let Ok(value) = env::var("CORSAIR_RESOLVER_MIN_SCORE") {
            self.resolver_min_score = value.parse().unwrap_or(self.resolver_min_score);
        }
        if let Ok(value) = env::var("CORSAIR_SESSION_TTL_MINUTES") {
            self.session_ttl_minutes = value.parse().unwrap_or(self.session_ttl_minutes);
        }
        if let Ok(value) = env::var("CORSAIR_PRIVILEGED_ROLE_IDS") {
            self.privileged_role_ids = parse_env_id_list(&value);
        }
        if let Ok(value) = env::var("CORSAIR_REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = value.parse().unwrap_or(self.request_timeout_seconds);
        }
    }
}

fn parse_env_id_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn normalize_id_list(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = values
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}
