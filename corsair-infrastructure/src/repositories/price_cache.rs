use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{info, warn};

use corsair_domain::entities::{PriceEntry, RuntimeConfig};
use corsair_domain::ports::PricingPort;

struct CachedTable {
    fetched_at: Instant,
    entries: Vec<PriceEntry>,
}

/// Refreshing cache over the terminal-price API. The table is hydrated on
/// first use and re-fetched once it is older than the refresh interval; a
/// failed refresh keeps serving the previous table.
pub struct CachedPriceTable {
    client: Client,
    url: String,
    refresh: Duration,
    inner: RwLock<Option<CachedTable>>,
}

impl CachedPriceTable {
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(3)))
            .build()?;
        Ok(Self {
            client,
            url: config.price_api_url.clone(),
            refresh: Duration::from_secs(config.price_refresh_seconds.max(60)),
            inner: RwLock::new(None),
        })
    }

    async fn hydrate(&self) -> Result<Vec<PriceEntry>> {
        let entries: Vec<PriceEntry> = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if entries.is_empty() {
            return Err(anyhow!("price table came back empty"));
        }
        info!(entries = entries.len(), "terminal price table refreshed");
        let mut guard = self.inner.write().await;
        *guard = Some(CachedTable {
            fetched_at: Instant::now(),
            entries: entries.clone(),
        });
        Ok(entries)
    }

    async fn cached_if_fresh(&self) -> Option<Vec<PriceEntry>> {
        let guard = self.inner.read().await;
        guard.as_ref().and_then(|table| {
            if is_stale(table.fetched_at, self.refresh) {
                None
            } else {
                Some(table.entries.clone())
            }
        })
    }

    async fn cached_any(&self) -> Option<Vec<PriceEntry>> {
        let guard = self.inner.read().await;
        guard.as_ref().map(|table| table.entries.clone())
    }
}

fn is_stale(fetched_at: Instant, refresh: Duration) -> bool {
    fetched_at.elapsed() > refresh
}

#[async_trait]
impl PricingPort for CachedPriceTable {
    async fn ensure_ready(&self) -> Result<()> {
        if self.cached_if_fresh().await.is_some() {
            return Ok(());
        }
        match self.hydrate().await {
            Ok(_) => Ok(()),
            // A stale table is still a table; only a cold cache is fatal.
            Err(err) if self.cached_any().await.is_some() => {
                warn!(error = %err, "price refresh failed, serving the stale table");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn terminal_prices(&self) -> Result<Vec<PriceEntry>> {
        if let Some(entries) = self.cached_if_fresh().await {
            return Ok(entries);
        }
        match self.hydrate().await {
            Ok(entries) => Ok(entries),
            Err(err) => match self.cached_any().await {
                Some(entries) => {
                    warn!(error = %err, "price refresh failed, serving the stale table");
                    Ok(entries)
                }
                None => Err(err),
            },
        }
    }
}
