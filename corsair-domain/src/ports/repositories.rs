use async_trait::async_trait;

use crate::entities::{HitRecord, PriceEntry};

#[async_trait]
pub trait HitRepository: Send + Sync {
    async fn create(&self, payload: &HitRecord) -> anyhow::Result<Option<HitRecord>>;
    async fn update(&self, id: i64, payload: &HitRecord) -> anyhow::Result<bool>;
    async fn get_by_entry_id(&self, id: i64) -> anyhow::Result<Option<HitRecord>>;
    async fn get_by_thread_id(&self, thread_id: &str) -> anyhow::Result<Option<HitRecord>>;
}

#[async_trait]
pub trait PricingPort: Send + Sync {
    /// Hydrates the terminal price table if it has never been fetched or has
    /// gone stale. Must be called before the first `terminal_prices`.
    async fn ensure_ready(&self) -> anyhow::Result<()>;
    async fn terminal_prices(&self) -> anyhow::Result<Vec<PriceEntry>>;
}
