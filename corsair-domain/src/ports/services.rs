use async_trait::async_trait;

use crate::entities::{ExtractedHit, HitRecord, InboundMeta, RosterMember};

/// The external LLM extraction oracle, invoked once per new intake session.
/// Failures are tolerated by callers; the oracle is never a hard dependency.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    async fn extract(
        &self,
        message: &str,
        meta: &InboundMeta,
    ) -> anyhow::Result<Option<ExtractedHit>>;
}

#[async_trait]
pub trait RosterPort: Send + Sync {
    async fn resolve_user_by_name(&self, name: &str) -> anyhow::Result<Option<RosterMember>>;
}

/// Thread-post collaborator. Fire-and-forget from the committer's
/// perspective: implementations log failures and never propagate them.
pub trait ThreadNotifier: Send + Sync {
    fn spawn_hit_created(&self, record: HitRecord);
    fn spawn_hit_updated(&self, original: HitRecord, updated: HitRecord);
}
