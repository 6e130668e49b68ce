use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::HitRecord;
use crate::utils::{round0, round2};
use crate::value_objects::{IntakeStep, SessionKey};

/// Derived or pinned numeric summary of a cargo manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingTotals {
    pub total_value: f64,
    pub total_scu: f64,
}

impl PricingTotals {
    /// Derives rounded totals from the manifest. Rounding happens here so a
    /// draft never carries a fractional total_value between syncs.
    pub fn from_cargo(record: &HitRecord) -> Self {
        let (total_value, total_scu) = record.cargo_totals();
        Self {
            total_value: round0(total_value),
            total_scu: round2(total_scu),
        }
    }
}

/// Per-field manual-override flags. `false` means the field auto-tracks the
/// cargo sums after every cargo mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualTotals {
    pub total_value: bool,
    pub total_scu: bool,
}

/// An in-flight step-by-step hit intake.
#[derive(Debug, Clone)]
pub struct IntakeSession {
    pub key: SessionKey,
    pub step: IntakeStep,
    pub fields: HitRecord,
    pub pricing: PricingTotals,
    pub expires_at: DateTime<Utc>,
}

impl IntakeSession {
    pub fn new(key: SessionKey, fields: HitRecord, ttl_minutes: i64) -> Self {
        Self {
            key,
            step: IntakeStep::Cargo,
            fields,
            pricing: PricingTotals::default(),
            expires_at: Utc::now() + Duration::minutes(ttl_minutes),
        }
    }

    /// Sliding TTL, refreshed on every accepted step.
    pub fn touch(&mut self, ttl_minutes: i64) {
        self.expires_at = Utc::now() + Duration::minutes(ttl_minutes);
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// An in-flight free-order edit of an existing hit.
#[derive(Debug, Clone)]
pub struct EditSession {
    pub key: SessionKey,
    pub hit_id: i64,
    pub thread_id: Option<String>,
    /// Immutable snapshot of the record at session start.
    pub original: HitRecord,
    pub working: HitRecord,
    pub updated_fields: BTreeSet<String>,
    pub manual_totals: ManualTotals,
    pub auto_totals: PricingTotals,
    pub expires_at: DateTime<Utc>,
}

impl EditSession {
    pub fn new(key: SessionKey, hit_id: i64, record: HitRecord, ttl_minutes: i64) -> Self {
        let auto_totals = PricingTotals::from_cargo(&record);
        Self {
            key,
            hit_id,
            thread_id: record.thread_id.clone(),
            original: record.clone(),
            working: record,
            updated_fields: BTreeSet::new(),
            manual_totals: ManualTotals::default(),
            auto_totals,
            expires_at: Utc::now() + Duration::minutes(ttl_minutes),
        }
    }

    pub fn touch(&mut self, ttl_minutes: i64) {
        self.expires_at = Utc::now() + Duration::minutes(ttl_minutes);
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Re-derives `auto_totals` from the working cargo and writes them into
    /// any total field that is not manually pinned.
    pub fn sync_totals(&mut self) {
        self.auto_totals = PricingTotals::from_cargo(&self.working);
        if !self.manual_totals.total_value {
            self.working.total_value = self.auto_totals.total_value;
        }
        if !self.manual_totals.total_scu {
            self.working.total_scu = self.auto_totals.total_scu;
        }
    }
}
