use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{Engagement, PiracyType};

/// One priced manifest line. `avg_price` stays `None` when the commodity
/// could not be matched against the terminal price table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CargoLine {
    pub commodity_name: String,
    pub scu_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_match: Option<String>,
}

impl CargoLine {
    pub fn line_value(&self) -> f64 {
        self.avg_price.unwrap_or(0.0) * self.scu_amount
    }
}

/// The persisted unit: one logged piracy hit.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct HitRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: String,
    pub username: String,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
    pub cargo: Vec<CargoLine>,
    pub total_value: f64,
    pub total_scu: f64,
    pub total_cut_value: f64,
    pub total_cut_scu: f64,
    pub assists: Vec<String>,
    pub guests: Vec<String>,
    pub victims: Vec<String>,
    pub additional_media_links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_of_piracy: Option<PiracyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_or_ground: Option<Engagement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    pub fleet_activity: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl HitRecord {
    /// Totals derived from the cargo manifest: (value, scu).
    pub fn cargo_totals(&self) -> (f64, f64) {
        let value = self.cargo.iter().map(CargoLine::line_value).sum();
        let scu = self.cargo.iter().map(|line| line.scu_amount).sum();
        (value, scu)
    }
}
