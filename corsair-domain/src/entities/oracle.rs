use serde::{Deserialize, Serialize};

/// Structured object returned by the extraction oracle for one message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedHit {
    pub action: String,
    pub confidence: f64,
    pub cargo: Vec<ExtractedCargo>,
    pub assists: Vec<String>,
    pub victims: Vec<String>,
    pub guests: Vec<String>,
    pub title: Option<String>,
    pub story: Option<String>,
    pub type_of_piracy: Option<String>,
    pub timestamp: Option<String>,
    pub missing_fields: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedCargo {
    pub name: String,
    pub scu: f64,
    pub price: Option<f64>,
}

pub const ORACLE_ACTION_HIT_CREATE: &str = "hit_create";
