use serde::{Deserialize, Serialize};

/// One row of the externally maintained terminal price table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceEntry {
    #[serde(alias = "commodity_name", alias = "item_name")]
    pub name: String,
    #[serde(alias = "sell_price", alias = "price_sell")]
    pub price_sell: f64,
    #[serde(alias = "terminal_name", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Default for PriceEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            price_sell: 0.0,
            location: None,
        }
    }
}

/// Best-matching priced entry for a free-text commodity name.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatch {
    pub price: f64,
    pub location: Option<String>,
    pub match_name: String,
    pub score: f64,
}
