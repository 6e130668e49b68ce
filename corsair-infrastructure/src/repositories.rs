pub mod hit_api;
pub mod price_cache;

pub use hit_api::*;
pub use price_cache::*;
