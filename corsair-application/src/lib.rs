// Application Layer

pub mod commands;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod sessions;
pub mod state;

pub use error::AppError;
pub use metrics::Metrics;
pub use state::AppState;
