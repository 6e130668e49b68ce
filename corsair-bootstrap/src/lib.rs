pub mod context;
mod gateway_bridge;
pub mod lifecycle;

pub use lifecycle::run;
