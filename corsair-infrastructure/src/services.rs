pub mod oracle_client;
pub mod roster_client;
pub mod thread_service;

pub use oracle_client::*;
pub use roster_client::*;
pub use thread_service::*;
