pub mod hit;
pub mod inbound;
pub mod oracle;
pub mod pricing;
pub mod runtime;
pub mod session;

pub use hit::*;
pub use inbound::*;
pub use oracle::*;
pub use pricing::*;
pub use runtime::*;
pub use session::*;
