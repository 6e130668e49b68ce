// Domain value objects
pub mod enums;
pub mod identifiers;

pub use enums::*;
pub use identifiers::*;
