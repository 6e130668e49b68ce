// Pure domain services: no I/O, injected data only

pub mod extractor;
pub mod mutation;
pub mod resolver;

pub use extractor::*;
pub use mutation::*;
pub use resolver::*;
