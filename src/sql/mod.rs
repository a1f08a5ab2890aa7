//! SQL generation: criteria compilation, statements and bound parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
