//! Core data types: the normalized tick and symbol conversion helpers.

pub mod symbol;
pub mod tick;

pub use symbol::*;
pub use tick::*;
