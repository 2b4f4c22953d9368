//! Wire types for the DQ pipeline backend API

pub mod types;

pub use types::*;
