//! Command implementations.

pub mod merge;
pub mod preview;
