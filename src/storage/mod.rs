//! Storage layer for Chrome history stores.

pub mod schema;
pub mod sqlite;

pub use sqlite::{AccessMode, HistoryStore, StoreOptions, StoreWriter, VisitKey};
