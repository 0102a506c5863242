//! Repository adapters

pub mod sqlite;

pub use sqlite::{SqliteRepository, SqliteSession};
