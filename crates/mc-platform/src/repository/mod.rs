//! Persistence
//!
//! Connection records live behind the `ConnectionRepository` trait so the
//! services never depend on a concrete database.

pub mod connection;

pub use connection::{ConnectionRepository, SqliteConnectionRepository};
