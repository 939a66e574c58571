//! Database module for SQLite persistence.

pub mod connection;
pub mod repository;
pub mod schema;

pub use connection::{DbConfig, DbPool, run_migrations};
pub use repository::{NewUser, RepoError, SqliteStore};
