//! Database connection pool and management.

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use std::time::Duration;

/// Type alias for our connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection timeout in seconds.
    pub connection_timeout: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "signage.db".to_string(),
            max_connections: 4,
            connection_timeout: 30,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    /// Build a connection pool from this configuration.
    pub fn build_pool(&self) -> Result<DbPool, Box<dyn std::error::Error>> {
        let manager = ConnectionManager::<SqliteConnection>::new(&self.database_url);

        Pool::builder()
            .max_size(self.max_connections)
            .connection_timeout(Duration::from_secs(self.connection_timeout))
            .build(manager)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    }
}

/// Run the SQL migrations to set up the database schema.
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // Create users table
    diesel::sql_query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            company_id INTEGER NOT NULL DEFAULT 1,
            admin_role BOOLEAN NOT NULL DEFAULT FALSE,
            simple_admin_role BOOLEAN NOT NULL DEFAULT FALSE,
            sub_admin_role BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(conn)?;

    // Create playlists table. Aggregate columns are maintained by the metrics engine.
    diesel::sql_query(
        r#"
        CREATE TABLE IF NOT EXISTS playlists (
            playlist_id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            uid INTEGER NOT NULL,
            company_id INTEGER NOT NULL DEFAULT 1,
            playlist_name TEXT NOT NULL,
            playlist_mode TEXT NOT NULL DEFAULT 'master',
            time_limit BIGINT NOT NULL DEFAULT 0,
            shuffle BOOLEAN NOT NULL DEFAULT FALSE,
            shuffle_picking INTEGER NOT NULL DEFAULT 0,
            multizone TEXT,
            duration BIGINT NOT NULL DEFAULT 0,
            owner_duration BIGINT NOT NULL DEFAULT 0,
            filesize BIGINT NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(conn)?;

    diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_playlists_uid ON playlists(uid)")
        .execute(conn)?;

    // Create items table
    diesel::sql_query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            item_id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            playlist_id INTEGER NOT NULL REFERENCES playlists(playlist_id),
            uid INTEGER NOT NULL,
            item_type TEXT NOT NULL,
            file_resource TEXT NOT NULL,
            item_name TEXT NOT NULL DEFAULT '',
            item_duration DOUBLE NOT NULL DEFAULT 0,
            item_filesize BIGINT NOT NULL DEFAULT 0,
            item_order INTEGER NOT NULL DEFAULT 0,
            disabled BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(conn)?;

    diesel::sql_query(
        "CREATE INDEX IF NOT EXISTS idx_items_playlist_id ON items(playlist_id, item_order)",
    )
    .execute(conn)?;

    // Reverse nesting lookups: which playlists contain playlist X as an item
    diesel::sql_query(
        "CREATE INDEX IF NOT EXISTS idx_items_nested ON items(item_type, file_resource)",
    )
    .execute(conn)?;

    Ok(())
}
