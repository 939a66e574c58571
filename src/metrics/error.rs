//! Errors raised by the metrics engine.

use thiserror::Error;

use crate::db::RepoError;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Playlist '{playlist_name}' exceeds its time limit: {actual}s > {limit}s")]
    QuotaExceeded {
        limit: i64,
        actual: i64,
        playlist_name: String,
    },

    #[error("Cyclic nesting detected at playlist {playlist_id}")]
    CyclicNestingDetected { playlist_id: i32 },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Playlist not found: {0}")]
    PlaylistNotFound(i32),

    #[error("Item not found: {0}")]
    ItemNotFound(i32),

    #[error("Repository error: {0}")]
    Repository(#[from] RepoError),
}

impl MetricsError {
    /// Business rule rejections, as opposed to data or storage failures.
    pub fn is_rejection(&self) -> bool {
        matches!(self, MetricsError::QuotaExceeded { .. })
    }
}
