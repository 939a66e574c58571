//! Collaborator contracts the metrics engine runs against.
//!
//! The engine never talks to the database directly. Everything it reads or
//! writes goes through these traits, which the SQLite store in
//! [`crate::db::SqliteStore`] implements.

use crate::db::RepoError;
use crate::models::{Item, ItemMetrics, NewItem, Playlist, PlaylistMetrics};

pub type RepoResult<T> = Result<T, RepoError>;

/// Total size and number of items of a playlist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeAndCount {
    pub total_size: i64,
    pub total_entries: i64,
}

/// Selects the item rows whose cached metrics are updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFilter {
    /// A single item.
    Item(i32),
    /// Every item that nests the given playlist.
    NestedPlaylist(i32),
}

/// Read access to items plus the reverse nesting index.
pub trait ItemSource {
    fn sum_and_count_by_playlist(&mut self, playlist_id: i32) -> RepoResult<SizeAndCount>;

    /// Rounded duration of the items that are not disabled.
    fn sum_duration_of_enabled_by_playlist(&mut self, playlist_id: i32) -> RepoResult<i64>;

    fn sum_duration_of_items_by_owner_and_playlist(
        &mut self,
        owner_id: i32,
        playlist_id: i32,
    ) -> RepoResult<i64>;

    /// All items of a playlist ordered by position.
    fn find_all_items_by_playlist(&mut self, playlist_id: i32) -> RepoResult<Vec<Item>>;

    /// Playlists with at least one item nesting `playlist_id`.
    fn find_parent_playlists_containing(&mut self, playlist_id: i32) -> RepoResult<Vec<Playlist>>;

    /// Returns the number of rows updated.
    fn update_item_metrics(
        &mut self,
        filter: ItemFilter,
        metrics: ItemMetrics,
    ) -> RepoResult<usize>;
}

/// Item mutations used by the editing operations.
pub trait ItemWriter {
    fn load_item(&mut self, item_id: i32) -> RepoResult<Option<Item>>;

    /// Insert with the given duration and size, keeping `item_order` dense.
    fn insert_item(&mut self, item: &NewItem, duration: f64, filesize: i64) -> RepoResult<Item>;

    fn set_item_duration(&mut self, item_id: i32, duration: f64) -> RepoResult<usize>;

    /// Delete and close the gap in `item_order`. Returns false when nothing was deleted.
    fn delete_item(&mut self, item_id: i32) -> RepoResult<bool>;
}

pub trait PlaylistSource {
    fn load_by_id(&mut self, playlist_id: i32) -> RepoResult<Option<Playlist>>;

    /// Returns the number of rows updated.
    fn update_metrics(&mut self, playlist_id: i32, metrics: PlaylistMetrics) -> RepoResult<usize>;
}

pub trait QuotaPolicy {
    fn is_exempt_from_quota(&mut self, owner_id: i32) -> RepoResult<bool>;
}

/// Explicit transaction control around a cascade.
pub trait UnitOfWork {
    fn begin(&mut self) -> RepoResult<()>;
    fn commit(&mut self) -> RepoResult<()>;
    fn rollback(&mut self) -> RepoResult<()>;
}

/// Everything the engine needs from persistence.
pub trait Store: ItemSource + ItemWriter + PlaylistSource + QuotaPolicy + UnitOfWork {}

impl<T> Store for T where T: ItemSource + ItemWriter + PlaylistSource + QuotaPolicy + UnitOfWork {}
