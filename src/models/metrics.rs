//! Aggregate playlist statistics and their persisted views.

use serde::Serialize;

/// Statistics computed for a playlist from its items.
///
/// Serializes to the frontend view, which includes the item counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub count_items: i64,
    /// Items owned by the playlist owner.
    pub count_owner_items: i64,
    /// Bytes.
    pub filesize: i64,
    /// Seconds.
    pub duration: i64,
    /// Seconds contributed by the playlist owner's items.
    pub owner_duration: i64,
}

impl Metrics {
    /// The fields stored in the playlist record.
    pub fn playlist_view(&self) -> PlaylistMetrics {
        PlaylistMetrics {
            filesize: self.filesize,
            duration: self.duration,
            owner_duration: self.owner_duration,
        }
    }

    /// The fields mirrored into items that nest the playlist.
    pub fn item_view(&self) -> ItemMetrics {
        ItemMetrics {
            duration: self.duration,
            filesize: self.filesize,
        }
    }
}

/// Cached aggregates of a playlist record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlaylistMetrics {
    pub filesize: i64,
    pub duration: i64,
    pub owner_duration: i64,
}

/// Cached duration and size of a nested-playlist item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemMetrics {
    pub duration: i64,
    pub filesize: i64,
}
