//! Playlist and item models.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored or user-supplied enum value is unknown.
#[derive(Debug, Clone, Error)]
#[error("Unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// How a playlist is played out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistMode {
    Master,
    /// Several zone playlists played concurrently.
    Multizone,
    External,
    Channel,
}

impl PlaylistMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistMode::Master => "master",
            PlaylistMode::Multizone => "multizone",
            PlaylistMode::External => "external",
            PlaylistMode::Channel => "channel",
        }
    }
}

impl fmt::Display for PlaylistMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaylistMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master" => Ok(PlaylistMode::Master),
            "multizone" => Ok(PlaylistMode::Multizone),
            "external" => Ok(PlaylistMode::External),
            "channel" => Ok(PlaylistMode::Channel),
            other => Err(ParseEnumError {
                kind: "playlist mode",
                value: other.to_string(),
            }),
        }
    }
}

/// One zone of a multizone playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDescriptor {
    pub zone_playlist_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_name: Option<String>,
}

impl ZoneDescriptor {
    pub fn new(zone_playlist_id: i32) -> Self {
        Self {
            zone_playlist_id,
            zone_name: None,
        }
    }
}

/// A playlist (domain model).
#[derive(Debug, Clone, Serialize)]
pub struct Playlist {
    pub playlist_id: i32,
    /// Owner of the playlist.
    pub uid: i32,
    pub company_id: i32,
    pub playlist_name: String,
    pub mode: PlaylistMode,
    /// Time limit in seconds (0 = unlimited).
    pub time_limit: i64,
    pub shuffle: bool,
    /// Items picked per shuffle round (0 = all).
    pub shuffle_picking: i32,
    pub multizone: Vec<ZoneDescriptor>,
    // Cached aggregates, only ever written by the metrics engine.
    pub duration: i64,
    pub owner_duration: i64,
    pub filesize: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Playlist {
    pub fn has_time_limit(&self) -> bool {
        self.time_limit > 0
    }

    pub fn is_multizone(&self) -> bool {
        self.mode == PlaylistMode::Multizone
    }
}

/// Data for creating a new playlist.
#[derive(Debug, Clone)]
pub struct NewPlaylist {
    pub uid: i32,
    pub company_id: i32,
    pub playlist_name: String,
    pub mode: PlaylistMode,
    pub time_limit: i64,
    pub shuffle: bool,
    pub shuffle_picking: i32,
    pub multizone: Vec<ZoneDescriptor>,
}

impl NewPlaylist {
    /// Create an unlimited, unshuffled master playlist.
    pub fn master(playlist_name: impl Into<String>, uid: i32) -> Self {
        Self {
            uid,
            company_id: 1,
            playlist_name: playlist_name.into(),
            mode: PlaylistMode::Master,
            time_limit: 0,
            shuffle: false,
            shuffle_picking: 0,
            multizone: Vec::new(),
        }
    }

    /// Create a multizone playlist composed of the given zone playlists.
    pub fn multizone(playlist_name: impl Into<String>, uid: i32, zones: &[i32]) -> Self {
        Self {
            mode: PlaylistMode::Multizone,
            multizone: zones.iter().copied().map(ZoneDescriptor::new).collect(),
            ..Self::master(playlist_name, uid)
        }
    }

    pub fn with_time_limit(mut self, time_limit: i64) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_shuffle(mut self, shuffle_picking: i32) -> Self {
        self.shuffle = true;
        self.shuffle_picking = shuffle_picking;
        self
    }
}

/// What an item plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// A file from the media pool.
    Mediapool,
    /// Another playlist, nested as a single item.
    Playlist,
    Template,
    Widget,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Mediapool => "mediapool",
            ItemType::Playlist => "playlist",
            ItemType::Template => "template",
            ItemType::Widget => "widget",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mediapool" => Ok(ItemType::Mediapool),
            "playlist" => Ok(ItemType::Playlist),
            "template" => Ok(ItemType::Template),
            "widget" => Ok(ItemType::Widget),
            other => Err(ParseEnumError {
                kind: "item type",
                value: other.to_string(),
            }),
        }
    }
}

/// An entry of a playlist.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub item_id: i32,
    pub playlist_id: i32,
    /// Owner of the item, not necessarily the playlist owner.
    pub uid: i32,
    pub item_type: ItemType,
    /// Media id, or the nested playlist id for playlist items.
    pub file_resource: String,
    pub item_name: String,
    /// Duration in seconds.
    pub item_duration: f64,
    /// Size in bytes.
    pub item_filesize: i64,
    /// Zero-based position within the playlist.
    pub item_order: i32,
    pub disabled: bool,
}

impl Item {
    /// Id of the playlist this item nests, if it is a playlist item.
    pub fn nested_playlist_id(&self) -> Option<i32> {
        match self.item_type {
            ItemType::Playlist => self.file_resource.parse().ok(),
            _ => None,
        }
    }
}

/// Data for adding an item to a playlist.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub playlist_id: i32,
    pub uid: i32,
    pub item_type: ItemType,
    pub file_resource: String,
    pub item_name: String,
    /// Natural duration of the content; `None` when it has none (images, widgets).
    pub item_duration: Option<f64>,
    pub item_filesize: i64,
    /// Insert position; appended when `None` or past the end.
    pub position: Option<i32>,
}

impl NewItem {
    /// A media pool item.
    pub fn media(
        playlist_id: i32,
        uid: i32,
        media_id: impl Into<String>,
        duration: Option<f64>,
        filesize: i64,
    ) -> Self {
        let file_resource = media_id.into();
        Self {
            playlist_id,
            uid,
            item_type: ItemType::Mediapool,
            item_name: file_resource.clone(),
            file_resource,
            item_duration: duration,
            item_filesize: filesize,
            position: None,
        }
    }

    /// An item nesting another playlist. Duration and size come from the nested playlist.
    pub fn nested(playlist_id: i32, uid: i32, nested_playlist_id: i32) -> Self {
        Self {
            playlist_id,
            uid,
            item_type: ItemType::Playlist,
            file_resource: nested_playlist_id.to_string(),
            item_name: format!("playlist {}", nested_playlist_id),
            item_duration: None,
            item_filesize: 0,
            position: None,
        }
    }

    pub fn at_position(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn nested_playlist_id(&self) -> Option<i32> {
        match self.item_type {
            ItemType::Playlist => self.file_resource.parse().ok(),
            _ => None,
        }
    }
}
