//! The metrics engine bound to a store.

use serde::Serialize;

use crate::metrics::aggregator::{aggregate, compute_metrics};
use crate::metrics::store::{ItemFilter, Store};
use crate::metrics::{MetricsError, quota};
use crate::models::{Metrics, Playlist, PlaylistMetrics, PlaylistMode};

/// Default duration for items without an intrinsic one (images, widgets).
pub const DEFAULT_ITEM_DURATION: i64 = 15;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Seconds assigned to content that has no duration of its own.
    pub default_duration: i64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            default_duration: DEFAULT_ITEM_DURATION,
        }
    }
}

impl MetricsConfig {
    pub fn new(default_duration: i64) -> Self {
        Self {
            default_duration: default_duration.max(0),
        }
    }

    pub fn default_duration(&self) -> i64 {
        self.default_duration
    }
}

/// Read-only overview of a playlist's content.
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistSummary {
    pub playlist_id: i32,
    pub playlist_name: String,
    pub mode: PlaylistMode,
    pub time_limit: i64,
    pub total_size: i64,
    pub total_entries: i64,
    /// Duration of the items that are not disabled.
    pub enabled_duration: i64,
    /// Duration contributed by the viewing user.
    pub viewer_duration: i64,
    /// Aggregates as last stored by the engine.
    pub stored: PlaylistMetrics,
}

/// Computes, checks and propagates playlist metrics on top of a [`Store`].
///
/// One engine owns one store, and with it one connection. Operations that
/// write run in a single transaction and are rolled back as a whole on error.
pub struct MetricsEngine<S> {
    pub(crate) store: S,
    pub(crate) config: MetricsConfig,
}

impl<S: Store> MetricsEngine<S> {
    /// Create an engine with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, MetricsConfig::default())
    }

    pub fn with_config(store: S, config: MetricsConfig) -> Self {
        Self { store, config }
    }

    /// Direct access to the underlying store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Run `op` between begin and commit, rolling back if it fails.
    pub(crate) fn in_transaction<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, MetricsError>,
    ) -> Result<T, MetricsError> {
        self.store.begin()?;

        match op(self) {
            Ok(value) => {
                self.store.commit()?;
                Ok(value)
            }
            Err(err) => {
                tracing::debug!("Rolling back: {}", err);
                if let Err(rollback_err) = self.store.rollback() {
                    tracing::error!("Rollback failed after '{}': {}", err, rollback_err);
                }
                Err(err)
            }
        }
    }

    pub fn load_playlist(&mut self, playlist_id: i32) -> Result<Playlist, MetricsError> {
        self.store
            .load_by_id(playlist_id)?
            .ok_or(MetricsError::PlaylistNotFound(playlist_id))
    }

    /// Whether content added by `uid` may exceed playlist time limits.
    pub fn is_exempt(&mut self, uid: i32) -> Result<bool, MetricsError> {
        Ok(self.store.is_exempt_from_quota(uid)?)
    }

    /// Metrics of a non-multizone playlist from its current items. Nothing is stored.
    pub fn metrics_for(&mut self, playlist: &Playlist) -> Result<Metrics, MetricsError> {
        let items = self.store.find_all_items_by_playlist(playlist.playlist_id)?;
        let owner_exempt = self.store.is_exempt_from_quota(playlist.uid)?;

        compute_metrics(playlist, &items, owner_exempt)
    }

    /// Write metrics into the playlist record and mirror them into every item nesting it.
    pub(crate) fn persist_metrics(
        &mut self,
        playlist_id: i32,
        metrics: &Metrics,
    ) -> Result<(), MetricsError> {
        let updated = self.store.update_metrics(playlist_id, metrics.playlist_view())?;
        if updated == 0 {
            return Err(MetricsError::PersistenceFailure(format!(
                "metrics of playlist {} were not stored",
                playlist_id
            )));
        }

        let mirrored = self
            .store
            .update_item_metrics(ItemFilter::NestedPlaylist(playlist_id), metrics.item_view())?;

        tracing::debug!(
            "Stored playlist {}: {}s ({}s owner), {} bytes, mirrored into {} item(s)",
            playlist_id,
            metrics.duration,
            metrics.owner_duration,
            metrics.filesize,
            mirrored
        );

        Ok(())
    }

    /// Duration an item of `candidate` seconds may take in `playlist`.
    pub fn allowed_duration(
        &mut self,
        playlist: &Playlist,
        candidate: i64,
        is_exempt: bool,
    ) -> Result<i64, MetricsError> {
        self.clamp_to_remaining(playlist, candidate, is_exempt, None)
    }

    /// Duration an item nesting `nested` may take in `container`.
    ///
    /// The nested playlist's duration is first capped by its own time limit,
    /// then by what is left in the container.
    pub fn allowed_nested_duration(
        &mut self,
        container: &Playlist,
        nested: &Playlist,
        is_exempt: bool,
    ) -> Result<i64, MetricsError> {
        self.allowed_nested_duration_excluding(container, nested, is_exempt, None)
    }

    pub(crate) fn allowed_nested_duration_excluding(
        &mut self,
        container: &Playlist,
        nested: &Playlist,
        is_exempt: bool,
        excluding: Option<i32>,
    ) -> Result<i64, MetricsError> {
        let own = quota::allowed_duration(nested.time_limit, 0, nested.duration, is_exempt);
        self.clamp_to_remaining(container, own, is_exempt, excluding)
    }

    /// The configured default duration, capped by the playlist's remaining budget.
    pub fn default_duration_for(
        &mut self,
        playlist: &Playlist,
        is_exempt: bool,
    ) -> Result<i64, MetricsError> {
        let candidate = self.config.default_duration();
        self.allowed_duration(playlist, candidate, is_exempt)
    }

    /// Clamp against the owner budget, ignoring the item `excluding` when it is being edited.
    pub(crate) fn clamp_to_remaining(
        &mut self,
        playlist: &Playlist,
        candidate: i64,
        is_exempt: bool,
        excluding: Option<i32>,
    ) -> Result<i64, MetricsError> {
        if !playlist.has_time_limit() || is_exempt {
            return Ok(candidate.max(0));
        }

        let mut items = self.store.find_all_items_by_playlist(playlist.playlist_id)?;
        if let Some(item_id) = excluding {
            items.retain(|item| item.item_id != item_id);
        }
        let owner_duration = aggregate(playlist, &items).owner_duration;

        Ok(quota::allowed_duration(
            playlist.time_limit,
            owner_duration,
            candidate,
            is_exempt,
        ))
    }

    /// Totals of a playlist as seen by `viewer_uid`.
    pub fn summary(
        &mut self,
        playlist_id: i32,
        viewer_uid: i32,
    ) -> Result<PlaylistSummary, MetricsError> {
        let playlist = self.load_playlist(playlist_id)?;
        let totals = self.store.sum_and_count_by_playlist(playlist_id)?;
        let enabled_duration = self.store.sum_duration_of_enabled_by_playlist(playlist_id)?;
        let viewer_duration = self
            .store
            .sum_duration_of_items_by_owner_and_playlist(viewer_uid, playlist_id)?;

        Ok(PlaylistSummary {
            playlist_id,
            playlist_name: playlist.playlist_name,
            mode: playlist.mode,
            time_limit: playlist.time_limit,
            total_size: totals.total_size,
            total_entries: totals.total_entries,
            enabled_duration,
            viewer_duration,
            stored: PlaylistMetrics {
                filesize: playlist.filesize,
                duration: playlist.duration,
                owner_duration: playlist.owner_duration,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        assert_eq!(MetricsConfig::default().default_duration(), 15);
        assert_eq!(MetricsConfig::new(-3).default_duration(), 0);
    }
}
