//! Composition of multizone playlists.
//!
//! Zones play simultaneously, so a multizone playlist lasts as long as its
//! longest zone and needs as much storage as its largest one.

use crate::metrics::engine::MetricsEngine;
use crate::metrics::store::Store;
use crate::metrics::MetricsError;
use crate::models::{Metrics, Playlist};

/// Fold one zone into the composed metrics.
///
/// Takes the element-wise maximum of size and durations. Counts are not
/// meaningful across zones and stay untouched.
pub fn merge_zone(composed: Metrics, zone: &Metrics) -> Metrics {
    Metrics {
        filesize: composed.filesize.max(zone.filesize),
        duration: composed.duration.max(zone.duration),
        owner_duration: composed.owner_duration.max(zone.owner_duration),
        ..composed
    }
}

impl<S: Store> MetricsEngine<S> {
    /// Recompute every zone of a multizone playlist and compose the result.
    ///
    /// Each zone is exported with its own upward cascade, so playlists nesting
    /// a zone stay consistent. The multizone playlist itself is not stored;
    /// use [`export`](Self::export) for that. Returns the zone count alongside
    /// the metrics.
    pub fn compose_multizone(
        &mut self,
        playlist: &Playlist,
    ) -> Result<(Metrics, usize), MetricsError> {
        self.in_transaction(|engine| engine.compose_zones(playlist, &mut Vec::new()))
    }

    /// `composing` holds the multizone playlists currently being composed.
    pub(crate) fn compose_zones(
        &mut self,
        playlist: &Playlist,
        composing: &mut Vec<i32>,
    ) -> Result<(Metrics, usize), MetricsError> {
        if composing.contains(&playlist.playlist_id) {
            tracing::error!(
                "Cyclic zones: multizone playlist {} contains itself",
                playlist.playlist_id
            );
            return Err(MetricsError::CyclicNestingDetected {
                playlist_id: playlist.playlist_id,
            });
        }
        composing.push(playlist.playlist_id);

        let mut composed = Metrics::default();
        for zone in &playlist.multizone {
            let zone_metrics = self.cascade_within(zone.zone_playlist_id, composing)?.metrics;

            tracing::debug!(
                "Zone {} of playlist {}: {}s, {} bytes",
                zone.zone_name.as_deref().unwrap_or("-"),
                playlist.playlist_id,
                zone_metrics.duration,
                zone_metrics.filesize
            );
            composed = merge_zone(composed, &zone_metrics);
        }

        composing.pop();
        Ok((composed, playlist.multizone.len()))
    }
}
