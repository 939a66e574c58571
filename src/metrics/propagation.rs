//! Upward propagation of recomputed metrics.
//!
//! A change to one playlist invalidates every playlist that nests it,
//! directly or through intermediate playlists. The affected set is found by
//! walking the reverse index upwards and is then refreshed children first,
//! so a playlist reachable along several paths is recomputed once and only
//! after all of its nested playlists are up to date.

use std::collections::HashMap;

use serde::Serialize;

use crate::metrics::engine::MetricsEngine;
use crate::metrics::store::Store;
use crate::metrics::MetricsError;
use crate::models::{Metrics, Playlist};

/// Outcome of recomputing a playlist and everything above it.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeReport {
    pub playlist_id: i32,
    /// Metrics of the playlist the cascade started from.
    pub metrics: Metrics,
    /// Number of zones, for multizone playlists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_count: Option<usize>,
    /// Every playlist written, in the order it was refreshed.
    pub updated_playlists: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    OnPath,
    Done,
}

impl<S: Store> MetricsEngine<S> {
    /// Recompute a playlist and propagate the result to all playlists nesting it.
    pub fn propagate(&mut self, playlist_id: i32) -> Result<(), MetricsError> {
        self.export(playlist_id).map(|_| ())
    }

    /// Like [`propagate`](Self::propagate), returning what was computed.
    pub fn export(&mut self, playlist_id: i32) -> Result<CascadeReport, MetricsError> {
        self.in_transaction(|engine| engine.cascade(playlist_id))
    }

    /// Compute a playlist's metrics without storing anything.
    ///
    /// Zone playlists written while composing a multizone playlist are rolled
    /// back as well.
    pub fn preview(&mut self, playlist_id: i32) -> Result<(Metrics, Option<usize>), MetricsError> {
        self.store.begin()?;
        let result = self
            .load_playlist(playlist_id)
            .and_then(|playlist| self.playlist_metrics(&playlist, &mut Vec::new()));
        self.store.rollback()?;
        result
    }

    /// The cascade itself. Callers provide the transaction.
    pub(crate) fn cascade(&mut self, playlist_id: i32) -> Result<CascadeReport, MetricsError> {
        self.cascade_within(playlist_id, &mut Vec::new())
    }

    /// Cascade while the multizone playlists in `composing` are being composed.
    pub(crate) fn cascade_within(
        &mut self,
        playlist_id: i32,
        composing: &mut Vec<i32>,
    ) -> Result<CascadeReport, MetricsError> {
        let order = self.propagation_order(playlist_id)?;
        tracing::info!(
            "Propagating playlist {} through {} playlist(s)",
            playlist_id,
            order.len()
        );

        let mut report: Option<CascadeReport> = None;
        let mut updated_playlists = Vec::with_capacity(order.len());

        for id in order {
            let (metrics, zone_count) = self.refresh(id, composing)?;
            updated_playlists.push(id);

            // The starting playlist is always first
            if report.is_none() {
                report = Some(CascadeReport {
                    playlist_id: id,
                    metrics,
                    zone_count,
                    updated_playlists: Vec::new(),
                });
            }
        }

        let mut report = report.ok_or(MetricsError::PlaylistNotFound(playlist_id))?;
        report.updated_playlists = updated_playlists;
        Ok(report)
    }

    /// Playlists affected by a change to `playlist_id`, children before parents.
    ///
    /// Fails when a playlist is reached again while still on the current path.
    fn propagation_order(&mut self, playlist_id: i32) -> Result<Vec<i32>, MetricsError> {
        let mut marks: HashMap<i32, Visit> = HashMap::new();
        let mut postorder = Vec::new();

        marks.insert(playlist_id, Visit::OnPath);
        let parents = self.parent_ids(playlist_id)?;
        let mut stack: Vec<(i32, std::vec::IntoIter<i32>)> =
            vec![(playlist_id, parents.into_iter())];

        while let Some((current, pending)) = stack.last_mut() {
            match pending.next() {
                Some(parent) => match marks.get(&parent).copied() {
                    Some(Visit::OnPath) => {
                        tracing::error!(
                            "Cyclic nesting: playlist {} is nested in itself via playlist {}",
                            parent,
                            current
                        );
                        return Err(MetricsError::CyclicNestingDetected {
                            playlist_id: parent,
                        });
                    }
                    Some(Visit::Done) => {}
                    None => {
                        marks.insert(parent, Visit::OnPath);
                        let grandparents = self.parent_ids(parent)?;
                        stack.push((parent, grandparents.into_iter()));
                    }
                },
                None => {
                    let finished = *current;
                    marks.insert(finished, Visit::Done);
                    postorder.push(finished);
                    stack.pop();
                }
            }
        }

        postorder.reverse();
        Ok(postorder)
    }

    fn parent_ids(&mut self, playlist_id: i32) -> Result<Vec<i32>, MetricsError> {
        let parents = self.store.find_parent_playlists_containing(playlist_id)?;
        Ok(parents.into_iter().map(|parent| parent.playlist_id).collect())
    }

    /// Recompute and store one playlist.
    fn refresh(
        &mut self,
        playlist_id: i32,
        composing: &mut Vec<i32>,
    ) -> Result<(Metrics, Option<usize>), MetricsError> {
        let playlist = self.load_playlist(playlist_id)?;
        let (metrics, zone_count) = self.playlist_metrics(&playlist, composing)?;
        self.persist_metrics(playlist_id, &metrics)?;
        Ok((metrics, zone_count))
    }

    /// Metrics of any playlist: composed from zones for multizone, from items otherwise.
    pub(crate) fn playlist_metrics(
        &mut self,
        playlist: &Playlist,
        composing: &mut Vec<i32>,
    ) -> Result<(Metrics, Option<usize>), MetricsError> {
        if playlist.is_multizone() {
            let (metrics, zone_count) = self.compose_zones(playlist, composing)?;
            Ok((metrics, Some(zone_count)))
        } else {
            Ok((self.metrics_for(playlist)?, None))
        }
    }
}
