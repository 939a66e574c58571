//! Item edits that keep playlist metrics consistent.
//!
//! Each edit clamps durations against the owner's remaining budget, writes
//! the item and then propagates from the edited playlist, all in one
//! transaction.

use crate::metrics::engine::MetricsEngine;
use crate::metrics::store::Store;
use crate::metrics::MetricsError;
use crate::models::{Item, NewItem};

impl<S: Store> MetricsEngine<S> {
    /// Add an item to a playlist on behalf of `actor_uid`.
    ///
    /// Nested playlists contribute their own duration and size. Other content
    /// uses the requested duration, or the configured default without one.
    pub fn add_item(&mut self, actor_uid: i32, item: NewItem) -> Result<Item, MetricsError> {
        self.in_transaction(|engine| {
            let playlist = engine.load_playlist(item.playlist_id)?;
            let is_exempt = engine.store.is_exempt_from_quota(actor_uid)?;

            let (duration, filesize) = match item.nested_playlist_id() {
                Some(nested_id) => {
                    let nested = engine.load_playlist(nested_id)?;
                    let duration = engine.allowed_nested_duration(&playlist, &nested, is_exempt)?;
                    (duration, nested.filesize)
                }
                None => {
                    let candidate = match item.item_duration {
                        Some(duration) => duration.round() as i64,
                        None => engine.config.default_duration(),
                    };
                    let duration = engine.allowed_duration(&playlist, candidate, is_exempt)?;
                    (duration, item.item_filesize)
                }
            };

            let created = engine.store.insert_item(&item, duration as f64, filesize)?;
            tracing::info!(
                "Added item {} ('{}') to playlist {} with {}s",
                created.item_id,
                created.item_name,
                playlist.playlist_id,
                duration
            );

            engine.cascade(playlist.playlist_id)?;
            Ok(created)
        })
    }

    /// Change the duration of an item, clamped to what its owner may still use.
    ///
    /// The item's current duration does not count against the budget. Items
    /// nesting a playlist ignore `requested` and take the nested duration again.
    pub fn update_item_duration(
        &mut self,
        actor_uid: i32,
        item_id: i32,
        requested: i64,
    ) -> Result<Item, MetricsError> {
        self.in_transaction(|engine| {
            let item = engine
                .store
                .load_item(item_id)?
                .ok_or(MetricsError::ItemNotFound(item_id))?;
            let playlist = engine.load_playlist(item.playlist_id)?;
            let is_exempt = engine.store.is_exempt_from_quota(actor_uid)?;

            let duration = match item.nested_playlist_id() {
                Some(nested_id) => {
                    let nested = engine.load_playlist(nested_id)?;
                    engine.allowed_nested_duration_excluding(
                        &playlist,
                        &nested,
                        is_exempt,
                        Some(item_id),
                    )?
                }
                None => engine.clamp_to_remaining(&playlist, requested, is_exempt, Some(item_id))?,
            };

            if engine.store.set_item_duration(item_id, duration as f64)? == 0 {
                return Err(MetricsError::PersistenceFailure(format!(
                    "duration of item {} was not stored",
                    item_id
                )));
            }
            if duration < requested {
                tracing::debug!(
                    "Item {}: requested {}s, clamped to {}s",
                    item_id,
                    requested,
                    duration
                );
            }

            engine.cascade(item.playlist_id)?;

            engine
                .store
                .load_item(item_id)?
                .ok_or(MetricsError::ItemNotFound(item_id))
        })
    }

    /// Remove an item and propagate the change.
    pub fn remove_item(&mut self, item_id: i32) -> Result<(), MetricsError> {
        self.in_transaction(|engine| {
            let item = engine
                .store
                .load_item(item_id)?
                .ok_or(MetricsError::ItemNotFound(item_id))?;

            if !engine.store.delete_item(item_id)? {
                return Err(MetricsError::ItemNotFound(item_id));
            }
            tracing::info!(
                "Removed item {} from playlist {}",
                item_id,
                item.playlist_id
            );

            engine.cascade(item.playlist_id)?;
            Ok(())
        })
    }
}
