//! Aggregate statistics of a playlist from its items.
//!
//! Everything here is pure: the caller loads the items and decides whether
//! the playlist owner is exempt from the time limit.

use crate::metrics::MetricsError;
use crate::models::{Item, Metrics, Playlist};

/// Sum up the items of a playlist and apply the shuffle estimate.
///
/// Owner figures only count items owned by the playlist owner. Never fails;
/// the time limit is checked separately by [`check_time_limit`].
pub fn aggregate(playlist: &Playlist, items: &[Item]) -> Metrics {
    let mut metrics = Metrics::default();

    for item in items {
        let duration = item.item_duration.round() as i64;
        metrics.count_items += 1;
        metrics.filesize += item.item_filesize;
        metrics.duration += duration;

        if item.uid == playlist.uid {
            metrics.count_owner_items += 1;
            metrics.owner_duration += duration;
        }
    }

    if playlist.shuffle && metrics.count_items > 0 {
        apply_shuffle_picking(&mut metrics, playlist.shuffle_picking);
    }

    metrics
}

/// Expected playback figures when only `shuffle_picking` items are drawn per round.
///
/// This is an estimate (sampling without replacement), and the rounding points
/// must stay exactly where they are for stored values to remain comparable.
fn apply_shuffle_picking(metrics: &mut Metrics, shuffle_picking: i32) {
    let count = metrics.count_items as f64;
    let mut picking = i64::from(shuffle_picking);
    if picking <= 0 || picking > metrics.count_items {
        picking = metrics.count_items;
    }
    let picking = picking as f64;

    // Owner averages are based on the unadjusted sums
    let owner_duration = metrics.owner_duration as f64;

    metrics.duration = (metrics.duration as f64 / count * picking).round() as i64;

    if metrics.count_owner_items > 0 {
        let owner_items = metrics.count_owner_items as f64;
        let average_owner_item_duration = owner_duration / owner_items;
        let probability = owner_items / count;
        let expected_owner_items = probability * picking.max(1.0);

        metrics.owner_duration = ((average_owner_item_duration * expected_owner_items).round()
            as i64)
            .min(metrics.duration);
    } else {
        metrics.owner_duration = 0;
    }
}

/// Reject owner content beyond the playlist's time limit unless the owner is exempt.
pub fn check_time_limit(
    playlist: &Playlist,
    metrics: &Metrics,
    owner_exempt: bool,
) -> Result<(), MetricsError> {
    if playlist.has_time_limit() && metrics.owner_duration > playlist.time_limit && !owner_exempt {
        tracing::warn!(
            "Playlist {} ('{}') exceeds its time limit: {}s > {}s",
            playlist.playlist_id,
            playlist.playlist_name,
            metrics.owner_duration,
            playlist.time_limit
        );
        return Err(MetricsError::QuotaExceeded {
            limit: playlist.time_limit,
            actual: metrics.owner_duration,
            playlist_name: playlist.playlist_name.clone(),
        });
    }

    Ok(())
}

/// Compute the metrics of a playlist, failing when its time limit is exceeded.
pub fn compute_metrics(
    playlist: &Playlist,
    items: &[Item],
    owner_exempt: bool,
) -> Result<Metrics, MetricsError> {
    let metrics = aggregate(playlist, items);
    check_time_limit(playlist, &metrics, owner_exempt)?;
    Ok(metrics)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDateTime;

    use crate::models::{Item, ItemType, Playlist, PlaylistMode};

    pub const OWNER: i32 = 1;
    pub const OTHER: i32 = 2;

    pub fn playlist() -> Playlist {
        Playlist {
            playlist_id: 10,
            uid: OWNER,
            company_id: 1,
            playlist_name: "Entrance".into(),
            mode: PlaylistMode::Master,
            time_limit: 0,
            shuffle: false,
            shuffle_picking: 0,
            multizone: Vec::new(),
            duration: 0,
            owner_duration: 0,
            filesize: 0,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }

    pub fn item(uid: i32, duration: f64, filesize: i64) -> Item {
        Item {
            item_id: 0,
            playlist_id: 10,
            uid,
            item_type: ItemType::Mediapool,
            file_resource: "media".into(),
            item_name: "media".into(),
            item_duration: duration,
            item_filesize: filesize,
            item_order: 0,
            disabled: false,
        }
    }
}
