//! Integration tests for metrics propagation
//!
//! Tests cascading recomputation through nested playlists including:
//! - Multi-level propagation and mirroring into nesting items
//! - Shared ancestors (diamonds) and cyclic nesting
//! - Transaction rollback when a time limit is exceeded
//! - Item edits with quota clamping


use signage::db::SqliteStore;
use signage::metrics::{MetricsConfig, MetricsEngine, MetricsError};
use signage::models::{NewItem, PlaylistMetrics};
use test_helpers::*;

fn stored_metrics(engine: &mut TestEngine<'_>, playlist_id: i32) -> PlaylistMetrics {
    let playlist = stored(engine, playlist_id);
    PlaylistMetrics {
        filesize: playlist.filesize,
        duration: playlist.duration,
        owner_duration: playlist.owner_duration,
    }
}

#[test]
fn test_change_propagates_through_all_levels() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");

    let child = create_master(&mut engine, "Child", owner, 0).playlist_id;
    let parent = create_master(&mut engine, "Parent", owner, 0).playlist_id;
    let grandparent = create_master(&mut engine, "Grandparent", owner, 0).playlist_id;

    let clip = seed_media(&mut engine, child, owner, 100.0, 1000);
    seed_media(&mut engine, parent, owner, 20.0, 200);
    let parent_nests_child = seed_nested(&mut engine, parent, owner, child);
    seed_media(&mut engine, grandparent, owner, 30.0, 300);
    seed_nested(&mut engine, grandparent, owner, parent);

    let report = engine.export(child).unwrap();
    assert_eq!(report.updated_playlists, vec![child, parent, grandparent]);
    assert_eq!(report.metrics.duration, 100);
    assert_eq!(report.zone_count, None);
    assert_eq!(stored(&mut engine, parent).duration, 120);
    assert_eq!(stored(&mut engine, grandparent).duration, 150);
    assert_eq!(stored(&mut engine, grandparent).filesize, 1500);

    engine.update_item_duration(owner, clip.item_id, 150).unwrap();

    assert_eq!(stored(&mut engine, child).duration, 150);
    assert_eq!(stored(&mut engine, parent).duration, 170);
    assert_eq!(stored(&mut engine, grandparent).duration, 200);

    let mirrored = stored_item(&mut engine, parent_nests_child.item_id);
    assert_eq!(mirrored.item_duration, 150.0);
    assert_eq!(mirrored.item_filesize, 1000);
}

#[test]
fn test_export_is_idempotent() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");

    let child = create_master(&mut engine, "Child", owner, 0).playlist_id;
    let parent = create_master(&mut engine, "Parent", owner, 0).playlist_id;
    seed_media(&mut engine, child, owner, 12.6, 10);
    seed_media(&mut engine, child, owner, 7.2, 20);
    seed_nested(&mut engine, parent, owner, child);

    let first = engine.export(child).unwrap();
    let after_first = stored_metrics(&mut engine, parent);
    let second = engine.export(child).unwrap();

    assert_eq!(first.metrics, second.metrics);
    assert_eq!(stored_metrics(&mut engine, parent), after_first);
    assert_eq!(after_first.duration, 20);
}

#[test]
fn test_shared_ancestor_is_refreshed_once_and_last() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");

    // top nests left and right, both nest bottom
    let bottom = create_master(&mut engine, "Bottom", owner, 0).playlist_id;
    let left = create_master(&mut engine, "Left", owner, 0).playlist_id;
    let right = create_master(&mut engine, "Right", owner, 0).playlist_id;
    let top = create_master(&mut engine, "Top", owner, 0).playlist_id;

    seed_media(&mut engine, bottom, owner, 10.0, 1);
    seed_media(&mut engine, left, owner, 5.0, 1);
    seed_nested(&mut engine, left, owner, bottom);
    seed_media(&mut engine, right, owner, 7.0, 1);
    seed_nested(&mut engine, right, owner, bottom);
    seed_nested(&mut engine, top, owner, left);
    seed_nested(&mut engine, top, owner, right);

    let report = engine.export(bottom).unwrap();

    assert_eq!(report.updated_playlists.len(), 4);
    assert_eq!(report.updated_playlists.first(), Some(&bottom));
    assert_eq!(report.updated_playlists.last(), Some(&top));
    assert_eq!(stored(&mut engine, top).duration, 32);

    // Stored values are a fixed point of recomputation
    for id in [bottom, left, right, top] {
        let (fresh, _) = engine.preview(id).unwrap();
        assert_eq!(fresh.playlist_view(), stored_metrics(&mut engine, id), "playlist {}", id);
    }
}

#[test]
fn test_cyclic_nesting_is_rejected() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");

    let a = create_master(&mut engine, "A", owner, 0).playlist_id;
    let b = create_master(&mut engine, "B", owner, 0).playlist_id;
    seed_media(&mut engine, a, owner, 30.0, 0);
    seed_nested(&mut engine, a, owner, b);
    seed_nested(&mut engine, b, owner, a);

    let err = engine.export(a).unwrap_err();
    assert!(matches!(err, MetricsError::CyclicNestingDetected { .. }));
    assert_eq!(stored(&mut engine, a).duration, 0);
    assert_eq!(stored(&mut engine, b).duration, 0);
}

#[test]
fn test_self_nesting_is_rolled_back() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");
    let playlist = create_master(&mut engine, "Loop", owner, 0).playlist_id;

    let err = engine
        .add_item(owner, NewItem::nested(playlist, owner, playlist))
        .unwrap_err();

    assert!(matches!(
        err,
        MetricsError::CyclicNestingDetected { playlist_id } if playlist_id == playlist
    ));
    let summary = engine.summary(playlist, owner).unwrap();
    assert_eq!(summary.total_entries, 0);
}

#[test]
fn test_quota_failure_in_ancestor_rolls_back_everything() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");

    let child = create_master(&mut engine, "Child", owner, 0).playlist_id;
    let parent = create_master(&mut engine, "Limited", owner, 200).playlist_id;
    let clip = seed_media(&mut engine, child, owner, 80.0, 0);
    seed_media(&mut engine, parent, owner, 100.0, 0);
    let nesting = seed_nested(&mut engine, parent, owner, child);
    engine.export(child).unwrap();
    assert_eq!(stored(&mut engine, parent).duration, 180);

    let err = engine.update_item_duration(owner, clip.item_id, 150).unwrap_err();
    match err {
        MetricsError::QuotaExceeded {
            limit,
            actual,
            playlist_name,
        } => {
            assert_eq!(limit, 200);
            assert_eq!(actual, 250);
            assert_eq!(playlist_name, "Limited");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err_is_rejection(&engine.update_item_duration(owner, clip.item_id, 150)));

    assert_eq!(stored_item(&mut engine, clip.item_id).item_duration, 80.0);
    assert_eq!(stored(&mut engine, child).duration, 80);
    assert_eq!(stored(&mut engine, parent).duration, 180);
    assert_eq!(stored_item(&mut engine, nesting.item_id).item_duration, 80.0);
}

fn err_is_rejection<T>(result: &Result<T, MetricsError>) -> bool {
    result.as_ref().err().is_some_and(MetricsError::is_rejection)
}

#[test]
fn test_add_item_is_clamped_to_remaining_budget() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");
    let admin = create_admin(&mut engine, "admin");
    let playlist = create_master(&mut engine, "Window", owner, 60).playlist_id;
    seed_media(&mut engine, playlist, owner, 40.0, 0);

    let clamped = engine
        .add_item(owner, NewItem::media(playlist, owner, "a", Some(30.0), 10))
        .unwrap();
    assert_eq!(clamped.item_duration, 20.0);
    assert_eq!(stored(&mut engine, playlist).owner_duration, 60);

    let nothing_left = engine
        .add_item(owner, NewItem::media(playlist, owner, "b", Some(30.0), 10))
        .unwrap();
    assert_eq!(nothing_left.item_duration, 0.0);

    let exempt = engine
        .add_item(admin, NewItem::media(playlist, admin, "c", Some(30.0), 10))
        .unwrap();
    assert_eq!(exempt.item_duration, 30.0);

    let updated = stored(&mut engine, playlist);
    assert_eq!(updated.duration, 90);
    assert_eq!(updated.owner_duration, 60);
    assert_eq!(updated.filesize, 30);
}

#[test]
fn test_add_item_uses_default_duration() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");
    let playlist = create_master(&mut engine, "Images", owner, 0).playlist_id;

    let image = engine
        .add_item(owner, NewItem::media(playlist, owner, "poster", None, 0))
        .unwrap();
    assert_eq!(image.item_duration, 15.0);

    let mut conn = test_conn();
    let mut engine = MetricsEngine::with_config(SqliteStore::new(&mut conn), MetricsConfig::new(8));
    let owner = create_user(&mut engine, "owner");
    let playlist = create_master(&mut engine, "Images", owner, 0).playlist_id;

    let image = engine
        .add_item(owner, NewItem::media(playlist, owner, "poster", None, 0))
        .unwrap();
    assert_eq!(image.item_duration, 8.0);
    assert_eq!(stored(&mut engine, playlist).duration, 8);
}

#[test]
fn test_nested_item_is_clamped_by_container() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");

    let nested = create_master(&mut engine, "Nested", owner, 0).playlist_id;
    seed_media(&mut engine, nested, owner, 100.0, 4096);
    engine.export(nested).unwrap();

    let container = create_master(&mut engine, "Container", owner, 60).playlist_id;
    seed_media(&mut engine, container, owner, 50.0, 0);

    let item = engine
        .add_item(owner, NewItem::nested(container, owner, nested))
        .unwrap();
    assert_eq!(item.item_duration, 10.0);
    assert_eq!(item.item_filesize, 4096);
    assert_eq!(stored(&mut engine, container).owner_duration, 60);
}

#[test]
fn test_nested_item_is_capped_by_own_time_limit() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");
    let guest = create_user(&mut engine, "guest");

    // Foreign content does not count against the nested playlist's limit
    let nested = create_master(&mut engine, "Guest content", owner, 30).playlist_id;
    seed_media(&mut engine, nested, guest, 100.0, 0);
    engine.export(nested).unwrap();
    assert_eq!(stored(&mut engine, nested).duration, 100);

    let container = create_master(&mut engine, "Container", owner, 0).playlist_id;
    let item = engine
        .add_item(owner, NewItem::nested(container, owner, nested))
        .unwrap();
    assert_eq!(item.item_duration, 30.0);
}

#[test]
fn test_edited_item_does_not_count_against_itself() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");
    let playlist = create_master(&mut engine, "Window", owner, 60).playlist_id;
    let first = seed_media(&mut engine, playlist, owner, 40.0, 0);
    seed_media(&mut engine, playlist, owner, 20.0, 0);

    let grown = engine.update_item_duration(owner, first.item_id, 50).unwrap();
    assert_eq!(grown.item_duration, 40.0);

    let shrunk = engine.update_item_duration(owner, first.item_id, 30).unwrap();
    assert_eq!(shrunk.item_duration, 30.0);
    assert_eq!(stored(&mut engine, playlist).owner_duration, 50);
}

#[test]
fn test_remove_item_propagates() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");

    let child = create_master(&mut engine, "Child", owner, 0).playlist_id;
    let parent = create_master(&mut engine, "Parent", owner, 0).playlist_id;
    let first = seed_media(&mut engine, child, owner, 10.0, 100);
    seed_media(&mut engine, child, owner, 20.0, 200);
    seed_nested(&mut engine, parent, owner, child);
    engine.export(child).unwrap();
    assert_eq!(stored(&mut engine, parent).duration, 30);

    engine.remove_item(first.item_id).unwrap();

    assert_eq!(stored(&mut engine, child).duration, 20);
    assert_eq!(stored(&mut engine, parent).duration, 20);
    assert_eq!(stored(&mut engine, parent).filesize, 200);

    let err = engine.remove_item(first.item_id).unwrap_err();
    assert!(matches!(err, MetricsError::ItemNotFound(id) if id == first.item_id));
}

#[test]
fn test_unknown_ids() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);

    assert!(matches!(
        engine.export(999),
        Err(MetricsError::PlaylistNotFound(999))
    ));
    assert!(matches!(
        engine.update_item_duration(1, 999, 10),
        Err(MetricsError::ItemNotFound(999))
    ));
    assert!(matches!(
        engine.add_item(1, NewItem::media(999, 1, "x", Some(5.0), 0)),
        Err(MetricsError::PlaylistNotFound(999))
    ));
}

#[test]
fn test_preview_does_not_write() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");
    let playlist = create_master(&mut engine, "Draft", owner, 0).playlist_id;
    seed_media(&mut engine, playlist, owner, 40.0, 5);

    let (metrics, zone_count) = engine.preview(playlist).unwrap();
    assert_eq!(metrics.duration, 40);
    assert_eq!(metrics.count_items, 1);
    assert_eq!(zone_count, None);
    assert_eq!(stored(&mut engine, playlist).duration, 0);
}

#[test]
fn test_summary_splits_by_viewer() {
    let mut conn = test_conn();
    let mut engine = engine(&mut conn);
    let owner = create_user(&mut engine, "owner");
    let guest = create_user(&mut engine, "guest");
    let playlist = create_master(&mut engine, "Shared", owner, 120).playlist_id;
    seed_media(&mut engine, playlist, owner, 30.0, 100);
    seed_media(&mut engine, playlist, guest, 20.0, 50);
    engine.export(playlist).unwrap();

    let summary = engine.summary(playlist, guest).unwrap();
    assert_eq!(summary.total_entries, 2);
    assert_eq!(summary.total_size, 150);
    assert_eq!(summary.enabled_duration, 50);
    assert_eq!(summary.viewer_duration, 20);
    assert_eq!(summary.time_limit, 120);
    assert_eq!(summary.stored.owner_duration, 30);

    let current = stored(&mut engine, playlist);
    let remaining = engine.allowed_duration(&current, 100, false).unwrap();
    assert_eq!(remaining, 90);
}
