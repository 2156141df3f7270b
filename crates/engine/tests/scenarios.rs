//! End-to-end behaviour of the offline queue and optimistic commands:
//! the canonical scenarios plus rollback exactness and idempotent settle.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clipsync_core::MutationKind;
use clipsync_engine::{CommandError, EventCause, EventKind, Outcome};
use serde_json::json;

use common::{rig, ME};

// ──────────────────────────────────────────────
// Scenario A: offline like, reconnect, drain
// ──────────────────────────────────────────────

#[tokio::test]
async fn offline_like_is_optimistic_then_drained() {
    let r = rig(false);

    let out = r.sync.toggle_like("P1").await.unwrap();
    assert!(matches!(out, Outcome::Queued(_)));

    let post = r.sync.posts().get("P1").unwrap();
    assert_eq!(post.stats.likes, 11);
    assert!(post.user_liked);

    let queued = r.sync.queue().pending().await.unwrap();
    assert_eq!(queued.len(), 1);
    let persisted = serde_json::to_value(&queued[0]).unwrap();
    assert_eq!(persisted["type"], "like");
    assert_eq!(persisted["postId"], "P1");
    assert_eq!(persisted["userId"], common::ME_ID);
    assert!(r.server.calls().is_empty());

    r.net.set_online(true);
    let report = r.sync.drain().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.replayed, vec![queued[0].id.clone()]);
    assert!(r.sync.queue().is_empty().await.unwrap());
    assert_eq!(r.server.calls(), vec!["like:P1"]);
}

// ──────────────────────────────────────────────
// Scenario B: online follow rejected
// ──────────────────────────────────────────────

#[tokio::test]
async fn online_follow_rejection_rolls_back_and_surfaces() {
    let r = rig(true);
    r.server.fail(MutationKind::Follow);

    let err = r.sync.toggle_follow("P1").await.unwrap_err();
    match err {
        CommandError::Remote { kind, entity_id, .. } => {
            assert_eq!(kind, MutationKind::Follow);
            assert_eq!(entity_id, "P1");
        }
        other => panic!("expected remote error, got {other:?}"),
    }
    assert!(!r.sync.posts().get("P1").unwrap().is_following);
    assert!(r.sync.queue().is_empty().await.unwrap());
    assert_eq!(r.server.calls(), vec!["follow:U1"]);
}

// ──────────────────────────────────────────────
// Scenario C: replay order across kinds
// ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn drain_replays_follow_before_comment() {
    let r = rig(false);
    r.sync.toggle_follow("P1").await.unwrap();
    r.sync.add_comment("P1", "hi").await.unwrap();

    let kinds: Vec<_> = r
        .sync
        .queue()
        .pending()
        .await
        .unwrap()
        .iter()
        .map(|rec| rec.kind())
        .collect();
    assert_eq!(kinds, vec![MutationKind::Follow, MutationKind::Comment]);

    // The follow endpoint is slow; the comment must still wait for it.
    r.server.delay(MutationKind::Follow, Duration::from_secs(3));
    r.net.set_online(true);
    let report = r.sync.drain().await.unwrap();

    assert_eq!(report.replayed.len(), 2);
    assert_eq!(r.server.calls(), vec!["follow:U1", "comment:P1"]);
}

// ──────────────────────────────────────────────
// Scenario D: concurrent offline commands both persist
// ──────────────────────────────────────────────

#[tokio::test]
async fn near_simultaneous_offline_commands_both_queue() {
    let r = rig(false);
    let (like, bookmark) = tokio::join!(r.sync.toggle_like("P1"), r.sync.toggle_bookmark("P1"));
    assert!(matches!(like.unwrap(), Outcome::Queued(_)));
    assert!(matches!(bookmark.unwrap(), Outcome::Queued(_)));

    assert_eq!(r.sync.queue().len().await.unwrap(), 2);
    let post = r.sync.posts().get("P1").unwrap();
    assert!(post.user_liked);
    assert!(post.is_bookmarked);
}

// ──────────────────────────────────────────────
// Rollback exactness
// ──────────────────────────────────────────────

#[tokio::test]
async fn failed_online_like_is_bit_identical_to_before() {
    let r = rig(true);
    r.server.fail(MutationKind::Like);
    let before = r.sync.posts().get("P1").unwrap();

    assert!(r.sync.toggle_like("P1").await.is_err());

    let after = r.sync.posts().get("P1").unwrap();
    assert_eq!(after, before);
    assert_eq!(after.view_state(), before.view_state());
}

#[tokio::test]
async fn failed_unlike_restores_liked_state() {
    let r = rig(true);
    r.sync.toggle_like("P1").await.unwrap();
    let liked = r.sync.posts().get("P1").unwrap();
    assert!(liked.user_liked);

    r.server.fail(MutationKind::Like);
    assert!(r.sync.toggle_like("P1").await.is_err());
    assert_eq!(r.sync.posts().get("P1").unwrap(), liked);
}

// ──────────────────────────────────────────────
// Idempotent settle
// ──────────────────────────────────────────────

#[tokio::test]
async fn draining_a_queued_like_leaves_ui_state_alone() {
    let r = rig(false);
    r.sync.toggle_like("P1").await.unwrap();
    r.sync.track_view("P1").await.unwrap();
    let shown = r.sync.posts().get("P1").unwrap();
    let before = r.sync.queue().len().await.unwrap();

    r.server.fail(MutationKind::View);
    r.net.set_online(true);
    let report = r.sync.drain().await.unwrap();

    assert_eq!(report.replayed.len(), 1);
    assert_eq!(r.sync.queue().len().await.unwrap(), before - 1);
    assert_eq!(r.sync.posts().get("P1").unwrap(), shown);
}

// ──────────────────────────────────────────────
// Partial failure containment and retry
// ──────────────────────────────────────────────

#[tokio::test]
async fn failed_replay_keeps_rest_queued_for_next_drain() {
    let r = rig(false);
    r.sync.toggle_like("P1").await.unwrap();
    r.sync.toggle_bookmark("P1").await.unwrap();
    r.sync.track_share("P2").await.unwrap();
    let all = r.sync.queue().pending().await.unwrap();

    r.net.set_online(true);
    r.server.fail(MutationKind::Bookmark);
    let first = r.sync.drain().await.unwrap();
    let abort = first.aborted.clone().unwrap();
    assert_eq!(abort.record_id, all[1].id);
    assert_eq!(abort.kind, MutationKind::Bookmark);
    assert_eq!(r.sync.queue().pending().await.unwrap(), all[1..].to_vec());

    r.server.heal();
    let second = r.sync.drain().await.unwrap();
    assert!(second.is_complete());
    assert_eq!(second.replayed, vec![all[1].id.clone(), all[2].id.clone()]);
    assert_eq!(
        r.server.calls(),
        vec!["like:P1", "bookmark:P1", "bookmark:P1", "share:P2"]
    );
}

#[tokio::test]
async fn overlapping_drains_replay_each_record_once() {
    let r = rig(false);
    for _ in 0..3 {
        r.sync.track_share("P1").await.unwrap();
    }
    r.net.set_online(true);

    let (a, b) = tokio::join!(r.sync.drain(), r.sync.drain());
    let replayed = a.unwrap().replayed.len() + b.unwrap().replayed.len();
    assert_eq!(replayed, 3);
    assert_eq!(r.server.calls().len(), 3);
}

// ──────────────────────────────────────────────
// Cross-surface sync through the bus
// ──────────────────────────────────────────────

#[tokio::test]
async fn confirmed_like_reaches_other_surfaces() {
    let r = rig(true);
    let feed_card = Arc::new(Mutex::new(None));
    let viewer = Arc::new(Mutex::new(None));
    let (f, v) = (feed_card.clone(), viewer.clone());
    let _feed = r.sync.bus().subscribe(EventKind::LikeToggled, "P1", move |e| {
        *f.lock().unwrap() = Some(e.detail.clone());
    });
    let _viewer = r.sync.bus().subscribe(EventKind::LikeToggled, "P1", move |e| {
        assert_eq!(e.cause, EventCause::Confirmed);
        *v.lock().unwrap() = Some(e.detail.clone());
    });

    r.sync.toggle_like("P1").await.unwrap();

    let expected = json!({ "liked": true, "likes": 11 });
    assert_eq!(feed_card.lock().unwrap().clone(), Some(expected.clone()));
    assert_eq!(viewer.lock().unwrap().clone(), Some(expected));
}

#[tokio::test]
async fn queued_state_is_not_announced() {
    let r = rig(false);
    let hits = Arc::new(Mutex::new(0));
    let h = hits.clone();
    let _sub = r.sync.bus().subscribe(EventKind::LikeToggled, "P1", move |_| {
        *h.lock().unwrap() += 1;
    });

    r.sync.toggle_like("P1").await.unwrap();
    assert_eq!(*hits.lock().unwrap(), 0);
    assert_eq!(r.sync.actor().user_handle, ME);
}

// ──────────────────────────────────────────────
// Reconnect-triggered drain
// ──────────────────────────────────────────────

#[tokio::test]
async fn going_online_drains_in_background() {
    let common::Rig { sync, net, server } = rig(false);
    let sync = Arc::new(sync);
    let worker = sync.spawn_reconnect_drain();

    sync.toggle_like("P1").await.unwrap();
    sync.toggle_bookmark("P2").await.unwrap();
    assert_eq!(sync.queue().len().await.unwrap(), 2);

    net.set_online(true);
    for _ in 0..200 {
        if sync.queue().is_empty().await.unwrap() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(sync.queue().is_empty().await.unwrap());
    assert_eq!(server.calls(), vec!["like:P1", "bookmark:P2"]);
    worker.abort();
}

#[tokio::test]
async fn going_offline_does_not_drain() {
    let common::Rig { sync, net, server } = rig(true);
    let sync = Arc::new(sync);
    let worker = sync.spawn_reconnect_drain();

    net.set_online(false);
    sync.toggle_like("P1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(sync.queue().len().await.unwrap(), 1);
    assert!(server.calls().is_empty());
    worker.abort();
}
