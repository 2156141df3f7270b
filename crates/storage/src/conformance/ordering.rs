//! Queue ordering conformance tests.
//!
//! Verifies that the queue stored through a backend keeps insertion order,
//! removes exactly the addressed record, and loses no record fields.

use std::future::Future;
use std::sync::Arc;

use clipsync_core::Mutation;

use super::{ids, make_record, TestResult, QUEUE_KEY};
use crate::{DurableQueue, KeyValueStorage};

pub(super) async fn run_ordering_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "ordering",
            "empty_queue_reads_empty",
            empty_queue_reads_empty(factory).await,
        ),
        TestResult::from_result(
            "ordering",
            "set_then_get_preserves_order",
            set_then_get_preserves_order(factory).await,
        ),
        TestResult::from_result(
            "ordering",
            "update_appends_at_tail",
            update_appends_at_tail(factory).await,
        ),
        TestResult::from_result(
            "ordering",
            "remove_by_id_keeps_relative_order",
            remove_by_id_keeps_relative_order(factory).await,
        ),
        TestResult::from_result(
            "ordering",
            "queue_visible_through_second_handle",
            queue_visible_through_second_handle(factory).await,
        ),
        TestResult::from_result(
            "ordering",
            "every_kind_keeps_its_fields",
            every_kind_keeps_its_fields(factory).await,
        ),
    ]
}

async fn empty_queue_reads_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let queue = DurableQueue::new(factory().await, QUEUE_KEY);
    let records = queue.get().await.map_err(|e| format!("get: {e}"))?;
    if !records.is_empty() {
        return Err(format!("expected empty queue, got {} records", records.len()));
    }
    Ok(())
}

async fn set_then_get_preserves_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let queue = DurableQueue::new(factory().await, QUEUE_KEY);
    let records = vec![
        make_record("r3", Mutation::like("P1", "u")),
        make_record("r1", Mutation::view("P2", "u")),
        make_record("r2", Mutation::bookmark("P1", "u")),
    ];
    queue
        .set(records.clone())
        .await
        .map_err(|e| format!("set: {e}"))?;
    let back = queue.get().await.map_err(|e| format!("get: {e}"))?;
    if back != records {
        return Err(format!(
            "expected {:?}, got {:?}",
            ids(&records),
            ids(&back)
        ));
    }
    Ok(())
}

async fn update_appends_at_tail<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let queue = DurableQueue::new(factory().await, QUEUE_KEY);
    for (i, post) in ["P1", "P2", "P3"].iter().enumerate() {
        let record = make_record(&format!("r{i}"), Mutation::like(post, "u"));
        queue
            .update(move |mut q| {
                q.push(record);
                q
            })
            .await
            .map_err(|e| format!("update {i}: {e}"))?;
    }
    let back = queue.get().await.map_err(|e| format!("get: {e}"))?;
    if ids(&back) != ["r0", "r1", "r2"] {
        return Err(format!("expected [r0, r1, r2], got {:?}", ids(&back)));
    }
    Ok(())
}

async fn remove_by_id_keeps_relative_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let queue = DurableQueue::new(factory().await, QUEUE_KEY);
    queue
        .set(vec![
            make_record("a", Mutation::like("P1", "u")),
            make_record("b", Mutation::follow("P1", "u", "ana")),
            make_record("c", Mutation::comment("P1", "u", "hi")),
            make_record("d", Mutation::share("P1", "u")),
        ])
        .await
        .map_err(|e| format!("set: {e}"))?;
    let committed = queue
        .update(|q| q.into_iter().filter(|r| r.id != "b").collect())
        .await
        .map_err(|e| format!("update: {e}"))?;
    if ids(&committed) != ["a", "c", "d"] {
        return Err(format!("expected [a, c, d], got {:?}", ids(&committed)));
    }
    Ok(())
}

async fn queue_visible_through_second_handle<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let first = DurableQueue::new(storage.clone(), QUEUE_KEY);
    first
        .set(vec![make_record("a", Mutation::reclip("P1", "u", "me"))])
        .await
        .map_err(|e| format!("set: {e}"))?;
    drop(first);

    let second = DurableQueue::new(storage, QUEUE_KEY);
    let back = second.get().await.map_err(|e| format!("get: {e}"))?;
    if ids(&back) != ["a"] {
        return Err(format!("expected [a] through second handle, got {:?}", ids(&back)));
    }
    Ok(())
}

async fn every_kind_keeps_its_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let queue = DurableQueue::new(factory().await, QUEUE_KEY);
    let records = vec![
        make_record("1", Mutation::like("P1", "u")),
        make_record("2", Mutation::bookmark("P1", "u")),
        make_record("3", Mutation::follow("P1", "u", "ana")),
        make_record("4", Mutation::reclip("P1", "u", "me")),
        make_record("5", Mutation::comment("P1", "u", "héllo \"quoted\"").with_user_handle("me")),
        make_record("6", Mutation::reply("P1", "c1", "u", "re")),
        make_record("7", Mutation::comment_like("c1", "u")),
        make_record("8", Mutation::reply_like("c1", "r1", "u")),
        make_record("9", Mutation::view("P1", "u")),
        make_record("10", Mutation::share("P1", "u")),
    ];
    queue
        .set(records.clone())
        .await
        .map_err(|e| format!("set: {e}"))?;
    let back = queue.get().await.map_err(|e| format!("get: {e}"))?;
    for (want, got) in records.iter().zip(back.iter()) {
        if want != got {
            return Err(format!("record {} changed: {want:?} vs {got:?}", want.id));
        }
    }
    if back.len() != records.len() {
        return Err(format!("expected {} records, got {}", records.len(), back.len()));
    }
    Ok(())
}
