use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use clipsync_core::Mutation;

use super::{make_record, TestResult, QUEUE_KEY};
use crate::{DurableQueue, KeyValueStorage};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 16;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_appends_all_persist",
            concurrent_appends_all_persist(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "two_near_simultaneous_appends",
            two_near_simultaneous_appends(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "removal_during_appends_keeps_appends",
            removal_during_appends_keeps_appends(factory).await,
        ),
    ]
}

// ── Concurrent appends: none lost ───────────────────────────────────────────

/// N tasks each append one record through the same queue. Every update spans
/// at least two backend awaits, so without single-writer serialization a
/// last-write-wins overwrite would drop appends.
async fn concurrent_appends_all_persist<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let queue = Arc::new(DurableQueue::new(factory().await, QUEUE_KEY));

    let mut handles = Vec::new();
    for i in 0..N {
        let q = queue.clone();
        handles.push(tokio::spawn(async move {
            let record = make_record(&format!("r{i}"), Mutation::view(&format!("P{i}"), "u"));
            q.update(move |mut records| {
                records.push(record);
                records
            })
            .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("update: {e}"))?;
    }

    let records = queue.get().await.map_err(|e| format!("get: {e}"))?;
    if records.len() != N {
        return Err(format!("expected {N} records, got {}", records.len()));
    }
    let unique: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
    if unique.len() != N {
        return Err(format!("expected {N} distinct ids, got {}", unique.len()));
    }
    Ok(())
}

// ── Like + bookmark issued together ─────────────────────────────────────────

async fn two_near_simultaneous_appends<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let queue = DurableQueue::new(factory().await, QUEUE_KEY);
    let like = make_record("like", Mutation::like("P1", "u"));
    let bookmark = make_record("bookmark", Mutation::bookmark("P1", "u"));

    let (a, b) = tokio::join!(
        queue.update(move |mut q| {
            q.push(like);
            q
        }),
        queue.update(move |mut q| {
            q.push(bookmark);
            q
        }),
    );
    a.map_err(|e| format!("like update: {e}"))?;
    b.map_err(|e| format!("bookmark update: {e}"))?;

    let len = queue.len().await.map_err(|e| format!("len: {e}"))?;
    if len != 2 {
        return Err(format!("expected 2 records, got {len}"));
    }
    Ok(())
}

// ── Removal racing appends ──────────────────────────────────────────────────

/// A drain removes records by id while new records are being appended; the
/// removal must not resurrect a stale snapshot that drops the appends.
async fn removal_during_appends_keeps_appends<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let queue = Arc::new(DurableQueue::new(factory().await, QUEUE_KEY));
    queue
        .set(vec![make_record("old", Mutation::like("P1", "u"))])
        .await
        .map_err(|e| format!("seed: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let q = queue.clone();
        handles.push(tokio::spawn(async move {
            let record = make_record(&format!("new{i}"), Mutation::share("P1", "u"));
            q.update(move |mut records| {
                records.push(record);
                records
            })
            .await
        }));
    }
    queue
        .update(|q| q.into_iter().filter(|r| r.id != "old").collect())
        .await
        .map_err(|e| format!("remove: {e}"))?;
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("update: {e}"))?;
    }

    let records = queue.get().await.map_err(|e| format!("get: {e}"))?;
    if records.iter().any(|r| r.id == "old") {
        return Err("removed record reappeared".to_string());
    }
    if records.len() != N {
        return Err(format!("expected {N} appended records, got {}", records.len()));
    }
    Ok(())
}
