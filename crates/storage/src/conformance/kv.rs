use std::future::Future;

use super::TestResult;
use crate::KeyValueStorage;

pub(super) async fn run_kv_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "kv",
            "missing_key_reads_none",
            missing_key_reads_none(factory).await,
        ),
        TestResult::from_result("kv", "set_then_get", set_then_get(factory).await),
        TestResult::from_result(
            "kv",
            "set_overwrites_whole_value",
            set_overwrites_whole_value(factory).await,
        ),
        TestResult::from_result(
            "kv",
            "remove_deletes_value",
            remove_deletes_value(factory).await,
        ),
        TestResult::from_result(
            "kv",
            "remove_missing_key_is_ok",
            remove_missing_key_is_ok(factory).await,
        ),
        TestResult::from_result(
            "kv",
            "keys_are_isolated",
            keys_are_isolated(factory).await,
        ),
    ]
}

async fn missing_key_reads_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("never-written").await {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {other:?}")),
    }
}

async fn set_then_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set("k", r#"[{"a":1}]"#)
        .await
        .map_err(|e| format!("set: {e}"))?;
    let value = s.get("k").await.map_err(|e| format!("get: {e}"))?;
    if value.as_deref() != Some(r#"[{"a":1}]"#) {
        return Err(format!("expected stored value back, got {value:?}"));
    }
    Ok(())
}

async fn set_overwrites_whole_value<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set("k", "a much longer first value")
        .await
        .map_err(|e| format!("set 1: {e}"))?;
    s.set("k", "short").await.map_err(|e| format!("set 2: {e}"))?;
    let value = s.get("k").await.map_err(|e| format!("get: {e}"))?;
    if value.as_deref() != Some("short") {
        return Err(format!("expected 'short', got {value:?}"));
    }
    Ok(())
}

async fn remove_deletes_value<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set("k", "v").await.map_err(|e| format!("set: {e}"))?;
    s.remove("k").await.map_err(|e| format!("remove: {e}"))?;
    match s.get("k").await {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None) after remove, got {other:?}")),
    }
}

async fn remove_missing_key_is_ok<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.remove("never-written")
        .await
        .map_err(|e| format!("remove of missing key failed: {e}"))
}

async fn keys_are_isolated<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set("app:a", "1").await.map_err(|e| format!("set a: {e}"))?;
    s.set("app:b", "2").await.map_err(|e| format!("set b: {e}"))?;
    s.remove("app:a").await.map_err(|e| format!("remove a: {e}"))?;
    let b = s.get("app:b").await.map_err(|e| format!("get b: {e}"))?;
    if b.as_deref() != Some("2") {
        return Err(format!("removing app:a disturbed app:b: {b:?}"));
    }
    Ok(())
}
