//! Conformance test suite for `KeyValueStorage` implementations.
//!
//! A backend-agnostic suite that any storage backend can run to verify it
//! is fit to hold the mutation queue. The suite covers:
//!
//! - **Key-value basics**: missing keys, overwrite, removal, key isolation
//! - **Queue ordering**: insertion order is replay order, removal by id
//! - **Concurrency**: concurrent appends through one queue are all kept
//! - **Error handling**: corrupt payloads are reported, never overwritten
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use clipsync_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn sqlite_conformance() {
//!     let report = run_conformance_suite(|| async { open_test_sqlite().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod error;
mod kv;
mod ordering;

use std::fmt;
use std::future::Future;

use clipsync_core::{Mutation, MutationRecord};

use crate::KeyValueStorage;

/// Key the suite stores its queue under.
const QUEUE_KEY: &str = "conformance:mutations";

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "kv", "ordering").
    pub category: String,
    /// Test name (e.g. "missing_key_reads_none").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        TestResult {
            category: category.to_string(),
            name: name.to_string(),
            passed: result.is_ok(),
            message: result.err(),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in self.results.iter().filter(|r| !r.passed) {
            writeln!(
                f,
                "  FAIL [{}/{}]: {}",
                r.category,
                r.name,
                r.message.as_deref().unwrap_or("(no message)")
            )?;
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(kv::run_kv_tests(&factory).await);
    results.extend(ordering::run_ordering_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_record(id: &str, mutation: Mutation) -> MutationRecord {
    MutationRecord {
        id: id.to_string(),
        at: 1_700_000_000_000,
        mutation,
    }
}

fn ids(records: &[MutationRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}
