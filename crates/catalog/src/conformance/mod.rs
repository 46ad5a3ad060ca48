//! Conformance test suite for `Catalog` implementations.
//!
//! This module provides a backend-agnostic test suite that any `Catalog`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Insert**: lookup after insert, duplicate detection, normalization
//! - **Query**: ordering, label/time/text filters, count consistency
//! - **Mutate**: replace and remove semantics
//! - **Concurrency**: exactly one winner when producers race on an identifier
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty catalog for each test:
//!
//! ```ignore
//! use skreddata_catalog::conformance::run_conformance_suite;
//! use skreddata_catalog::MemoryCatalog;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryCatalog::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod insert;
mod mutate;
mod query;

use std::fmt;
use std::future::Future;

use skreddata_core::{Area, TimeInterval};

use crate::{Catalog, CatalogItem, Label};

/// Outcome of one conformance check.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// "insert", "query", "mutate" or "concurrent".
    pub category: String,
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: result.is_ok(),
            message: result.err(),
        }
    }
}

/// Every check of one suite run.
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
            "catalog conformance: {} of {} checks passed, {} failed",
            self.passed, self.total, self.failed
        )?;
        for r in self.results.iter().filter(|r| !r.passed) {
            writeln!(
                f,
                "  {}::{} failed: {}",
                r.category,
                r.name,
                r.message.as_deref().unwrap_or("no detail")
            )?;
        }
        Ok(())
    }
}

/// Run the full conformance suite against a catalog backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// catalog, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(insert::run_insert_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);
    results.extend(mutate::run_mutate_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: items with sensible defaults ───────────────────────────────────

/// An item over a small square in northern Norway, January 2020.
fn make_item(id: &str) -> CatalogItem {
    make_item_at(id, "2020-01-01T00:00:00Z", "2020-01-07T00:00:00Z")
}

fn make_item_at(id: &str, t0: &str, t1: &str) -> CatalogItem {
    // Fixed, known-valid inputs.
    let area = Area::parse("19.0,69.6,19.1,69.7").unwrap_or_else(|e| panic!("{e}"));
    let window = TimeInterval::parse_markers(&[t0, t1]).unwrap_or_else(|e| panic!("{e}"));
    CatalogItem::new(id, &area, window)
}

fn make_labeled(id: &str, label: Label, comment: &str) -> CatalogItem {
    make_item(id)
        .with_label(Some(label))
        .with_comment(Some(comment.to_string()))
}

fn ids(items: &[CatalogItem]) -> Vec<&str> {
    items.iter().map(|i| i.id.as_str()).collect()
}
