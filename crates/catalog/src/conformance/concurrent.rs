use std::future::Future;
use std::sync::Arc;

use super::{make_item, TestResult};
use crate::{Catalog, CatalogError, CatalogQuery};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_insert_exactly_one_wins",
            concurrent_insert_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_inserts_different_ids_all_succeed",
            concurrent_inserts_different_ids_all_succeed(factory).await,
        ),
    ]
}

// ── Concurrent insert: exactly one wins ─────────────────────────────────────

/// N tasks insert the same identifier. Exactly one insert succeeds; the rest
/// must get DuplicateKey.
async fn concurrent_insert_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let c = catalog.clone();
        handles.push(tokio::spawn(async move {
            let item = make_item("contested").with_comment(Some(format!("producer-{i}")));
            match c.insert(item).await {
                Ok(()) => Ok(true),
                Err(CatalogError::DuplicateKey { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: CatalogError| format!("catalog error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    let total = catalog
        .count(&CatalogQuery::All)
        .await
        .map_err(|e| format!("count: {e}"))?;
    if total != 1 {
        return Err(format!("expected 1 stored item, got {total}"));
    }
    Ok(())
}

// ── Concurrent inserts of different identifiers: all succeed ────────────────

/// N tasks each insert a different identifier. All should succeed, with no
/// lost writes.
async fn concurrent_inserts_different_ids_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let c = catalog.clone();
        handles.push(tokio::spawn(async move {
            c.insert(make_item(&format!("sample-{i:02}"))).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
    }

    let total = catalog
        .count(&CatalogQuery::All)
        .await
        .map_err(|e| format!("count: {e}"))?;
    if total != N {
        return Err(format!("expected {N} items, got {total}"));
    }
    Ok(())
}
