use std::future::Future;

use super::{make_item, TestResult};
use crate::{Catalog, CatalogError, CatalogQuery, Label};

pub(super) async fn run_mutate_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "mutate",
            "replace_updates_existing_item",
            replace_updates_existing_item(factory).await,
        ),
        TestResult::from_result(
            "mutate",
            "replace_missing_returns_not_found",
            replace_missing_returns_not_found(factory).await,
        ),
        TestResult::from_result(
            "mutate",
            "remove_reports_whether_item_existed",
            remove_reports_whether_item_existed(factory).await,
        ),
        TestResult::from_result(
            "mutate",
            "insert_after_remove_succeeds",
            insert_after_remove_succeeds(factory).await,
        ),
    ]
}

async fn replace_updates_existing_item<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    catalog
        .insert(make_item("s"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let relabeled = make_item("s")
        .with_label(Some(Label::Defected))
        .with_comment(Some("radar artefact".into()));
    catalog
        .replace(relabeled.clone())
        .await
        .map_err(|e| format!("replace: {e}"))?;
    let stored = catalog
        .find_one("s")
        .await
        .map_err(|e| format!("find_one: {e}"))?
        .ok_or("item not found after replace")?;
    if stored != relabeled {
        return Err(format!("expected {relabeled:?}, got {stored:?}"));
    }
    let total = catalog
        .count(&CatalogQuery::All)
        .await
        .map_err(|e| format!("count: {e}"))?;
    if total != 1 {
        return Err(format!("replace changed the item count to {total}"));
    }
    Ok(())
}

async fn replace_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    match catalog.replace(make_item("ghost")).await {
        Err(CatalogError::NotFound { id }) if id == "ghost" => {}
        other => return Err(format!("expected NotFound(ghost), got {other:?}")),
    }
    let stored = catalog
        .find_one("ghost")
        .await
        .map_err(|e| format!("find_one: {e}"))?;
    if stored.is_some() {
        return Err("replace created a missing item".into());
    }
    Ok(())
}

async fn remove_reports_whether_item_existed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    catalog
        .insert(make_item("s"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let first = catalog
        .remove("s")
        .await
        .map_err(|e| format!("remove: {e}"))?;
    let second = catalog
        .remove("s")
        .await
        .map_err(|e| format!("remove again: {e}"))?;
    if !first || second {
        return Err(format!("remove returned {first} then {second}"));
    }
    Ok(())
}

async fn insert_after_remove_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    catalog
        .insert(make_item("s"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    catalog
        .remove("s")
        .await
        .map_err(|e| format!("remove: {e}"))?;
    catalog
        .insert(make_item("s"))
        .await
        .map_err(|e| format!("reinsert: {e}"))?;
    Ok(())
}
