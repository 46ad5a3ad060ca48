use std::future::Future;

use skreddata_core::Area;
use time::macros::datetime;

use super::{make_item, TestResult};
use crate::{Catalog, CatalogError};

pub(super) async fn run_insert_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "insert",
            "insert_then_find_one",
            insert_then_find_one(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "find_one_missing_returns_none",
            find_one_missing_returns_none(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "duplicate_insert_returns_duplicate_key",
            duplicate_insert_returns_duplicate_key(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "duplicate_insert_keeps_first_item",
            duplicate_insert_keeps_first_item(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "insert_normalizes_geometry",
            insert_normalizes_geometry(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "insert_normalizes_timestamps_to_utc",
            insert_normalizes_timestamps_to_utc(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "insert_rejects_invalid_item",
            insert_rejects_invalid_item(factory).await,
        ),
    ]
}

async fn insert_then_find_one<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    let item = make_item("sample-1");
    catalog
        .insert(item.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let found = catalog
        .find_one("sample-1")
        .await
        .map_err(|e| format!("find_one: {e}"))?
        .ok_or("inserted item not found")?;
    if found != item {
        return Err(format!("expected {item:?}, got {found:?}"));
    }
    Ok(())
}

async fn find_one_missing_returns_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    match catalog.find_one("nope").await {
        Ok(None) => Ok(()),
        Ok(Some(item)) => Err(format!("unexpected item {item:?}")),
        Err(e) => Err(format!("find_one: {e}")),
    }
}

async fn duplicate_insert_returns_duplicate_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    catalog
        .insert(make_item("dup"))
        .await
        .map_err(|e| format!("first insert: {e}"))?;
    match catalog.insert(make_item("dup")).await {
        Err(CatalogError::DuplicateKey { id }) if id == "dup" => Ok(()),
        Err(e) => Err(format!("expected DuplicateKey(dup), got {e:?}")),
        Ok(()) => Err("second insert succeeded".into()),
    }
}

async fn duplicate_insert_keeps_first_item<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    let first = make_item("dup").with_comment(Some("first".into()));
    let second = make_item("dup").with_comment(Some("second".into()));
    catalog
        .insert(first)
        .await
        .map_err(|e| format!("first insert: {e}"))?;
    let _ = catalog.insert(second).await;
    let stored = catalog
        .find_one("dup")
        .await
        .map_err(|e| format!("find_one: {e}"))?
        .ok_or("item vanished")?;
    if stored.comment.as_deref() != Some("first") {
        return Err(format!("first item overwritten: {:?}", stored.comment));
    }
    Ok(())
}

async fn insert_normalizes_geometry<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    let raw = "POLYGON ((19.0 69.6, 19.0 69.7, 19.1 69.7, 19.1 69.6, 19.0 69.6))";
    let expected = Area::parse(raw)
        .map_err(|e| format!("parse: {e}"))?
        .to_wkt();
    let mut item = make_item("geom");
    item.geometry = raw.into();
    catalog
        .insert(item)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let stored = catalog
        .find_one("geom")
        .await
        .map_err(|e| format!("find_one: {e}"))?
        .ok_or("item not found")?;
    if stored.geometry != expected {
        return Err(format!(
            "expected canonical geometry {expected}, got {}",
            stored.geometry
        ));
    }
    Ok(())
}

async fn insert_normalizes_timestamps_to_utc<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    let mut item = make_item("tz");
    item.t_0 = datetime!(2020-01-01 01:00 +01:00);
    catalog
        .insert(item)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let stored = catalog
        .find_one("tz")
        .await
        .map_err(|e| format!("find_one: {e}"))?
        .ok_or("item not found")?;
    if !stored.t_0.offset().is_utc() || stored.t_0 != datetime!(2020-01-01 0:00 UTC) {
        return Err(format!("t_0 not normalized to UTC: {}", stored.t_0));
    }
    Ok(())
}

async fn insert_rejects_invalid_item<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    let mut item = make_item("bad");
    item.geometry = "LINESTRING (0 0, 1 1)".into();
    match catalog.insert(item).await {
        Err(CatalogError::InvalidItem(_)) => {}
        other => return Err(format!("expected InvalidItem, got {other:?}")),
    }
    let stored = catalog
        .find_one("bad")
        .await
        .map_err(|e| format!("find_one: {e}"))?;
    if stored.is_some() {
        return Err("invalid item was stored".into());
    }
    Ok(())
}
