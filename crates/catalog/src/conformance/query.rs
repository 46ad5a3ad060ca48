use std::future::Future;

use time::macros::datetime;

use super::{ids, make_item, make_item_at, make_labeled, TestResult};
use crate::{Catalog, CatalogQuery, Label};

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "query",
            "find_all_is_ordered_by_identifier",
            find_all_is_ordered_by_identifier(factory).await,
        ),
        TestResult::from_result(
            "query",
            "find_on_empty_catalog_is_empty",
            find_on_empty_catalog_is_empty(factory).await,
        ),
        TestResult::from_result(
            "query",
            "label_filters_partition_items",
            label_filters_partition_items(factory).await,
        ),
        TestResult::from_result(
            "query",
            "time_filter_is_inclusive",
            time_filter_is_inclusive(factory).await,
        ),
        TestResult::from_result(
            "query",
            "text_filters_match_substrings",
            text_filters_match_substrings(factory).await,
        ),
        TestResult::from_result(
            "query",
            "count_matches_find",
            count_matches_find(factory).await,
        ),
    ]
}

async fn find_all_is_ordered_by_identifier<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    for id in ["c", "a", "b_01", "b_00"] {
        catalog
            .insert(make_item(id))
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    let all = catalog
        .find(&CatalogQuery::All)
        .await
        .map_err(|e| format!("find: {e}"))?;
    if ids(&all) != ["a", "b_00", "b_01", "c"] {
        return Err(format!("unexpected order {:?}", ids(&all)));
    }
    Ok(())
}

async fn find_on_empty_catalog_is_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    let all = catalog
        .find(&CatalogQuery::All)
        .await
        .map_err(|e| format!("find: {e}"))?;
    if !all.is_empty() {
        return Err(format!("expected no items, got {:?}", ids(&all)));
    }
    Ok(())
}

async fn label_filters_partition_items<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    let items = [
        make_labeled("present", Label::Present, "debris"),
        make_labeled("absent", Label::Absent, "clear"),
        make_item("fresh"),
    ];
    for item in items {
        catalog
            .insert(item)
            .await
            .map_err(|e| format!("insert: {e}"))?;
    }

    let checks: [(CatalogQuery, &[&str]); 4] = [
        (CatalogQuery::Label(Label::Present), &["present"]),
        (CatalogQuery::Label(Label::Unsure), &[]),
        (CatalogQuery::Labeled, &["absent", "present"]),
        (CatalogQuery::Unlabeled, &["fresh"]),
    ];
    for (query, expected) in checks {
        let found = catalog
            .find(&query)
            .await
            .map_err(|e| format!("find {query:?}: {e}"))?;
        if ids(&found) != expected {
            return Err(format!(
                "{query:?}: expected {expected:?}, got {:?}",
                ids(&found)
            ));
        }
    }
    Ok(())
}

async fn time_filter_is_inclusive<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    let items = [
        make_item_at("early", "2020-01-01T00:00:00Z", "2020-01-05T00:00:00Z"),
        make_item_at("late", "2020-01-05T00:00:00Z", "2020-01-09T00:00:00Z"),
        make_item_at("other", "2021-01-01T00:00:00Z", "2021-01-02T00:00:00Z"),
    ];
    for item in items {
        catalog
            .insert(item)
            .await
            .map_err(|e| format!("insert: {e}"))?;
    }

    let boundary = catalog
        .find(&CatalogQuery::At(datetime!(2020-01-05 0:00 UTC)))
        .await
        .map_err(|e| format!("find: {e}"))?;
    if ids(&boundary) != ["early", "late"] {
        return Err(format!("boundary instant matched {:?}", ids(&boundary)));
    }
    let inside = catalog
        .find(&CatalogQuery::At(datetime!(2020-01-07 12:00 UTC)))
        .await
        .map_err(|e| format!("find: {e}"))?;
    if ids(&inside) != ["late"] {
        return Err(format!("inner instant matched {:?}", ids(&inside)));
    }
    Ok(())
}

async fn text_filters_match_substrings<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    let items = [
        make_labeled("lyngen_00", Label::Present, "wet slab release"),
        make_labeled("lyngen_01", Label::Unsure, "possible debris"),
        make_labeled("tamok", Label::Present, "dry slab"),
    ];
    for item in items {
        catalog
            .insert(item)
            .await
            .map_err(|e| format!("insert: {e}"))?;
    }

    let by_id = catalog
        .find(&CatalogQuery::IdentifierContains("lyngen".into()))
        .await
        .map_err(|e| format!("find: {e}"))?;
    if ids(&by_id) != ["lyngen_00", "lyngen_01"] {
        return Err(format!("identifier filter matched {:?}", ids(&by_id)));
    }
    let by_comment = catalog
        .find(&CatalogQuery::CommentContains("slab".into()))
        .await
        .map_err(|e| format!("find: {e}"))?;
    if ids(&by_comment) != ["lyngen_00", "tamok"] {
        return Err(format!("comment filter matched {:?}", ids(&by_comment)));
    }
    let both = catalog
        .find(&CatalogQuery::all_of(vec![
            CatalogQuery::IdentifierContains("lyngen".into()),
            CatalogQuery::CommentContains("slab".into()),
        ]))
        .await
        .map_err(|e| format!("find: {e}"))?;
    if ids(&both) != ["lyngen_00"] {
        return Err(format!("combined filter matched {:?}", ids(&both)));
    }
    Ok(())
}

async fn count_matches_find<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: Catalog,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let catalog = factory().await;
    for i in 0..5 {
        let item = if i % 2 == 0 {
            make_labeled(&format!("s{i}"), Label::Absent, "none")
        } else {
            make_item(&format!("s{i}"))
        };
        catalog
            .insert(item)
            .await
            .map_err(|e| format!("insert s{i}: {e}"))?;
    }
    for query in [
        CatalogQuery::All,
        CatalogQuery::Labeled,
        CatalogQuery::Unlabeled,
    ] {
        let found = catalog
            .find(&query)
            .await
            .map_err(|e| format!("find: {e}"))?
            .len();
        let counted = catalog
            .count(&query)
            .await
            .map_err(|e| format!("count: {e}"))?;
        if found != counted {
            return Err(format!("{query:?}: find {found} != count {counted}"));
        }
    }
    let labeled = catalog
        .count(&CatalogQuery::Labeled)
        .await
        .map_err(|e| format!("count: {e}"))?;
    if labeled != 3 {
        return Err(format!("expected 3 labeled items, got {labeled}"));
    }
    Ok(())
}
