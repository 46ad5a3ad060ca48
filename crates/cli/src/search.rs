//! Product search selection.
//!
//! `[search] endpoint` names either the ASF service or, with a `file://`
//! prefix, a GeoJSON file of previously saved search results. The file form
//! only filters by time; every record is assumed to intersect the area.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use skreddata_core::{Product, ProductSearch, SearchError, SearchQuery};
use skreddata_pipeline::{products_from_collection, AsfSearch};
use tracing::debug;

use crate::config::Config;

pub(crate) fn build_search(config: &Config) -> Arc<dyn ProductSearch> {
    match config.search.endpoint.strip_prefix("file://") {
        Some(path) => Arc::new(SavedSearch {
            path: PathBuf::from(path),
        }),
        None => Arc::new(
            AsfSearch::new(config.search.endpoint.clone()).with_timeout(config.search_timeout()),
        ),
    }
}

/// Search results read from a GeoJSON feature collection on disk.
struct SavedSearch {
    path: PathBuf,
}

#[async_trait]
impl ProductSearch for SavedSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Product>, SearchError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SearchError::Backend(format!("could not read '{}': {e}", self.path.display()))
        })?;
        let collection: geojson::FeatureCollection = serde_json::from_str(&content)
            .map_err(|e| SearchError::MalformedRecord(format!("{}: {e}", self.path.display())))?;

        let products: Vec<Product> = products_from_collection(collection)?
            .into_iter()
            .filter(|p| p.stop_time() >= query.start && p.start_time() <= query.end)
            .collect();
        debug!(path = %self.path.display(), count = products.len(), "saved search");
        Ok(products)
    }
}
