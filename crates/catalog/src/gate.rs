use std::sync::Arc;

use tracing::info;

use crate::error::CatalogError;
use crate::record::CatalogItem;
use crate::traits::Catalog;

/// Deduplication check in front of a catalog.
///
/// The gate holds no state of its own: it asks the catalog whether an
/// identifier is already recorded before work is scheduled, and inserts the
/// finished item once all of a sample's outputs exist. The catalog's own
/// uniqueness constraint settles races between producers.
#[derive(Clone)]
pub struct CatalogGate {
    catalog: Arc<dyn Catalog>,
}

impl CatalogGate {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// True when `id` is already catalogued and must not be regenerated.
    pub async fn should_skip(&self, id: &str) -> Result<bool, CatalogError> {
        let existing = self.catalog.find_one(id).await?;
        if existing.is_some() {
            info!(id, "sample already catalogued, skipping");
        }
        Ok(existing.is_some())
    }

    /// Insert a finished sample. A concurrent producer that got there first
    /// surfaces as `CatalogError::DuplicateKey`.
    pub async fn record(&self, item: CatalogItem) -> Result<(), CatalogError> {
        let id = item.id.clone();
        self.catalog.insert(item).await?;
        info!(id = %id, "sample catalogued");
        Ok(())
    }
}

impl std::fmt::Debug for CatalogGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogGate").finish_non_exhaustive()
    }
}
