use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CatalogError;
use crate::query::CatalogQuery;
use crate::record::CatalogItem;

/// The storage trait for sample catalogs.
///
/// A `Catalog` holds at most one item per identifier. Implementations store
/// items in their normalized form (see [`CatalogItem::normalized`]) and
/// return query results ordered by identifier.
///
/// ## Uniqueness
///
/// `insert` must be atomic with respect to the identifier check: when several
/// callers insert the same identifier concurrently, exactly one succeeds and
/// the others get `Err(CatalogError::DuplicateKey)`.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single handle can be
/// shared between the orchestrator and executor tasks.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    /// Look up an item by identifier.
    async fn find_one(&self, id: &str) -> Result<Option<CatalogItem>, CatalogError>;

    /// Store a new item.
    ///
    /// Returns `Err(CatalogError::DuplicateKey)` if the identifier exists.
    async fn insert(&self, item: CatalogItem) -> Result<(), CatalogError>;

    /// Overwrite an existing item.
    ///
    /// Returns `Err(CatalogError::NotFound)` if the identifier is absent.
    async fn replace(&self, item: CatalogItem) -> Result<(), CatalogError>;

    /// Delete an item. Returns whether anything was removed.
    async fn remove(&self, id: &str) -> Result<bool, CatalogError>;

    /// All items matching `query`, ordered by identifier.
    async fn find(&self, query: &CatalogQuery) -> Result<Vec<CatalogItem>, CatalogError>;

    async fn count(&self, query: &CatalogQuery) -> Result<usize, CatalogError> {
        Ok(self.find(query).await?.len())
    }
}

#[async_trait]
impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    async fn find_one(&self, id: &str) -> Result<Option<CatalogItem>, CatalogError> {
        (**self).find_one(id).await
    }

    async fn insert(&self, item: CatalogItem) -> Result<(), CatalogError> {
        (**self).insert(item).await
    }

    async fn replace(&self, item: CatalogItem) -> Result<(), CatalogError> {
        (**self).replace(item).await
    }

    async fn remove(&self, id: &str) -> Result<bool, CatalogError> {
        (**self).remove(id).await
    }

    async fn find(&self, query: &CatalogQuery) -> Result<Vec<CatalogItem>, CatalogError> {
        (**self).find(query).await
    }

    async fn count(&self, query: &CatalogQuery) -> Result<usize, CatalogError> {
        (**self).count(query).await
    }
}
