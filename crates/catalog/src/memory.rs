use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::CatalogError;
use crate::query::CatalogQuery;
use crate::record::CatalogItem;
use crate::traits::Catalog;

/// In-memory catalog for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: Mutex<BTreeMap<String, CatalogItem>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog pre-populated with `items`.
    pub fn with_items(items: impl IntoIterator<Item = CatalogItem>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for item in items {
            let item = item.normalized()?;
            if map.contains_key(&item.id) {
                return Err(CatalogError::DuplicateKey { id: item.id });
            }
            map.insert(item.id.clone(), item);
        }
        Ok(Self {
            items: Mutex::new(map),
        })
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn find_one(&self, id: &str) -> Result<Option<CatalogItem>, CatalogError> {
        Ok(self.items.lock().await.get(id).cloned())
    }

    async fn insert(&self, item: CatalogItem) -> Result<(), CatalogError> {
        let item = item.normalized()?;
        let mut items = self.items.lock().await;
        if items.contains_key(&item.id) {
            return Err(CatalogError::DuplicateKey { id: item.id });
        }
        items.insert(item.id.clone(), item);
        Ok(())
    }

    async fn replace(&self, item: CatalogItem) -> Result<(), CatalogError> {
        let item = item.normalized()?;
        let mut items = self.items.lock().await;
        match items.get_mut(&item.id) {
            Some(existing) => {
                *existing = item;
                Ok(())
            }
            None => Err(CatalogError::NotFound { id: item.id }),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool, CatalogError> {
        Ok(self.items.lock().await.remove(id).is_some())
    }

    async fn find(&self, query: &CatalogQuery) -> Result<Vec<CatalogItem>, CatalogError> {
        let items = self.items.lock().await;
        Ok(items.values().filter(|i| query.matches(i)).cloned().collect())
    }
}
