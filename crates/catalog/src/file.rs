//! File-backed catalog.
//!
//! Items live in a single JSON array, ordered by identifier. Every mutation
//! runs under an exclusive lock file (`<path>.lock`), re-reads the current
//! contents, applies the change and writes a temporary file that is renamed
//! over the original. Readers never see a partially written catalog, and
//! several processes sharing one catalog file serialize their writes.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::CatalogError;
use crate::query::CatalogQuery;
use crate::record::CatalogItem;
use crate::traits::Catalog;

/// How long a mutation waits for another writer before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);

type Items = BTreeMap<String, CatalogItem>;

#[derive(Debug)]
pub struct FileCatalog {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    writer: Mutex<()>,
}

impl FileCatalog {
    /// Open the catalog at `path`, creating an empty one if it is absent.
    ///
    /// An existing file is read once so a corrupt catalog is reported here
    /// rather than on first use.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create catalog directory", parent, e))?;
        }
        let catalog = Self {
            lock_path: sibling(&path, ".lock"),
            path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            writer: Mutex::new(()),
        };

        let existing = catalog.load().await?;
        if existing.is_empty() && !tokio::fs::try_exists(&catalog.path).await.unwrap_or(false) {
            catalog.mutate(|_| Ok(((), true))).await?;
            debug!(path = %catalog.path.display(), "created catalog");
        }
        Ok(catalog)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Items, CatalogError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Items::new()),
            Err(e) => return Err(io_error("read catalog", &self.path, e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Items::new());
        }
        let items: Vec<CatalogItem> = serde_json::from_slice(&bytes).map_err(|e| {
            CatalogError::Backend(format!("corrupt catalog {}: {e}", self.path.display()))
        })?;
        Ok(items.into_iter().map(|i| (i.id.clone(), i)).collect())
    }

    async fn persist(&self, items: &Items) -> Result<(), CatalogError> {
        let body = serde_json::to_vec_pretty(&items.values().collect::<Vec<_>>())
            .map_err(|e| CatalogError::Backend(format!("serialize catalog: {e}")))?;
        let tmp = sibling(&self.path, ".tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error("write catalog", &tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error("replace catalog", &self.path, e))
    }

    async fn lock(&self) -> Result<WriteGuard<'_>, CatalogError> {
        let in_process = self.writer.lock().await;
        let file = LockFile::acquire(&self.lock_path, self.lock_timeout).await?;
        Ok(WriteGuard {
            _file: file,
            _in_process: in_process,
        })
    }

    /// Apply `change` to the current contents under the write lock.
    ///
    /// `change` returns its result and whether the contents were modified;
    /// unmodified contents are not rewritten.
    async fn mutate<T, F>(&self, change: F) -> Result<T, CatalogError>
    where
        F: FnOnce(&mut Items) -> Result<(T, bool), CatalogError> + Send,
        T: Send,
    {
        let _guard = self.lock().await?;
        let mut items = self.load().await?;
        let (result, modified) = change(&mut items)?;
        if modified {
            self.persist(&items).await?;
        }
        Ok(result)
    }
}

#[async_trait]
impl Catalog for FileCatalog {
    async fn find_one(&self, id: &str) -> Result<Option<CatalogItem>, CatalogError> {
        Ok(self.load().await?.remove(id))
    }

    async fn insert(&self, item: CatalogItem) -> Result<(), CatalogError> {
        let item = item.normalized()?;
        self.mutate(move |items| {
            if items.contains_key(&item.id) {
                return Err(CatalogError::DuplicateKey { id: item.id });
            }
            items.insert(item.id.clone(), item);
            Ok(((), true))
        })
        .await
    }

    async fn replace(&self, item: CatalogItem) -> Result<(), CatalogError> {
        let item = item.normalized()?;
        self.mutate(move |items| match items.get_mut(&item.id) {
            Some(existing) => {
                *existing = item;
                Ok(((), true))
            }
            None => Err(CatalogError::NotFound { id: item.id }),
        })
        .await
    }

    async fn remove(&self, id: &str) -> Result<bool, CatalogError> {
        self.mutate(|items| {
            let removed = items.remove(id).is_some();
            Ok((removed, removed))
        })
        .await
    }

    async fn find(&self, query: &CatalogQuery) -> Result<Vec<CatalogItem>, CatalogError> {
        Ok(self
            .load()
            .await?
            .into_values()
            .filter(|i| query.matches(i))
            .collect())
    }
}

// ── Locking ─────────────────────────────────────────────────────────────────

/// Held for the duration of one mutation. Dropping it releases both locks.
struct WriteGuard<'a> {
    _file: LockFile,
    _in_process: MutexGuard<'a, ()>,
}

/// Exclusive lock file, removed on drop.
#[derive(Debug)]
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    async fn acquire(path: &Path, timeout: Duration) -> Result<Self, CatalogError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .await
            {
                Ok(_) => {
                    return Ok(Self {
                        path: path.to_path_buf(),
                    })
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(CatalogError::Backend(format!(
                            "timed out after {:?} waiting for catalog lock {} \
                             (remove it if no other process is writing)",
                            timeout,
                            path.display()
                        )));
                    }
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                }
                Err(e) => return Err(io_error("create catalog lock", path, e)),
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release catalog lock");
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> CatalogError {
    CatalogError::Backend(format!("{action} {}: {e}", path.display()))
}
