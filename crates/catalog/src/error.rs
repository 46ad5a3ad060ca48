/// All errors that can be returned by a `Catalog` implementation.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// An item with this identifier is already catalogued. Raised by
    /// `insert`, including when two producers race on the same identifier.
    #[error("catalog item already exists: {id}")]
    DuplicateKey { id: String },

    /// No item with the given identifier.
    #[error("catalog item not found: {id}")]
    NotFound { id: String },

    /// The item cannot be stored: empty identifier, unparseable geometry,
    /// reversed time window or an unknown label code.
    #[error("invalid catalog item: {0}")]
    InvalidItem(String),

    /// A backend-specific error (I/O, lock contention, serialization).
    #[error("catalog backend error: {0}")]
    Backend(String),
}

impl CatalogError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, CatalogError::DuplicateKey { .. })
    }
}
