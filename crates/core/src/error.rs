/// Errors raised by the pairing core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed area, time window or grid parameters. Raised before any
    /// search or I/O takes place.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The product search collaborator failed. Surfaced unchanged.
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl CoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            message: message.into(),
        }
    }
}

/// Errors returned by a `ProductSearch` implementation.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Transport or service failure (connection refused, HTTP status, timeout).
    #[error("product search failed: {0}")]
    Backend(String),

    /// A record was returned without the fields the pairing needs.
    #[error("malformed search record: {0}")]
    MalformedRecord(String),
}
