use std::path::PathBuf;

use skreddata_catalog::CatalogError;
use skreddata_core::{CoreError, SearchError};

use crate::graph::NodeId;

/// Errors returned by a `RasterEngine` implementation.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// The engine could not be started or reached.
    #[error("raster engine unavailable: {0}")]
    Unavailable(String),

    /// The engine ran and reported a failure.
    #[error("raster engine failed: {0}")]
    Failed(String),
}

/// Failure of one node in a task graph.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output could not be serialized before writing.
    #[error("serialize {}: {message}", path.display())]
    Serialize { path: PathBuf, message: String },

    /// An upstream node failed, so this one never ran.
    #[error("dependency {0} did not complete")]
    DependencyFailed(NodeId),

    /// The task panicked or was cancelled by the runtime.
    #[error("task aborted: {0}")]
    Aborted(String),
}

impl TaskError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, TaskError::Catalog(e) if e.is_duplicate_key())
    }
}

/// A task graph edge that points at a node that does not exist yet.
#[derive(Debug, thiserror::Error)]
#[error("node {node} depends on {dependency}, which is not in the graph yet")]
pub struct GraphError {
    pub node: NodeId,
    pub dependency: NodeId,
}

/// Errors raised while planning sample generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Malformed area, time window or grid parameters. Raised before any
    /// search or I/O.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl GenerateError {
    /// True when the failure is an insert race lost to another producer.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            GenerateError::Catalog(e) => e.is_duplicate_key(),
            GenerateError::Task(e) => e.is_duplicate_key(),
            _ => false,
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, GenerateError::InvalidInput(_))
    }
}

impl From<CoreError> for GenerateError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidInput { message } => GenerateError::InvalidInput(message),
            CoreError::Search(e) => GenerateError::Search(e),
        }
    }
}
