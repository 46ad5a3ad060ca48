pub mod conformance;
mod error;
mod file;
mod gate;
mod label;
mod memory;
mod query;
mod record;
mod traits;

pub use error::CatalogError;
pub use file::{FileCatalog, DEFAULT_LOCK_TIMEOUT};
pub use gate::CatalogGate;
pub use label::Label;
pub use memory::MemoryCatalog;
pub use query::CatalogQuery;
pub use record::CatalogItem;
pub use traits::Catalog;
