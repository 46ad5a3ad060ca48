pub(crate) mod catalog;
pub(crate) mod gen;

use std::sync::Arc;

use serde::Serialize;
use skreddata_catalog::FileCatalog;

use crate::config::Config;

pub(crate) async fn open_catalog(config: &Config) -> Result<Arc<FileCatalog>, String> {
    FileCatalog::open(config.catalog.path.clone())
        .await
        .map(Arc::new)
        .map_err(|e| format!("could not open catalog: {e}"))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e))
    );
}
