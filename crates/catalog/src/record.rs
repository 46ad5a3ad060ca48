use serde::{Deserialize, Serialize};
use skreddata_core::{Area, TimeInterval};
use time::{OffsetDateTime, UtcOffset};

use crate::error::CatalogError;
use crate::label::Label;

/// One catalogued sample.
///
/// `geometry` is canonical WKT and `t_0`/`t_1` are UTC; backends call
/// [`CatalogItem::normalized`] before storing, so two items describing the
/// same area and window compare equal regardless of how they were written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub geometry: String,
    #[serde(with = "time::serde::rfc3339")]
    pub t_0: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub t_1: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certainty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, area: &Area, window: TimeInterval) -> Self {
        Self {
            id: id.into(),
            geometry: area.to_wkt(),
            t_0: window.start(),
            t_1: window.end(),
            label: None,
            comment: None,
            kind: None,
            certainty: None,
            source: None,
            metadata: None,
        }
    }

    pub fn with_label(mut self, label: Option<Label>) -> Self {
        self.label = label;
        self
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn window(&self) -> Result<TimeInterval, CatalogError> {
        TimeInterval::new(self.t_0, self.t_1).map_err(|e| CatalogError::InvalidItem(e.to_string()))
    }

    /// Canonical form of the item: re-rendered geometry, UTC timestamps.
    ///
    /// Fails on an empty identifier, geometry that is not a single valid
    /// polygon, or `t_0 > t_1`.
    pub fn normalized(mut self) -> Result<Self, CatalogError> {
        if self.id.trim().is_empty() {
            return Err(CatalogError::InvalidItem("identifier is empty".into()));
        }
        let area = Area::parse(&self.geometry)
            .map_err(|e| CatalogError::InvalidItem(format!("{}: {e}", self.id)))?;
        self.geometry = area.to_wkt();
        self.t_0 = self.t_0.to_offset(UtcOffset::UTC);
        self.t_1 = self.t_1.to_offset(UtcOffset::UTC);
        self.window()?;
        Ok(self)
    }
}
