//! Per-sample files written by the task graph.
//!
//! Every sample lives in its own directory under the output root, named by
//! its identifier, so samples never overwrite one another's files.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;
use skreddata_catalog::Label;
use skreddata_core::{format_timestamp, Area, TimeInterval};

use crate::error::TaskError;

/// File locations of one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePaths {
    pub dir: PathBuf,
    pub metadata: PathBuf,
    pub input_region: PathBuf,
    pub cross_section: PathBuf,
    pub elevation: PathBuf,
}

impl SamplePaths {
    pub fn new(output_root: &Path, id: &str) -> Self {
        let dir = output_root.join(id);
        Self {
            metadata: dir.join(format!("{id}_products.json")),
            input_region: dir.join(format!("{id}_aoi.geojson")),
            cross_section: dir.join(format!("{id}_crs.tif")),
            elevation: dir.join(format!("{id}_dem.tif")),
            dir,
        }
    }
}

/// The requested area as a single-feature collection, with the sample's
/// identifier, window and annotations as properties.
pub fn input_region(
    id: &str,
    area: &Area,
    window: &TimeInterval,
    label: Option<Label>,
    comment: Option<&str>,
) -> geojson::FeatureCollection {
    let mut properties = serde_json::Map::new();
    properties.insert("id".into(), json!(id));
    properties.insert("t_0".into(), json!(format_timestamp(window.start())));
    properties.insert("t_1".into(), json!(format_timestamp(window.end())));
    if let Some(label) = label {
        properties.insert("label".into(), json!(label.code()));
    }
    if let Some(comment) = comment {
        properties.insert("comment".into(), json!(comment));
    }
    geojson::FeatureCollection {
        bbox: None,
        features: vec![geojson::Feature {
            bbox: None,
            geometry: Some(area.to_geojson_geometry()),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }],
        foreign_members: None,
    }
}

/// Serialize `value` as pretty JSON to `path`, creating parent directories.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf, TaskError> {
    let body = serde_json::to_vec_pretty(value).map_err(|e| TaskError::Serialize {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    ensure_parent(path).await?;
    tokio::fs::write(path, body).await.map_err(|source| TaskError::Io {
        action: "write",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(path.to_path_buf())
}

pub async fn ensure_parent(path: &Path) -> Result<(), TaskError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| TaskError::Io {
                action: "create directory",
                path: parent.to_path_buf(),
                source,
            }),
        _ => Ok(()),
    }
}
