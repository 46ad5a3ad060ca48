//! Raster collaborator seam.
//!
//! Geocoding, mosaicking and raster I/O live outside this crate. The task
//! graph only needs three operations: fetch a scene, render the before/after
//! cross-section onto a grid, and render terrain elevation onto the same
//! grid. Every request is serializable so an engine can run out of process.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use skreddata_core::{GridSpec, Product};

use crate::error::RasterError;

/// Download (or locate in a cache) the scene behind one product.
#[derive(Debug, Clone, Serialize)]
pub struct FetchRequest {
    pub product: Product,
    pub scene_dir: PathBuf,
}

/// Combine the scenes of two passes into one multi-band raster on `grid`.
#[derive(Debug, Clone, Serialize)]
pub struct CrossSectionRequest {
    pub grid: GridSpec,
    pub area_wkt: String,
    pub before: Vec<PathBuf>,
    pub after: Vec<PathBuf>,
}

/// Mosaic terrain elevation covering `area_wkt` onto `grid`.
#[derive(Debug, Clone, Serialize)]
pub struct ElevationRequest {
    pub grid: GridSpec,
    pub area_wkt: String,
}

#[async_trait]
pub trait RasterEngine: Send + Sync + 'static {
    /// Returns the local path of the scene.
    async fn fetch_scene(&self, request: &FetchRequest) -> Result<PathBuf, RasterError>;

    /// Writes the cross-section raster to `target` and returns the path
    /// actually written.
    async fn render_cross_section(
        &self,
        request: &CrossSectionRequest,
        target: &Path,
    ) -> Result<PathBuf, RasterError>;

    async fn render_elevation(
        &self,
        request: &ElevationRequest,
        target: &Path,
    ) -> Result<PathBuf, RasterError>;
}
