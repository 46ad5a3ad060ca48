//! `skreddata.toml` configuration.
//!
//! Every field has a default, and a missing default file is the same as an
//! empty one. A file named with `--config` must exist.
//!
//! # Example
//!
//! ```toml
//! [catalog]
//! path = "/data/skreddata/catalog.json"
//!
//! [search]
//! endpoint = "https://api.daac.asf.alaska.edu/services/search/param"
//! processing_level = "GRD_HD"
//! timeout_secs = 120
//! spatial_buffer_m = 7500.0
//! margin_days = 12
//! exact_tolerance_minutes = 10
//!
//! [raster]
//! command = "skreddata-raster"
//! scene_dir = "/data/skreddata/scenes"
//!
//! [generate]
//! sample_spacing = 10.0
//! shape = 512
//! concurrency = 8
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use skreddata_core::{
    GridShape, PairSearchOptions, DEFAULT_PROCESSING_LEVEL, DEFAULT_SAMPLE_SPACING,
    DEFAULT_SHAPE, DEFAULT_SPATIAL_BUFFER_M,
};
use skreddata_pipeline::GeneratorConfig;

/// File read when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "skreddata.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub catalog: CatalogSection,
    pub search: SearchSection,
    pub raster: RasterSection,
    pub generate: GenerateSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CatalogSection {
    pub path: PathBuf,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("skreddata-catalog.json"),
        }
    }
}

/// `[search]`. An endpoint starting with `file://` names a GeoJSON file of
/// search results instead of a service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SearchSection {
    pub endpoint: String,
    pub processing_level: String,
    pub timeout_secs: u64,
    pub spatial_buffer_m: f64,
    pub margin_days: i64,
    pub exact_tolerance_minutes: i64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: skreddata_pipeline::asf::DEFAULT_ENDPOINT.to_string(),
            processing_level: DEFAULT_PROCESSING_LEVEL.to_string(),
            timeout_secs: 120,
            spatial_buffer_m: DEFAULT_SPATIAL_BUFFER_M,
            margin_days: 12,
            exact_tolerance_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RasterSection {
    /// Program implementing the raster operations. Required to execute plans.
    pub command: Option<String>,
    pub scene_dir: PathBuf,
}

impl Default for RasterSection {
    fn default() -> Self {
        Self {
            command: None,
            scene_dir: PathBuf::from("scenes"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GenerateSection {
    pub sample_spacing: f64,
    /// Side length of the square sample grid.
    pub shape: u32,
    /// Maximum tasks in flight for the concurrent executor.
    pub concurrency: Option<usize>,
}

impl Default for GenerateSection {
    fn default() -> Self {
        Self {
            sample_spacing: DEFAULT_SAMPLE_SPACING,
            shape: DEFAULT_SHAPE.rows,
            concurrency: None,
        }
    }
}

impl Config {
    /// Load `explicit`, or the default file when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self, String> {
        match explicit {
            Some(path) => Self::read(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::read(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Config = toml::from_str(content).map_err(|e| e.to_string())?;
        config.pair_options()?;
        config.default_shape()?;
        Ok(config)
    }

    pub fn pair_options(&self) -> Result<PairSearchOptions, String> {
        let options = PairSearchOptions {
            spatial_buffer: self.search.spatial_buffer_m,
            exact_times: false,
            processing_level: self.search.processing_level.clone(),
            margin: time::Duration::days(self.search.margin_days),
            exact_tolerance: time::Duration::minutes(self.search.exact_tolerance_minutes),
        };
        options.validate().map_err(|e| e.to_string())?;
        Ok(options)
    }

    pub fn generator_config(&self) -> Result<GeneratorConfig, String> {
        Ok(GeneratorConfig {
            pair_options: self.pair_options()?,
            sample_spacing: self.generate.sample_spacing,
        })
    }

    pub fn default_shape(&self) -> Result<GridShape, String> {
        GridShape::square(self.generate.shape).map_err(|e| e.to_string())
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search.timeout_secs)
    }
}
