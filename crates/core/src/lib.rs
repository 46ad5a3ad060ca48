//! skreddata-core: acquisition pairing for avalanche training samples.
//!
//! Turns a flat list of satellite product search results into before/after
//! pairs of passes over an area, and derives the deterministic identifiers
//! samples are catalogued under.
//!
//! # Public API
//!
//! - [`find_pairs()`] -- search, group and pair products for an area and window
//! - [`group_adjacent()`] -- temporal grouping of arbitrary records
//! - [`derive_identifier()`] / [`suffix_identifier()`] -- sample identifiers
//! - [`Area`], [`TimeInterval`], [`ReferenceSystem`], [`GridSpec`] -- validated inputs
//! - [`ProductSearch`] -- the search collaborator seam

pub mod error;
pub mod geometry;
pub mod grouping;
pub mod identifier;
pub mod interval;
pub mod pairs;
pub mod product;
pub mod refsys;
pub mod timestamp;

pub use error::{CoreError, SearchError};
pub use geometry::Area;
pub use grouping::group_adjacent;
pub use identifier::{derive_identifier, suffix_identifier};
pub use interval::TimeInterval;
pub use pairs::{
    find_pairs, Pair, PairSearchOptions, ProductSearch, SearchQuery, DEFAULT_PROCESSING_LEVEL,
    DEFAULT_SPATIAL_BUFFER_M,
};
pub use product::{Product, ProductGroup};
pub use refsys::{GridShape, GridSpec, ReferenceSystem, DEFAULT_SAMPLE_SPACING, DEFAULT_SHAPE};
pub use timestamp::{format_timestamp, parse_timestamp};
