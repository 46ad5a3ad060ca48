//! Before/after pair discovery.
//!
//! The search returns a flat list of products. They are partitioned by
//! acquisition path, grouped into passes with [`group_adjacent`], and each
//! consecutive pair of passes that falls around the requested window becomes
//! a [`Pair`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::error::{CoreError, SearchError};
use crate::geometry::Area;
use crate::grouping::group_adjacent;
use crate::interval::TimeInterval;
use crate::product::{Product, ProductGroup};

/// Processing level requested when none is configured.
pub const DEFAULT_PROCESSING_LEVEL: &str = "GRD_HD";

/// Area buffer applied before searching, in metres.
pub const DEFAULT_SPATIAL_BUFFER_M: f64 = 7500.0;

/// Decimal digits of the WKT sent to the search service.
const SEARCH_WKT_PRECISION: usize = 12;

// ──────────────────────────────────────────────
// Search collaborator
// ──────────────────────────────────────────────

/// A spatial and temporal product query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub processing_level: String,
    pub intersects_with: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

/// Satellite product search backend.
///
/// Implementations return every product intersecting the query area within
/// the query window. Errors are surfaced to the caller as-is; retry policy,
/// if any, belongs to the implementation.
#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Product>, SearchError>;
}

#[async_trait]
impl<S: ProductSearch + ?Sized> ProductSearch for std::sync::Arc<S> {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Product>, SearchError> {
        (**self).search(query).await
    }
}

// ──────────────────────────────────────────────
// Options
// ──────────────────────────────────────────────

/// Tuning knobs for [`find_pairs`].
#[derive(Debug, Clone, PartialEq)]
pub struct PairSearchOptions {
    /// Buffer applied to the area before searching, in metres.
    pub spatial_buffer: f64,
    /// Only keep pairs whose passes start within `exact_tolerance` of the
    /// window ends.
    pub exact_times: bool,
    pub processing_level: String,
    /// Widening applied to both ends of the search window.
    pub margin: Duration,
    pub exact_tolerance: Duration,
}

impl Default for PairSearchOptions {
    fn default() -> Self {
        Self {
            spatial_buffer: DEFAULT_SPATIAL_BUFFER_M,
            exact_times: false,
            processing_level: DEFAULT_PROCESSING_LEVEL.to_string(),
            margin: Duration::days(12),
            exact_tolerance: Duration::minutes(10),
        }
    }
}

impl PairSearchOptions {
    pub fn with_exact_times(mut self, exact_times: bool) -> Self {
        self.exact_times = exact_times;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.spatial_buffer.is_finite() || self.spatial_buffer < 0.0 {
            return Err(CoreError::invalid(format!(
                "spatial buffer must be a non-negative distance, got {}",
                self.spatial_buffer
            )));
        }
        if self.margin.is_negative() || self.exact_tolerance.is_negative() {
            return Err(CoreError::invalid("search margins must not be negative"));
        }
        if self.processing_level.trim().is_empty() {
            return Err(CoreError::invalid("processing level must not be empty"));
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Pairs
// ──────────────────────────────────────────────

/// Two consecutive passes over the area on one acquisition path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pair {
    pub path_number: i64,
    pub before: ProductGroup,
    pub after: ProductGroup,
}

impl Pair {
    /// Interval from the start of `before` to the end of `after`.
    pub fn span(&self) -> TimeInterval {
        self.before.span().hull(&self.after.span())
    }
}

/// Find before/after pairs of passes over `area` around `window`.
///
/// Results are ordered by ascending path number, then by time within the
/// path. Identical inputs and search results always give identical output.
pub async fn find_pairs<S>(
    area: &Area,
    window: TimeInterval,
    search: &S,
    options: &PairSearchOptions,
) -> Result<Vec<Pair>, CoreError>
where
    S: ProductSearch + ?Sized,
{
    options.validate()?;

    let footprint = area.buffered(options.spatial_buffer)?;
    let search_window = window.expanded(options.margin);
    let query = SearchQuery {
        processing_level: options.processing_level.clone(),
        intersects_with: footprint.to_wkt_with_precision(SEARCH_WKT_PRECISION),
        start: search_window.start(),
        end: search_window.end(),
    };
    debug!(
        start = %query.start,
        end = %query.end,
        level = %query.processing_level,
        "searching products"
    );

    let products = search.search(&query).await?;
    debug!(count = products.len(), "search returned products");

    let mut by_path: BTreeMap<i64, Vec<Product>> = BTreeMap::new();
    for product in products {
        by_path.entry(product.path_number()).or_default().push(product);
    }

    let mut pairs = Vec::new();
    for (path_number, products) in by_path {
        let groups = group_adjacent(products, Product::acquisition)
            .into_iter()
            .map(ProductGroup::new)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(path = path_number, passes = groups.len(), "grouped products");

        for window_pair in groups.windows(2) {
            let (before, after) = (&window_pair[0], &window_pair[1]);
            if keeps(before, after, window, options) {
                pairs.push(Pair {
                    path_number,
                    before: before.clone(),
                    after: after.clone(),
                });
            }
        }
    }

    debug!(pairs = pairs.len(), "pair search finished");
    Ok(pairs)
}

/// Selection rule for one consecutive pair of passes.
fn keeps(
    before: &ProductGroup,
    after: &ProductGroup,
    window: TimeInterval,
    options: &PairSearchOptions,
) -> bool {
    let (t0, t1) = (window.start(), window.end());
    if options.exact_times {
        (before.start() - t0).abs() < options.exact_tolerance
            && (after.start() - t1).abs() < options.exact_tolerance
    } else {
        // Partial overlaps are kept: only pairs entirely before or after the
        // window are dropped.
        !(after.start() < t0 || before.start() > t1)
    }
}
