//! Sample generation planning.
//!
//! [`Generator`] turns a request (area, time window, output root) into task
//! graph nodes. Pairs come from the pair finder in discovery order; each gets
//! an identifier, is checked against the catalog, and, unless already
//! catalogued, contributes its metadata, input-region, cross-section and
//! elevation nodes plus a final catalog insert. Nothing runs until the plan's
//! graph is handed to an executor.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use skreddata_catalog::{CatalogGate, CatalogItem, Label};
use skreddata_core::{
    derive_identifier, find_pairs, suffix_identifier, Area, GridShape, GridSpec, Pair,
    PairSearchOptions, Product, ProductSearch, ReferenceSystem, TimeInterval,
    DEFAULT_SAMPLE_SPACING,
};
use tracing::{debug, info, warn};

use crate::artifacts::{input_region, SamplePaths};
use crate::error::GenerateError;
use crate::executor::GraphReport;
use crate::graph::{NodeId, SampleMetadata, Task, TaskGraph, TaskOutput};

// ──────────────────────────────────────────────
// Request
// ──────────────────────────────────────────────

/// One generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub area: Area,
    pub window: TimeInterval,
    pub output_root: PathBuf,
    /// Defaults to the UTM zone of the area's centroid.
    pub refsys: Option<ReferenceSystem>,
    /// Defaults to 512x512.
    pub shape: Option<GridShape>,
    /// Used verbatim as the base identifier when given.
    pub identifier: Option<String>,
    pub label: Option<Label>,
    pub comment: Option<String>,
    /// Keep only pairs whose passes start at the window ends.
    pub exact_times: bool,
}

impl GenerateRequest {
    pub fn new(area: Area, window: TimeInterval, output_root: impl Into<PathBuf>) -> Self {
        Self {
            area,
            window,
            output_root: output_root.into(),
            refsys: None,
            shape: None,
            identifier: None,
            label: None,
            comment: None,
            exact_times: false,
        }
    }

    /// Parse an area descriptor and one or two time markers.
    pub fn parse<S: AsRef<str>>(
        area: &str,
        markers: &[S],
        output_root: impl Into<PathBuf>,
    ) -> Result<Self, GenerateError> {
        let area = Area::parse(area)?;
        let window = TimeInterval::parse_markers(markers)?;
        Ok(Self::new(area, window, output_root))
    }

    pub fn with_refsys(mut self, refsys: Option<ReferenceSystem>) -> Self {
        self.refsys = refsys;
        self
    }

    pub fn with_shape(mut self, shape: Option<GridShape>) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_identifier(mut self, identifier: Option<String>) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn with_label(mut self, label: Option<Label>) -> Self {
        self.label = label;
        self
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn with_exact_times(mut self, exact_times: bool) -> Self {
        self.exact_times = exact_times;
        self
    }
}

/// Settings shared by every request a generator plans.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub pair_options: PairSearchOptions,
    /// Grid sample spacing in reference-system units.
    pub sample_spacing: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            pair_options: PairSearchOptions::default(),
            sample_spacing: DEFAULT_SAMPLE_SPACING,
        }
    }
}

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// Deferred outputs of one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleOutputs {
    /// Metadata, input region, cross-section and elevation nodes.
    pub files: Vec<NodeId>,
    pub catalog_item: NodeId,
}

/// A sample that could not be planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanFailure {
    pub id: String,
    pub error: String,
}

/// Task graph plus the identifier → outputs mapping built from it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationPlan {
    pub graph: TaskGraph,
    /// In pair discovery order, request by request.
    pub samples: IndexMap<String, SampleOutputs>,
    /// Identifiers left out because they were already catalogued or planned.
    pub skipped: Vec<String>,
    pub failed: Vec<PlanFailure>,
    #[serde(skip)]
    scenes: BTreeMap<String, NodeId>,
}

/// Realized outputs of one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleResult {
    pub files: Vec<PathBuf>,
    pub catalog_item: Option<CatalogItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl SampleResult {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.catalog_item.is_some()
    }
}

impl GenerationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Fetch node for `product`, shared by every sample that uses its scene.
    fn fetch_node(&mut self, product: &Product) -> Result<NodeId, GenerateError> {
        let key = product.scene_key();
        if let Some(&id) = self.scenes.get(&key) {
            return Ok(id);
        }
        let id = self.graph.add(Task::FetchScene {
            product: product.clone(),
        })?;
        self.scenes.insert(key, id);
        Ok(id)
    }

    /// Map each planned sample to what its nodes produced, in plan order.
    pub fn realize(&self, report: &GraphReport) -> IndexMap<String, SampleResult> {
        self.samples
            .iter()
            .map(|(id, outputs)| {
                let mut result = SampleResult {
                    files: Vec::new(),
                    catalog_item: None,
                    errors: Vec::new(),
                };
                for node in outputs.files.iter().chain([&outputs.catalog_item]) {
                    match report.outcome(*node) {
                        Some(Ok(TaskOutput::File(path))) => result.files.push(path.clone()),
                        Some(Ok(TaskOutput::Item(item))) => result.catalog_item = Some(item.clone()),
                        Some(Err(e)) => result.errors.push(format!("{node}: {e}")),
                        None => result.errors.push(format!("{node}: not executed")),
                    }
                }
                (id.clone(), result)
            })
            .collect()
    }
}

// ──────────────────────────────────────────────
// Generator
// ──────────────────────────────────────────────

pub struct Generator {
    search: Arc<dyn ProductSearch>,
    gate: CatalogGate,
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(search: Arc<dyn ProductSearch>, gate: CatalogGate, config: GeneratorConfig) -> Self {
        Self {
            search,
            gate,
            config,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Plan a single request.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerationPlan, GenerateError> {
        let mut plan = GenerationPlan::new();
        self.plan_into(request, &mut plan).await?;
        Ok(plan)
    }

    /// Plan several requests into one graph.
    ///
    /// A request that fails (bad input, search error) is recorded in
    /// `failed` as `request <index>` and the remaining requests are still
    /// planned.
    pub async fn plan_batch(&self, requests: &[GenerateRequest]) -> GenerationPlan {
        let mut plan = GenerationPlan::new();
        for (index, request) in requests.iter().enumerate() {
            if let Err(e) = self.plan_into(request, &mut plan).await {
                warn!(request = index, error = %e, "request could not be planned");
                plan.failed.push(PlanFailure {
                    id: format!("request {index}"),
                    error: e.to_string(),
                });
            }
        }
        info!(
            requests = requests.len(),
            samples = plan.samples.len(),
            failed = plan.failed.len(),
            "batch planned"
        );
        plan
    }

    /// Add a request's samples to an existing plan and return the
    /// identifiers that were added.
    ///
    /// Input and search errors fail the whole request before anything is
    /// added. A catalog lookup failure only affects its own sample, which is
    /// recorded in `plan.failed`.
    pub async fn plan_into(
        &self,
        request: &GenerateRequest,
        plan: &mut GenerationPlan,
    ) -> Result<Vec<String>, GenerateError> {
        let refsys = match request.refsys {
            Some(refsys) => refsys,
            None => ReferenceSystem::utm_for(request.area.centroid())?,
        };
        let shape = request.shape.unwrap_or_default();
        let area_wkt = request.area.to_wkt();
        let grid = GridSpec::centred_on(
            request.area.centroid(),
            shape,
            self.config.sample_spacing,
            refsys,
        )?;
        let base = match &request.identifier {
            Some(id) => {
                validate_identifier(id)?;
                id.clone()
            }
            None => derive_identifier(&area_wkt, &request.window, &refsys.descriptor(), shape),
        };

        let options = if request.exact_times {
            self.config.pair_options.clone().with_exact_times(true)
        } else {
            self.config.pair_options.clone()
        };
        let pairs = find_pairs(&request.area, request.window, self.search.as_ref(), &options).await?;
        info!(id = %base, pairs = pairs.len(), window = %request.window, "pairs found");

        let mut added = Vec::new();
        let total = pairs.len();
        for (index, pair) in pairs.into_iter().enumerate() {
            let id = suffix_identifier(&base, index, total);
            if plan.samples.contains_key(&id) {
                info!(id = %id, "sample already planned, skipping");
                plan.skipped.push(id);
                continue;
            }
            match self.gate.should_skip(&id).await {
                Ok(true) => {
                    plan.skipped.push(id);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(id = %id, error = %e, "catalog lookup failed");
                    plan.failed.push(PlanFailure {
                        id,
                        error: e.to_string(),
                    });
                    continue;
                }
            }

            let outputs = self.add_sample(plan, request, &id, pair, &grid, &area_wkt, refsys)?;
            debug!(id = %id, nodes = outputs.files.len() + 1, "sample planned");
            plan.samples.insert(id.clone(), outputs);
            added.push(id);
        }
        Ok(added)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_sample(
        &self,
        plan: &mut GenerationPlan,
        request: &GenerateRequest,
        id: &str,
        pair: Pair,
        grid: &GridSpec,
        area_wkt: &str,
        refsys: ReferenceSystem,
    ) -> Result<SampleOutputs, GenerateError> {
        let paths = SamplePaths::new(&request.output_root, id);

        let before = pair
            .before
            .products()
            .iter()
            .map(|p| plan.fetch_node(p))
            .collect::<Result<Vec<_>, _>>()?;
        let after = pair
            .after
            .products()
            .iter()
            .map(|p| plan.fetch_node(p))
            .collect::<Result<Vec<_>, _>>()?;

        let span = pair.span();
        let scenes = |products: &[Product]| -> Vec<String> {
            products.iter().map(Product::scene_key).collect()
        };
        let item_metadata = json!({
            "path_number": pair.path_number,
            "reference_system": refsys.descriptor(),
            "shape": [grid.shape().rows, grid.shape().cols],
            "before": scenes(pair.before.products()),
            "after": scenes(pair.after.products()),
        });

        let metadata = plan.graph.add(Task::WriteMetadata {
            path: paths.metadata,
            metadata: SampleMetadata {
                id: id.to_string(),
                reference_system: refsys.descriptor(),
                grid: grid.clone(),
                pair,
            },
        })?;
        let region = plan.graph.add(Task::WriteInputRegion {
            path: paths.input_region,
            region: input_region(
                id,
                &request.area,
                &request.window,
                request.label,
                request.comment.as_deref(),
            ),
        })?;
        let cross_section = plan.graph.add(Task::RenderCrossSection {
            path: paths.cross_section,
            grid: grid.clone(),
            area_wkt: area_wkt.to_string(),
            before,
            after,
        })?;
        let elevation = plan.graph.add(Task::RenderElevation {
            path: paths.elevation,
            grid: grid.clone(),
            area_wkt: area_wkt.to_string(),
        })?;

        let files = vec![metadata, region, cross_section, elevation];
        let item = CatalogItem::new(id, &request.area, span)
            .with_label(request.label)
            .with_comment(request.comment.clone())
            .with_metadata(item_metadata);
        let catalog_item = plan.graph.add(Task::InsertCatalog {
            item,
            inputs: files.clone(),
        })?;

        Ok(SampleOutputs {
            files,
            catalog_item,
        })
    }
}

/// Caller-supplied identifiers name the sample directory under the output
/// root, so they must be a single non-empty path component.
fn validate_identifier(id: &str) -> Result<(), GenerateError> {
    if id.trim().is_empty() {
        return Err(GenerateError::InvalidInput("identifier is empty".into()));
    }
    if id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
        return Err(GenerateError::InvalidInput(format!(
            "identifier '{id}' must not contain path separators or be a relative path component"
        )));
    }
    Ok(())
}
