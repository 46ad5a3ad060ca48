//! Planning and executing sample generation against in-memory collaborators.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use skreddata_catalog::{
    Catalog, CatalogError, CatalogGate, CatalogItem, CatalogQuery, Label, MemoryCatalog,
};
use skreddata_core::{
    derive_identifier, Area, GridShape, Product, ProductSearch, SearchError, SearchQuery,
    TimeInterval, DEFAULT_SHAPE,
};
use skreddata_pipeline::{
    ConcurrentExecutor, CrossSectionRequest, ElevationRequest, Executor, FetchRequest,
    GenerateRequest, GenerationPlan, Generator, GeneratorConfig, RasterEngine, RasterError,
    SequentialExecutor, Task, TaskContext, TaskError, TaskOutput,
};
use time::macros::datetime;
use time::OffsetDateTime;

// ── Collaborators ───────────────────────────────────────────────────────────

struct CannedSearch {
    products: Vec<Product>,
    calls: AtomicUsize,
}

impl CannedSearch {
    fn new(products: Vec<Product>) -> Arc<Self> {
        Arc::new(Self {
            products,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductSearch for CannedSearch {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<Product>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.products.clone())
    }
}

/// Fails every query reaching into 2021.
struct FailsAfter2020(Arc<CannedSearch>);

#[async_trait]
impl ProductSearch for FailsAfter2020 {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Product>, SearchError> {
        if query.end > datetime!(2021-01-01 0:00 UTC) {
            return Err(SearchError::Backend("service unavailable".into()));
        }
        self.0.search(query).await
    }
}

/// In-memory catalog whose lookups of one identifier fail.
struct UnreadableEntry {
    inner: MemoryCatalog,
    unreadable: String,
}

#[async_trait]
impl Catalog for UnreadableEntry {
    async fn find_one(&self, id: &str) -> Result<Option<CatalogItem>, CatalogError> {
        if id == self.unreadable {
            return Err(CatalogError::Backend("connection reset".into()));
        }
        self.inner.find_one(id).await
    }

    async fn insert(&self, item: CatalogItem) -> Result<(), CatalogError> {
        self.inner.insert(item).await
    }

    async fn replace(&self, item: CatalogItem) -> Result<(), CatalogError> {
        self.inner.replace(item).await
    }

    async fn remove(&self, id: &str) -> Result<bool, CatalogError> {
        self.inner.remove(id).await
    }

    async fn find(&self, query: &CatalogQuery) -> Result<Vec<CatalogItem>, CatalogError> {
        self.inner.find(query).await
    }
}

/// Writes small placeholder files. Fetches of scenes named `broken` fail;
/// fetches of scenes named `panic` panic.
#[derive(Default)]
struct PlaceholderRaster {
    fetches: AtomicUsize,
}

async fn touch(path: &Path, body: &str) -> Result<PathBuf, RasterError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RasterError::Failed(e.to_string()))?;
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|e| RasterError::Failed(e.to_string()))?;
    Ok(path.to_path_buf())
}

#[async_trait]
impl RasterEngine for PlaceholderRaster {
    async fn fetch_scene(&self, request: &FetchRequest) -> Result<PathBuf, RasterError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let key = request.product.scene_key();
        match key.as_str() {
            "broken" => Err(RasterError::Failed("scene download failed".into())),
            "panic" => panic!("raster engine crashed"),
            _ => touch(&request.scene_dir.join(format!("{key}.zip")), &key).await,
        }
    }

    async fn render_cross_section(
        &self,
        request: &CrossSectionRequest,
        target: &Path,
    ) -> Result<PathBuf, RasterError> {
        let body = format!("{} before, {} after", request.before.len(), request.after.len());
        touch(target, &body).await
    }

    async fn render_elevation(
        &self,
        _request: &ElevationRequest,
        target: &Path,
    ) -> Result<PathBuf, RasterError> {
        touch(target, "dem").await
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────────

fn pass(path: i64, start: OffsetDateTime, name: &str) -> Product {
    Product::new(path, start, start + time::Duration::seconds(25))
        .unwrap()
        .with_scene_name(name)
}

/// One pair on path 42 around the window.
fn single_pair() -> Vec<Product> {
    vec![
        pass(42, datetime!(2019-12-31 05:00 UTC), "p42-before"),
        pass(42, datetime!(2020-01-06 05:00 UTC), "p42-after"),
        pass(42, datetime!(2020-01-12 05:00 UTC), "p42-later"),
    ]
}

/// Pairs on path 3 and path 42.
fn two_paths(path3_before: &str) -> Vec<Product> {
    let mut products = single_pair();
    products.push(pass(3, datetime!(2019-12-28 17:00 UTC), path3_before));
    products.push(pass(3, datetime!(2020-01-09 17:00 UTC), "p3-after"));
    products
}

/// Pairs on paths 3, 42 and 77.
fn three_paths() -> Vec<Product> {
    let mut products = two_paths("p3-before");
    products.push(pass(77, datetime!(2019-12-30 06:00 UTC), "p77-before"));
    products.push(pass(77, datetime!(2020-01-11 06:00 UTC), "p77-after"));
    products
}

/// One pass a day on path 1, starting 2020-01-01.
fn daily_passes(days: i64) -> Vec<Product> {
    (0..days)
        .map(|day| {
            let start = datetime!(2020-01-01 05:00 UTC) + time::Duration::days(day);
            pass(1, start, &format!("day-{day}"))
        })
        .collect()
}

fn area() -> Area {
    Area::parse("POLYGON((10 60,10.036 60,10.036 60.018,10 60.018,10 60))").unwrap()
}

fn window() -> TimeInterval {
    TimeInterval::parse_markers(&["2020-01-01T00:00Z", "2020-01-02T00:00Z"]).unwrap()
}

struct Harness {
    search: Arc<CannedSearch>,
    catalog: Arc<MemoryCatalog>,
    raster: Arc<PlaceholderRaster>,
    generator: Generator,
    ctx: TaskContext,
    dir: tempfile::TempDir,
}

impl Harness {
    fn new(products: Vec<Product>) -> Self {
        Self::with_config(products, GeneratorConfig::default())
    }

    fn with_config(products: Vec<Product>, config: GeneratorConfig) -> Self {
        let search = CannedSearch::new(products);
        let catalog = Arc::new(MemoryCatalog::new());
        let raster = Arc::new(PlaceholderRaster::default());
        let gate = CatalogGate::new(catalog.clone());
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new(search.clone(), gate.clone(), config);
        let ctx = TaskContext::new(raster.clone(), gate, dir.path().join("scenes"));
        Self {
            search,
            catalog,
            raster,
            generator,
            ctx,
            dir,
        }
    }

    fn output_root(&self) -> PathBuf {
        self.dir.path().join("samples")
    }

    fn request(&self) -> GenerateRequest {
        GenerateRequest::new(area(), window(), self.output_root())
    }

    async fn plan(&self) -> GenerationPlan {
        self.generator.generate(&self.request()).await.unwrap()
    }

    async fn catalogued(&self) -> Vec<String> {
        self.catalog
            .find(&CatalogQuery::All)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.id)
            .collect()
    }
}

fn base_id() -> String {
    derive_identifier(&area().to_wkt(), &window(), "EPSG:32632", DEFAULT_SHAPE)
}

// ── Planning ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_pair_plans_one_sample() {
    let h = Harness::new(single_pair());
    let plan = h.plan().await;

    let id = base_id();
    assert_eq!(plan.samples.keys().collect::<Vec<_>>(), [&id]);
    assert_eq!(
        plan.graph.summary(),
        vec![
            ("fetch_scene", 2),
            ("write_metadata", 1),
            ("write_input_region", 1),
            ("render_cross_section", 1),
            ("render_elevation", 1),
            ("insert_catalog", 1),
        ]
    );
    // Planning performs no I/O.
    assert!(!h.output_root().exists());
    assert_eq!(h.raster.fetches.load(Ordering::SeqCst), 0);
    assert!(h.catalogued().await.is_empty());
}

#[tokio::test]
async fn several_pairs_get_numbered_suffixes() {
    let h = Harness::new(three_paths());
    let plan = h.plan().await;

    let base = base_id();
    let ids: Vec<_> = plan.samples.keys().cloned().collect();
    assert_eq!(
        ids,
        [format!("{base}_00"), format!("{base}_01"), format!("{base}_02")]
    );
}

#[tokio::test]
async fn samples_keep_discovery_order_past_a_hundred_pairs() {
    let h = Harness::new(daily_passes(102));
    let window = TimeInterval::parse_markers(&["2020-01-01", "2020-05-01"]).unwrap();
    let request = GenerateRequest::new(area(), window, h.output_root())
        .with_identifier(Some("b".into()));
    let plan = h.generator.generate(&request).await.unwrap();

    let expected: Vec<String> = (0..101).map(|i| format!("b_{i:02}")).collect();
    assert_eq!(plan.samples.keys().cloned().collect::<Vec<_>>(), expected);
    assert_eq!(plan.samples.keys().nth(100).map(String::as_str), Some("b_100"));

    let report = SequentialExecutor.execute(&plan.graph, &h.ctx).await;
    let results = plan.realize(&report);
    assert_eq!(results.keys().cloned().collect::<Vec<_>>(), expected);
    assert!(results.values().all(|r| r.is_complete()));
}

#[tokio::test]
async fn explicit_identifier_and_grid_are_used() {
    let h = Harness::new(single_pair());
    let request = h
        .request()
        .with_identifier(Some("slide-17".into()))
        .with_shape(Some(GridShape::square(1024).unwrap()));
    let plan = h.generator.generate(&request).await.unwrap();
    assert!(plan.samples.contains_key("slide-17"));
}

#[tokio::test]
async fn passes_shared_between_pairs_are_fetched_once() {
    let products = vec![
        pass(42, datetime!(2019-12-31 05:00 UTC), "a"),
        pass(42, datetime!(2020-01-01 12:00 UTC), "b"),
        pass(42, datetime!(2020-01-06 05:00 UTC), "c"),
    ];
    let h = Harness::new(products);
    let plan = h.plan().await;

    assert_eq!(plan.samples.len(), 2);
    assert_eq!(plan.graph.summary()[0], ("fetch_scene", 3));

    let report = SequentialExecutor.execute(&plan.graph, &h.ctx).await;
    assert_eq!(report.failures().count(), 0);
    assert_eq!(h.raster.fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn invalid_input_fails_before_searching() {
    let h = Harness::new(single_pair());
    let err = h
        .generator
        .generate(&h.request().with_identifier(Some("  ".into())))
        .await
        .unwrap_err();
    assert!(err.is_invalid_input());

    let bad_spacing = GeneratorConfig {
        sample_spacing: 0.0,
        ..GeneratorConfig::default()
    };
    let h2 = Harness::with_config(single_pair(), bad_spacing);
    let err = h2.generator.generate(&h2.request()).await.unwrap_err();
    assert!(err.is_invalid_input());

    assert!(GenerateRequest::parse("not an area", &["2020-01-01"], "out")
        .unwrap_err()
        .is_invalid_input());

    assert_eq!(h.search.calls(), 0);
    assert_eq!(h2.search.calls(), 0);
}

#[tokio::test]
async fn identifiers_that_escape_the_output_root_are_rejected() {
    let h = Harness::new(single_pair());
    for id in ["../escape", "a/b", "..", ".", "a\\b"] {
        let err = h
            .generator
            .generate(&h.request().with_identifier(Some(id.into())))
            .await
            .unwrap_err();
        assert!(err.is_invalid_input(), "{id}: {err}");
    }
    assert_eq!(h.search.calls(), 0);
}

#[tokio::test]
async fn catalog_lookup_failure_only_drops_its_own_sample() {
    let base = base_id();
    let catalog = UnreadableEntry {
        inner: MemoryCatalog::new(),
        unreadable: format!("{base}_00"),
    };
    let generator = Generator::new(
        CannedSearch::new(two_paths("p3-before")),
        CatalogGate::new(Arc::new(catalog)),
        GeneratorConfig::default(),
    );
    let dir = tempfile::tempdir().unwrap();
    let plan = generator
        .generate(&GenerateRequest::new(area(), window(), dir.path()))
        .await
        .unwrap();

    assert_eq!(plan.failed.len(), 1);
    assert_eq!(plan.failed[0].id, format!("{base}_00"));
    assert!(plan.failed[0].error.contains("connection reset"));
    assert_eq!(plan.samples.keys().collect::<Vec<_>>(), [&format!("{base}_01")]);

    // Only path 42's pair has nodes; path 3's scenes are never fetched.
    let fetched: Vec<String> = plan
        .graph
        .iter()
        .filter_map(|(_, task)| match task {
            Task::FetchScene { product } => Some(product.scene_key()),
            _ => None,
        })
        .collect();
    assert_eq!(fetched, ["p42-before", "p42-after"]);
    let inserts: Vec<&str> = plan
        .graph
        .iter()
        .filter_map(|(_, task)| match task {
            Task::InsertCatalog { item, .. } => Some(item.id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(inserts, [format!("{base}_01")]);
    assert_eq!(plan.graph.len(), 7);
}

#[tokio::test]
async fn batch_keeps_planning_after_a_failed_request() {
    let search = CannedSearch::new(single_pair());
    let generator = Generator::new(
        Arc::new(FailsAfter2020(search.clone())),
        CatalogGate::new(Arc::new(MemoryCatalog::new())),
        GeneratorConfig::default(),
    );
    let dir = tempfile::tempdir().unwrap();
    let request = |id: &str, window: TimeInterval| {
        GenerateRequest::new(area(), window, dir.path()).with_identifier(Some(id.into()))
    };
    let later = TimeInterval::parse_markers(&["2021-06-01"]).unwrap();
    let requests = [
        request("first", window()),
        request("unreachable", later),
        request("third", window()),
    ];

    let plan = generator.plan_batch(&requests).await;

    assert_eq!(plan.samples.keys().collect::<Vec<_>>(), ["first", "third"]);
    assert_eq!(plan.failed.len(), 1);
    assert_eq!(plan.failed[0].id, "request 1");
    assert!(plan.failed[0].error.contains("service unavailable"));
    assert_eq!(search.calls(), 2);
}

#[tokio::test]
async fn batch_plans_skip_identifiers_already_planned() {
    let h = Harness::new(single_pair());
    let mut plan = GenerationPlan::new();
    let first = h.generator.plan_into(&h.request(), &mut plan).await.unwrap();
    let nodes = plan.graph.len();
    let second = h.generator.plan_into(&h.request(), &mut plan).await.unwrap();

    assert_eq!(first, [base_id()]);
    assert!(second.is_empty());
    assert_eq!(plan.skipped, [base_id()]);
    assert_eq!(plan.graph.len(), nodes);
}

// ── Execution ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn executing_writes_files_then_catalogues() {
    let h = Harness::new(single_pair());
    let request = h
        .request()
        .with_label(Some(Label::Present))
        .with_comment(Some("north face".into()));
    let plan = h.generator.generate(&request).await.unwrap();
    let report = SequentialExecutor.execute(&plan.graph, &h.ctx).await;
    assert_eq!(report.succeeded(), plan.graph.len());

    let results = plan.realize(&report);
    let id = base_id();
    let sample = &results[&id];
    assert!(sample.is_complete());
    assert_eq!(sample.files.len(), 4);
    for file in &sample.files {
        assert!(file.starts_with(h.output_root().join(&id)), "{}", file.display());
        assert!(file.exists(), "{}", file.display());
    }

    let metadata: serde_json::Value = serde_json::from_slice(
        &std::fs::read(h.output_root().join(&id).join(format!("{id}_products.json"))).unwrap(),
    )
    .unwrap();
    assert_eq!(metadata["id"], id.as_str());
    assert_eq!(metadata["path_number"], 42);
    assert_eq!(metadata["reference_system"], "EPSG:32632");

    let item = h.catalog.find_one(&id).await.unwrap().unwrap();
    assert_eq!(item.label, Some(Label::Present));
    assert_eq!(item.comment.as_deref(), Some("north face"));
    assert_eq!(sample.catalog_item.as_ref().map(|i| i.id.as_str()), Some(id.as_str()));
    assert_eq!(item.window().unwrap().start(), datetime!(2019-12-31 05:00 UTC));
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let h = Harness::new(two_paths("p3-before"));
    let plan = h.plan().await;
    SequentialExecutor.execute(&plan.graph, &h.ctx).await;
    let before = h.catalogued().await;
    assert_eq!(before.len(), 2);

    let again = h.plan().await;
    assert!(again.is_empty());
    assert!(again.graph.is_empty());
    assert_eq!(again.skipped.len(), 2);
    assert_eq!(h.catalogued().await, before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_and_sequential_produce_the_same_samples() {
    let sequential = Harness::new(two_paths("p3-before"));
    let plan = sequential.plan().await;
    let report = SequentialExecutor.execute(&plan.graph, &sequential.ctx).await;
    let seq_results = plan.realize(&report);

    let concurrent = Harness::new(two_paths("p3-before"));
    let plan = concurrent.plan().await;
    let report = ConcurrentExecutor::new(3)
        .execute(&plan.graph, &concurrent.ctx)
        .await;
    let con_results = plan.realize(&report);

    assert_eq!(
        seq_results.keys().collect::<Vec<_>>(),
        con_results.keys().collect::<Vec<_>>()
    );
    assert!(con_results.values().all(|s| s.is_complete()));
    assert_eq!(sequential.catalogued().await, concurrent.catalogued().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_scene_blocks_only_its_sample() {
    let h = Harness::new(two_paths("broken"));
    let plan = h.plan().await;
    let report = ConcurrentExecutor::default().execute(&plan.graph, &h.ctx).await;
    let results = plan.realize(&report);

    let base = base_id();
    let broken = &results[&format!("{base}_00")];
    assert!(broken.catalog_item.is_none());
    assert!(!broken.errors.is_empty());
    let cross_section = plan.samples[&format!("{base}_00")].files[2];
    assert!(matches!(
        report.outcome(cross_section),
        Some(Err(TaskError::DependencyFailed(_)))
    ));

    assert!(results[&format!("{base}_01")].is_complete());
    assert_eq!(h.catalogued().await, [format!("{base}_01")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_task_is_reported_as_aborted() {
    let h = Harness::new(two_paths("panic"));
    let plan = h.plan().await;
    let report = ConcurrentExecutor::new(2).execute(&plan.graph, &h.ctx).await;

    assert!(report
        .failures()
        .any(|(_, e)| matches!(e, TaskError::Aborted(_))));
    assert_eq!(h.catalogued().await, [format!("{}_01", base_id())]);
}

#[tokio::test]
async fn losing_an_insert_race_surfaces_duplicate_key() {
    let h = Harness::new(single_pair());
    // Both plans are made before either runs, so neither is skipped.
    let first = h.plan().await;
    let second = h.plan().await;
    assert_eq!(first.samples.len(), 1);
    assert_eq!(second.samples.len(), 1);

    SequentialExecutor.execute(&first.graph, &h.ctx).await;
    let report = SequentialExecutor.execute(&second.graph, &h.ctx).await;

    let insert = second.samples[&base_id()].catalog_item;
    match report.outcome(insert) {
        Some(Err(e)) => assert!(e.is_duplicate_key(), "{e}"),
        other => panic!("expected duplicate key, got {other:?}"),
    }
    assert!(second.realize(&report)[&base_id()].catalog_item.is_none());
    assert_eq!(h.catalog.count(&CatalogQuery::All).await.unwrap(), 1);
}

#[tokio::test]
async fn outputs_are_typed() {
    let h = Harness::new(single_pair());
    let plan = h.plan().await;
    let report = SequentialExecutor.execute(&plan.graph, &h.ctx).await;
    let outputs = &plan.samples[&base_id()];
    for file in &outputs.files {
        assert!(matches!(report.outcome(*file), Some(Ok(TaskOutput::File(_)))));
    }
    assert!(matches!(
        report.outcome(outputs.catalog_item),
        Some(Ok(TaskOutput::Item(_)))
    ));
}
