//! Task graph executors.
//!
//! ```text
//! TaskGraph ──► Executor::execute ──► GraphReport
//!                  │
//!                  ├─ SequentialExecutor  one node at a time, insertion order
//!                  └─ ConcurrentExecutor  ready nodes run on a JoinSet,
//!                                         bounded by max_in_flight
//! ```
//!
//! A node runs only after all of its dependencies succeeded. When a
//! dependency fails, the node is recorded as `DependencyFailed` without
//! running, and the failure propagates to everything downstream. In
//! particular the catalog insert of a sample never runs unless every file of
//! that sample was produced.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use skreddata_catalog::CatalogGate;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::artifacts::{ensure_parent, write_json};
use crate::error::TaskError;
use crate::graph::{NodeId, Task, TaskGraph, TaskOutput};
use crate::raster::{CrossSectionRequest, ElevationRequest, FetchRequest, RasterEngine};

/// Collaborators a running graph needs.
#[derive(Clone)]
pub struct TaskContext {
    pub raster: Arc<dyn RasterEngine>,
    pub gate: CatalogGate,
    /// Where fetched scenes are kept.
    pub scene_dir: PathBuf,
}

impl TaskContext {
    pub fn new(raster: Arc<dyn RasterEngine>, gate: CatalogGate, scene_dir: PathBuf) -> Self {
        Self {
            raster,
            gate,
            scene_dir,
        }
    }
}

/// Outcome of every node of an executed graph, indexed by node id.
#[derive(Debug)]
pub struct GraphReport {
    outcomes: Vec<Result<TaskOutput, TaskError>>,
}

impl GraphReport {
    pub fn outcome(&self, id: NodeId) -> Option<&Result<TaskOutput, TaskError>> {
        self.outcomes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (NodeId, &TaskError)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().err().map(|e| (NodeId::from_index(i), e)))
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, graph: &TaskGraph, ctx: &TaskContext) -> GraphReport;
}

// ── Sequential ──────────────────────────────────────────────────────────────

/// Runs nodes one at a time in insertion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

#[async_trait]
impl Executor for SequentialExecutor {
    async fn execute(&self, graph: &TaskGraph, ctx: &TaskContext) -> GraphReport {
        let mut outcomes: Vec<Option<Result<TaskOutput, TaskError>>> =
            (0..graph.len()).map(|_| None).collect();
        for (id, task) in graph.iter() {
            let outcome = match prepare(task, &outcomes) {
                Ok(prepared) => run(prepared, ctx.clone()).await,
                Err(e) => Err(e),
            };
            log_outcome(id, task, &outcome);
            outcomes[id.index()] = Some(outcome);
        }
        finish(outcomes)
    }
}

// ── Concurrent ──────────────────────────────────────────────────────────────

/// Runs independent nodes concurrently on the tokio runtime.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentExecutor {
    max_in_flight: usize,
}

impl ConcurrentExecutor {
    /// `max_in_flight` is clamped to at least one.
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

impl Default for ConcurrentExecutor {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism().map_or(4, |n| n.get());
        Self::new(parallelism)
    }
}

#[async_trait]
impl Executor for ConcurrentExecutor {
    async fn execute(&self, graph: &TaskGraph, ctx: &TaskContext) -> GraphReport {
        let dependents = graph.dependents();
        let mut pending: Vec<usize> = graph
            .iter()
            .map(|(_, task)| task.dependencies().len())
            .collect();
        let mut outcomes: Vec<Option<Result<TaskOutput, TaskError>>> =
            (0..graph.len()).map(|_| None).collect();
        let mut ready: VecDeque<NodeId> = graph
            .iter()
            .filter(|(id, _)| pending[id.index()] == 0)
            .map(|(id, _)| id)
            .collect();
        let mut running: JoinSet<(NodeId, Result<TaskOutput, TaskError>)> = JoinSet::new();

        loop {
            while running.len() < self.max_in_flight {
                let Some(id) = ready.pop_front() else { break };
                let Some(task) = graph.get(id) else { continue };
                match prepare(task, &outcomes) {
                    Ok(prepared) => {
                        let ctx = ctx.clone();
                        // The inner spawn isolates panics so the node id is
                        // never lost.
                        running.spawn(async move {
                            let outcome = tokio::spawn(run(prepared, ctx))
                                .await
                                .unwrap_or_else(|e| Err(TaskError::Aborted(e.to_string())));
                            (id, outcome)
                        });
                    }
                    Err(e) => {
                        let outcome = Err(e);
                        log_outcome(id, task, &outcome);
                        complete(id, outcome, &mut outcomes, &mut pending, &dependents, &mut ready);
                    }
                }
            }

            match running.join_next().await {
                Some(Ok((id, outcome))) => {
                    if let Some(task) = graph.get(id) {
                        log_outcome(id, task, &outcome);
                    }
                    complete(id, outcome, &mut outcomes, &mut pending, &dependents, &mut ready);
                }
                Some(Err(e)) => {
                    // The wrapper future does not panic; reaching this means
                    // the runtime is shutting down.
                    warn!(error = %e, "executor task aborted");
                    break;
                }
                None if ready.is_empty() => break,
                None => {}
            }
        }

        finish(outcomes)
    }
}

fn complete(
    id: NodeId,
    outcome: Result<TaskOutput, TaskError>,
    outcomes: &mut [Option<Result<TaskOutput, TaskError>>],
    pending: &mut [usize],
    dependents: &[Vec<NodeId>],
    ready: &mut VecDeque<NodeId>,
) {
    outcomes[id.index()] = Some(outcome);
    for &next in &dependents[id.index()] {
        pending[next.index()] -= 1;
        if pending[next.index()] == 0 {
            ready.push_back(next);
        }
    }
}

fn finish(outcomes: Vec<Option<Result<TaskOutput, TaskError>>>) -> GraphReport {
    GraphReport {
        outcomes: outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| Err(TaskError::Aborted("node never ran".into()))))
            .collect(),
    }
}

fn log_outcome(id: NodeId, task: &Task, outcome: &Result<TaskOutput, TaskError>) {
    match outcome {
        Ok(_) => debug!(node = %id, task = task.kind(), "task finished"),
        Err(TaskError::DependencyFailed(dep)) => {
            debug!(node = %id, task = task.kind(), dependency = %dep, "task skipped")
        }
        Err(e) => warn!(node = %id, task = task.kind(), error = %e, "task failed"),
    }
}

// ── Running one node ────────────────────────────────────────────────────────

/// A task with the file outputs of its dependencies resolved.
struct Prepared {
    task: Task,
    inputs: BTreeMap<NodeId, PathBuf>,
}

impl Prepared {
    fn paths(&self, ids: &[NodeId]) -> Vec<PathBuf> {
        ids.iter()
            .filter_map(|id| self.inputs.get(id).cloned())
            .collect()
    }
}

fn prepare(
    task: &Task,
    outcomes: &[Option<Result<TaskOutput, TaskError>>],
) -> Result<Prepared, TaskError> {
    let mut inputs = BTreeMap::new();
    for dep in task.dependencies() {
        match outcomes.get(dep.index()) {
            Some(Some(Ok(output))) => {
                if let Some(path) = output.as_path() {
                    inputs.insert(dep, path.clone());
                }
            }
            _ => return Err(TaskError::DependencyFailed(dep)),
        }
    }
    Ok(Prepared {
        task: task.clone(),
        inputs,
    })
}

async fn run(prepared: Prepared, ctx: TaskContext) -> Result<TaskOutput, TaskError> {
    match &prepared.task {
        Task::FetchScene { product } => {
            let request = FetchRequest {
                product: product.clone(),
                scene_dir: ctx.scene_dir.clone(),
            };
            Ok(TaskOutput::File(ctx.raster.fetch_scene(&request).await?))
        }
        Task::WriteMetadata { path, metadata } => {
            Ok(TaskOutput::File(write_json(path, metadata).await?))
        }
        Task::WriteInputRegion { path, region } => {
            Ok(TaskOutput::File(write_json(path, region).await?))
        }
        Task::RenderCrossSection {
            path,
            grid,
            area_wkt,
            before,
            after,
        } => {
            let request = CrossSectionRequest {
                grid: grid.clone(),
                area_wkt: area_wkt.clone(),
                before: prepared.paths(before),
                after: prepared.paths(after),
            };
            ensure_parent(path).await?;
            Ok(TaskOutput::File(
                ctx.raster.render_cross_section(&request, path).await?,
            ))
        }
        Task::RenderElevation {
            path,
            grid,
            area_wkt,
        } => {
            let request = ElevationRequest {
                grid: grid.clone(),
                area_wkt: area_wkt.clone(),
            };
            ensure_parent(path).await?;
            Ok(TaskOutput::File(
                ctx.raster.render_elevation(&request, path).await?,
            ))
        }
        Task::InsertCatalog { item, .. } => {
            ctx.gate.record(item.clone()).await?;
            Ok(TaskOutput::Item(item.clone()))
        }
    }
}
