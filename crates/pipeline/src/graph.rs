//! Deferred task graph.
//!
//! Nodes are typed tasks; edges are the node ids a task reads from. A node
//! may only depend on nodes added before it, so insertion order is a valid
//! topological order and the graph cannot contain cycles. Building a graph
//! performs no I/O; an [`Executor`](crate::executor::Executor) realizes it.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use skreddata_catalog::CatalogItem;
use skreddata_core::{GridSpec, Pair, Product};

use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Products metadata written next to each sample.
#[derive(Debug, Clone, Serialize)]
pub struct SampleMetadata {
    pub id: String,
    pub reference_system: String,
    pub grid: GridSpec,
    #[serde(flatten)]
    pub pair: Pair,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    /// Make one product's scene available locally.
    FetchScene { product: Product },

    /// Write the pair's products metadata as JSON.
    WriteMetadata {
        path: PathBuf,
        metadata: SampleMetadata,
    },

    /// Write the input region as a GeoJSON feature collection.
    WriteInputRegion {
        path: PathBuf,
        region: geojson::FeatureCollection,
    },

    /// Render the before/after cross-section from fetched scenes.
    RenderCrossSection {
        path: PathBuf,
        grid: GridSpec,
        area_wkt: String,
        before: Vec<NodeId>,
        after: Vec<NodeId>,
    },

    RenderElevation {
        path: PathBuf,
        grid: GridSpec,
        area_wkt: String,
    },

    /// Record the finished sample. Runs only when every input succeeded.
    InsertCatalog {
        item: CatalogItem,
        inputs: Vec<NodeId>,
    },
}

impl Task {
    /// Nodes this task reads from, in declaration order.
    pub fn dependencies(&self) -> Vec<NodeId> {
        match self {
            Task::RenderCrossSection { before, after, .. } => {
                before.iter().chain(after.iter()).copied().collect()
            }
            Task::InsertCatalog { inputs, .. } => inputs.clone(),
            Task::FetchScene { .. }
            | Task::WriteMetadata { .. }
            | Task::WriteInputRegion { .. }
            | Task::RenderElevation { .. } => Vec::new(),
        }
    }

    /// Short task name for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Task::FetchScene { .. } => "fetch_scene",
            Task::WriteMetadata { .. } => "write_metadata",
            Task::WriteInputRegion { .. } => "write_input_region",
            Task::RenderCrossSection { .. } => "render_cross_section",
            Task::RenderElevation { .. } => "render_elevation",
            Task::InsertCatalog { .. } => "insert_catalog",
        }
    }
}

/// Result of one realized node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskOutput {
    File(PathBuf),
    Item(CatalogItem),
}

impl TaskOutput {
    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            TaskOutput::File(path) => Some(path),
            TaskOutput::Item(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskGraph {
    nodes: Vec<Task>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task. Every dependency must already be in the graph.
    pub fn add(&mut self, task: Task) -> Result<NodeId, GraphError> {
        let node = NodeId(self.nodes.len());
        if let Some(dependency) = task.dependencies().into_iter().find(|d| d.0 >= node.0) {
            return Err(GraphError { node, dependency });
        }
        self.nodes.push(task);
        Ok(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Task> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in insertion (topological) order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Task)> {
        self.nodes.iter().enumerate().map(|(i, t)| (NodeId(i), t))
    }

    /// For each node, the nodes that depend on it.
    pub(crate) fn dependents(&self) -> Vec<Vec<NodeId>> {
        let mut dependents = vec![Vec::new(); self.nodes.len()];
        for (id, task) in self.iter() {
            for dep in task.dependencies() {
                dependents[dep.0].push(id);
            }
        }
        dependents
    }

    /// Number of tasks of each kind, in first-seen order.
    pub fn summary(&self) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<(&'static str, usize)> = Vec::new();
        for task in &self.nodes {
            match counts.iter_mut().find(|(k, _)| *k == task.kind()) {
                Some((_, n)) => *n += 1,
                None => counts.push((task.kind(), 1)),
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn fetch() -> Task {
        let start = datetime!(2020-01-01 5:00 UTC);
        Task::FetchScene {
            product: Product::new(1, start, start).unwrap(),
        }
    }

    fn region(path: &str) -> Task {
        Task::WriteInputRegion {
            path: PathBuf::from(path),
            region: geojson::FeatureCollection {
                bbox: None,
                features: Vec::new(),
                foreign_members: None,
            },
        }
    }

    #[test]
    fn dependencies_must_precede_the_node() {
        let mut graph = TaskGraph::new();
        let a = graph.add(fetch()).unwrap();
        let b = graph.add(region("b")).unwrap();
        assert_eq!((a.index(), b.index()), (0, 1));

        let forward = Task::InsertCatalog {
            item: sample_item(),
            inputs: vec![a, NodeId(5)],
        };
        let err = graph.add(forward).unwrap_err();
        assert_eq!(err.dependency, NodeId(5));
        assert_eq!(graph.len(), 2);

        let ok = graph
            .add(Task::InsertCatalog {
                item: sample_item(),
                inputs: vec![a, b],
            })
            .unwrap();
        assert_eq!(graph.dependents()[a.index()], vec![ok]);
    }

    #[test]
    fn self_dependency_is_rejected() {
        let mut graph = TaskGraph::new();
        let err = graph
            .add(Task::InsertCatalog {
                item: sample_item(),
                inputs: vec![NodeId(0)],
            })
            .unwrap_err();
        assert_eq!(err.node, NodeId(0));
    }

    #[test]
    fn summary_counts_kinds() {
        let mut graph = TaskGraph::new();
        graph.add(fetch()).unwrap();
        graph.add(region("x")).unwrap();
        graph.add(fetch()).unwrap();
        assert_eq!(
            graph.summary(),
            vec![("fetch_scene", 2), ("write_input_region", 1)]
        );
    }

    fn sample_item() -> CatalogItem {
        let area = skreddata_core::Area::parse("10,60,10.1,60.1").unwrap();
        let window = skreddata_core::TimeInterval::parse_markers(&["2020-01-01"]).unwrap();
        CatalogItem::new("s", &area, window)
    }
}
