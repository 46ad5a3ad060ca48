//! skreddata-pipeline: deferred sample generation.
//!
//! Planning and execution are separate steps:
//!
//! ```text
//! GenerateRequest ──► Generator::plan_into ──► GenerationPlan { TaskGraph, samples }
//!                                                        │
//!                        Executor::execute(graph, ctx) ◄─┘
//!                                  │
//!                                  └──► GraphReport ──► GenerationPlan::realize
//! ```
//!
//! Raster work is delegated to a [`RasterEngine`]; products come from any
//! [`ProductSearch`](skreddata_core::ProductSearch), with [`AsfSearch`] as the
//! default network client.

#[cfg(feature = "asf")]
pub mod asf;
pub mod artifacts;
pub mod error;
pub mod executor;
pub mod graph;
pub mod orchestrator;
pub mod raster;

#[cfg(feature = "asf")]
pub use asf::{products_from_collection, AsfSearch};
pub use artifacts::SamplePaths;
pub use error::{GenerateError, GraphError, RasterError, TaskError};
pub use executor::{
    ConcurrentExecutor, Executor, GraphReport, SequentialExecutor, TaskContext,
};
pub use graph::{NodeId, SampleMetadata, Task, TaskGraph, TaskOutput};
pub use orchestrator::{
    GenerateRequest, GenerationPlan, Generator, GeneratorConfig, PlanFailure, SampleOutputs,
    SampleResult,
};
pub use raster::{CrossSectionRequest, ElevationRequest, FetchRequest, RasterEngine};
