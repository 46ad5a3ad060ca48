//! `skreddata gen` subcommands.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};
use skreddata_catalog::{CatalogGate, Label};
use skreddata_core::{find_pairs, Area, GridShape, Pair, ReferenceSystem, TimeInterval};
use skreddata_pipeline::{
    ConcurrentExecutor, Executor, GenerateRequest, GenerationPlan, Generator, SequentialExecutor,
    TaskContext,
};
use tracing::info;

use super::{open_catalog, print_json};
use crate::raster_command::CommandRasterEngine;
use crate::search::build_search;
use crate::{ExecutorKind, GenCommands, OutputFormat, Session};

/// Grid size for samples generated from a GeoJSON file.
const FROM_GEOJSON_SHAPE: u32 = 1024;

pub(crate) async fn cmd_gen(command: GenCommands, session: &Session) -> Result<(), String> {
    match command {
        GenCommands::Sample {
            area,
            t0,
            t1,
            target,
            shape,
            epsg,
            uuid,
            label,
            comment,
            exact_times,
            dry_run,
        } => {
            let markers: Vec<String> = std::iter::once(t0).chain(t1).collect();
            let shape = match shape {
                Some(size) => square(size)?,
                None => session.config.default_shape()?,
            };
            let request = GenerateRequest::parse(&area, &markers, target)
                .map_err(|e| e.to_string())?
                .with_shape(Some(shape))
                .with_refsys(refsys(epsg)?)
                .with_identifier(uuid)
                .with_label(label.as_deref().map(parse_label).transpose()?)
                .with_comment(comment)
                .with_exact_times(exact_times);

            let (generator, gate) = build_generator(session).await?;
            let plan = generator
                .generate(&request)
                .await
                .map_err(|e| e.to_string())?;
            run_plan(plan, gate, dry_run, session).await
        }

        GenCommands::FromGeojson {
            file,
            target,
            t0_column,
            t1_column,
            uuid_column,
            label_column,
            comment_column,
            epsg,
            shape,
            exact_times,
            dry_run,
        } => {
            let columns = Columns {
                t0: &t0_column,
                t1: &t1_column,
                uuid: uuid_column.as_deref(),
                label: label_column.as_deref(),
                comment: comment_column.as_deref(),
            };
            let shape = square(shape.unwrap_or(FROM_GEOJSON_SHAPE))?;
            let refsys = refsys(epsg)?;
            let requests: Vec<GenerateRequest> = read_requests(&file, &target, &columns)
                .await?
                .into_iter()
                .map(|r| {
                    r.with_shape(Some(shape))
                        .with_refsys(refsys)
                        .with_exact_times(exact_times)
                })
                .collect();

            let (generator, gate) = build_generator(session).await?;
            let plan = generator.plan_batch(&requests).await;
            run_plan(plan, gate, dry_run, session).await
        }

        GenCommands::Pairs {
            area,
            t0,
            t1,
            exact_times,
        } => {
            let area = Area::parse(&area).map_err(|e| e.to_string())?;
            let markers: Vec<String> = std::iter::once(t0).chain(t1).collect();
            let window = TimeInterval::parse_markers(&markers).map_err(|e| e.to_string())?;
            let options = session
                .config
                .pair_options()?
                .with_exact_times(exact_times);
            let search = build_search(&session.config);
            let pairs = find_pairs(&area, window, search.as_ref(), &options)
                .await
                .map_err(|e| e.to_string())?;
            if !session.quiet {
                match session.output {
                    OutputFormat::Json => print_json(&pairs),
                    OutputFormat::Text => print_pairs(&pairs),
                }
            }
            Ok(())
        }
    }
}

// ── Plan execution ──────────────────────────────────────────────────────────

async fn build_generator(session: &Session) -> Result<(Generator, CatalogGate), String> {
    let catalog = open_catalog(&session.config).await?;
    let gate = CatalogGate::new(catalog);
    let generator = Generator::new(
        build_search(&session.config),
        gate.clone(),
        session.config.generator_config()?,
    );
    Ok((generator, gate))
}

fn executor(session: &Session) -> Box<dyn Executor> {
    match session.executor {
        ExecutorKind::Sequential => Box::new(SequentialExecutor),
        ExecutorKind::Concurrent => match session.jobs.or(session.config.generate.concurrency) {
            Some(jobs) => Box::new(ConcurrentExecutor::new(jobs)),
            None => Box::new(ConcurrentExecutor::default()),
        },
    }
}

async fn run_plan(
    plan: GenerationPlan,
    gate: CatalogGate,
    dry_run: bool,
    session: &Session,
) -> Result<(), String> {
    for skipped in &plan.skipped {
        info!(id = %skipped, "skipped");
    }

    if dry_run {
        if !session.quiet {
            match session.output {
                OutputFormat::Json => print_json(&plan),
                OutputFormat::Text => print_plan(&plan),
            }
        }
        return planning_failures(&plan);
    }

    if plan.is_empty() {
        if !session.quiet {
            match session.output {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "samples": {},
                    "skipped": plan.skipped,
                })),
                OutputFormat::Text => println!("nothing to generate"),
            }
        }
        return planning_failures(&plan);
    }

    let command = session
        .config
        .raster
        .command
        .as_deref()
        .ok_or_else(|| "no raster engine configured: set [raster] command".to_string())?;
    let engine = CommandRasterEngine::new(command)?;
    let ctx = TaskContext::new(
        Arc::new(engine),
        gate,
        session.config.raster.scene_dir.clone(),
    );

    let report = executor(session).execute(&plan.graph, &ctx).await;
    let results = plan.realize(&report);

    if !session.quiet {
        match session.output {
            OutputFormat::Json => print_json(&serde_json::json!({
                "samples": results,
                "skipped": plan.skipped,
            })),
            OutputFormat::Text => {
                for (id, result) in &results {
                    if result.is_complete() {
                        println!("{id}: catalogued");
                    } else {
                        println!("{id}: failed");
                    }
                    for file in &result.files {
                        println!("  {}", file.display());
                    }
                    for error in &result.errors {
                        println!("  error: {error}");
                    }
                }
            }
        }
    }

    let failed = results.values().filter(|r| !r.is_complete()).count();
    if failed > 0 {
        return Err(format!("{failed} of {} samples failed", results.len()));
    }
    planning_failures(&plan)
}

fn planning_failures(plan: &GenerationPlan) -> Result<(), String> {
    if plan.failed.is_empty() {
        return Ok(());
    }
    let ids: Vec<&str> = plan.failed.iter().map(|f| f.id.as_str()).collect();
    Err(format!("could not plan {}", ids.join(", ")))
}

fn print_plan(plan: &GenerationPlan) {
    println!("{} sample(s), {} task(s)", plan.samples.len(), plan.graph.len());
    for (kind, count) in plan.graph.summary() {
        println!("  {kind}: {count}");
    }
    for id in plan.samples.keys() {
        println!("planned {id}");
    }
    for id in &plan.skipped {
        println!("skipped {id}");
    }
    for failure in &plan.failed {
        println!("failed  {}: {}", failure.id, failure.error);
    }
}

fn print_pairs(pairs: &[Pair]) {
    if pairs.is_empty() {
        println!("no pairs found");
        return;
    }
    for pair in pairs {
        println!(
            "path {}: before {} ({} product(s)), after {} ({} product(s))",
            pair.path_number,
            pair.before.span(),
            pair.before.len(),
            pair.after.span(),
            pair.after.len()
        );
    }
}

// ── Argument helpers ────────────────────────────────────────────────────────

fn square(size: u32) -> Result<GridShape, String> {
    GridShape::square(size).map_err(|e| e.to_string())
}

fn refsys(epsg: Option<u32>) -> Result<Option<ReferenceSystem>, String> {
    epsg.map(ReferenceSystem::from_epsg)
        .transpose()
        .map_err(|e| e.to_string())
}

fn parse_label(text: &str) -> Result<Label, String> {
    Label::from_str(text).map_err(|e| e.to_string())
}

// ── GeoJSON input ───────────────────────────────────────────────────────────

/// Property names read from each input feature.
struct Columns<'a> {
    t0: &'a str,
    t1: &'a str,
    uuid: Option<&'a str>,
    label: Option<&'a str>,
    comment: Option<&'a str>,
}

async fn read_requests(
    file: &Path,
    target: &Path,
    columns: &Columns<'_>,
) -> Result<Vec<GenerateRequest>, String> {
    let content = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| format!("could not read '{}': {}", file.display(), e))?;
    let collection: geojson::FeatureCollection = serde_json::from_str(&content)
        .map_err(|e| format!("'{}' is not a GeoJSON feature collection: {}", file.display(), e))?;

    collection
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            feature_request(feature, target, columns).map_err(|e| format!("feature {index}: {e}"))
        })
        .collect()
}

fn feature_request(
    feature: &geojson::Feature,
    target: &Path,
    columns: &Columns<'_>,
) -> Result<GenerateRequest, String> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| "feature has no geometry".to_string())?;
    let area = Area::from_geojson_geometry(geometry).map_err(|e| e.to_string())?;

    let empty = Map::new();
    let properties = feature.properties.as_ref().unwrap_or(&empty);
    let t0 = property(properties, columns.t0)
        .ok_or_else(|| format!("missing '{}' property", columns.t0))?;
    let markers: Vec<String> = std::iter::once(t0)
        .chain(property(properties, columns.t1))
        .collect();
    let window = TimeInterval::parse_markers(&markers).map_err(|e| e.to_string())?;

    let uuid = columns.uuid.and_then(|c| property(properties, c));
    let label = columns
        .label
        .and_then(|c| property(properties, c))
        .map(|l| parse_label(&l))
        .transpose()?;
    let comment = columns.comment.and_then(|c| property(properties, c));

    Ok(GenerateRequest::new(area, window, PathBuf::from(target))
        .with_identifier(uuid)
        .with_label(label)
        .with_comment(comment))
}

/// A non-null property rendered as text.
fn property(properties: &Map<String, Value>, name: &str) -> Option<String> {
    match properties.get(name)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
