mod commands;
mod config;
mod logging;
mod raster_command;
mod search;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// How a generation plan's task graph is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ExecutorKind {
    Sequential,
    Concurrent,
}

/// Avalanche training-sample generation from satellite radar acquisitions.
#[derive(Parser)]
#[command(
    name = "skreddata",
    version,
    about = "Avalanche training-sample generation from satellite radar acquisitions"
)]
struct Cli {
    /// Configuration file (default: ./skreddata.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Task graph executor
    #[arg(long, global = true, default_value = "concurrent", value_enum)]
    executor: ExecutorKind,

    /// Maximum tasks in flight for the concurrent executor
    #[arg(long, global = true)]
    jobs: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate training samples
    Gen {
        #[command(subcommand)]
        command: GenCommands,
    },

    /// Inspect and maintain the sample catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum GenCommands {
    /// Generate the samples for one area and time window
    Sample {
        /// Area as WKT, GeoJSON geometry or "min_lon,min_lat,max_lon,max_lat"
        #[arg(long)]
        area: String,
        /// Start of the time window
        #[arg(long)]
        t0: String,
        /// End of the time window (default: same as --t0)
        #[arg(long)]
        t1: Option<String>,
        /// Output directory; each sample gets a sub-directory
        target: PathBuf,
        /// Side length of the square sample grid
        #[arg(long)]
        shape: Option<u32>,
        /// EPSG code of the output reference system (default: UTM zone of the area)
        #[arg(long)]
        epsg: Option<u32>,
        /// Base identifier instead of the derived one
        #[arg(long)]
        uuid: Option<String>,
        /// Label code or name (absent, present, unsure, defected)
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        comment: Option<String>,
        /// Only keep pairs whose passes start at the window ends
        #[arg(long)]
        exact_times: bool,
        /// Print the plan without running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate samples for every feature of a GeoJSON file
    FromGeojson {
        /// GeoJSON feature collection of areas
        file: PathBuf,
        /// Output directory; each sample gets a sub-directory
        target: PathBuf,
        #[arg(long, default_value = "t_0")]
        t0_column: String,
        #[arg(long, default_value = "t_1")]
        t1_column: String,
        /// Property holding an explicit base identifier
        #[arg(long)]
        uuid_column: Option<String>,
        #[arg(long)]
        label_column: Option<String>,
        #[arg(long)]
        comment_column: Option<String>,
        #[arg(long)]
        epsg: Option<u32>,
        /// Side length of the square sample grid (default: 1024)
        #[arg(long)]
        shape: Option<u32>,
        #[arg(long)]
        exact_times: bool,
        #[arg(long)]
        dry_run: bool,
    },

    /// List the before/after pairs for an area and time window
    Pairs {
        #[arg(long)]
        area: String,
        #[arg(long)]
        t0: String,
        #[arg(long)]
        t1: Option<String>,
        #[arg(long)]
        exact_times: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum CatalogCommands {
    /// List catalogued samples
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Count catalogued samples
    Count {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Show one catalogued sample
    Show { id: String },
    /// Remove one catalogued sample so it can be regenerated
    Remove { id: String },
}

#[derive(Args, Debug, Clone)]
pub(crate) struct FilterArgs {
    /// Only items with this label (code or name)
    #[arg(long)]
    label: Option<String>,
    /// Only items with a label
    #[arg(long, conflicts_with = "unlabeled")]
    labeled: bool,
    /// Only items without a label
    #[arg(long)]
    unlabeled: bool,
    /// Only items whose window contains this time
    #[arg(long)]
    at: Option<String>,
    #[arg(long)]
    id_contains: Option<String>,
    #[arg(long)]
    comment_contains: Option<String>,
}

/// Settings shared by every command of one invocation.
pub(crate) struct Session {
    pub config: Config,
    pub output: OutputFormat,
    pub quiet: bool,
    pub executor: ExecutorKind,
    pub jobs: Option<usize>,
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.quiet);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(msg) => {
            report_error(&format!("error: {msg}"), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    let session = Session {
        config,
        output: cli.output,
        quiet: cli.quiet,
        executor: cli.executor,
        jobs: cli.jobs,
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("error: failed to create tokio runtime: {e}"),
                session.output,
                session.quiet,
            );
            process::exit(1);
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Gen { command } => commands::gen::cmd_gen(command, &session).await,
            Commands::Catalog { command } => {
                commands::catalog::cmd_catalog(command, &session).await
            }
        }
    });

    if let Err(msg) = result {
        report_error(&format!("error: {msg}"), session.output, session.quiet);
        process::exit(1);
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
