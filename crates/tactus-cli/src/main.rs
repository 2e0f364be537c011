//! tactus - score tactus trackers against annotated datasets
//!
//! Subcommands:
//! - `tactus score` - Mean accuracy per dataset for the tracker and the baseline
//! - `tactus evolution --input <dir>` - Leader evolution reports per MIDI file
//! - `tactus config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tactconf::TactusConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "tactus")]
#[command(about = "Evaluate tactus hypothesis trackers")]
#[command(version)]
struct Cli {
    /// Config file used instead of ./tactus.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score the reference tracker and the baseline on each dataset
    Score(ScoreArgs),

    /// Write per-file hypothesis evolution reports and traces
    Evolution {
        /// Directory of .mid files
        #[arg(long)]
        input: PathBuf,

        /// Output directory (defaults to paths.visualizations_dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show the effective configuration and where it came from
    Config,
}

#[derive(clap::Args, Debug, Default)]
struct ScoreArgs {
    /// Dataset to score (repeatable; defaults to kp, kp-perf and tap)
    #[arg(long = "dataset")]
    datasets: Vec<String>,

    /// Maximum examples per dataset
    #[arg(long)]
    limit: Option<usize>,

    /// Harmonic tolerance in BPM
    #[arg(long)]
    tolerance: Option<f64>,

    /// Count failing examples instead of aborting the dataset
    #[arg(long)]
    skip_failures: bool,

    /// Per-example tracker timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Examples tracked concurrently
    #[arg(long)]
    parallel: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Root directory holding the datasets
    #[arg(long)]
    datasets_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Table,
    Latex,
    Json,
}

impl ScoreArgs {
    /// Command-line flags win over every config layer.
    fn apply(&self, config: &mut TactusConfig) {
        if let Some(limit) = self.limit {
            config.scoring.limit = Some(limit);
        }
        if let Some(tolerance) = self.tolerance {
            config.scoring.tolerance = tolerance;
        }
        if self.skip_failures {
            config.scoring.skip_failures = true;
        }
        if let Some(secs) = self.timeout_secs {
            config.scoring.timeout_secs = Some(secs);
        }
        if let Some(parallel) = self.parallel {
            config.scoring.max_parallel = parallel;
        }
        if let Some(dir) = &self.datasets_dir {
            config.paths.datasets_dir = dir.clone();
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = TactusConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&config.telemetry.log_level);

    match cli.command {
        Commands::Score(args) => {
            args.apply(&mut config);
            let output = commands::score(&config, &args.datasets, args.format).await?;
            print!("{output}");
        }
        Commands::Evolution { input, out } => {
            let out = out.unwrap_or_else(|| config.paths.visualizations_dir.clone());
            commands::evolution(&config, &input, &out).await?;
        }
        Commands::Config => {
            print!("{}", commands::describe_config(&config, &sources));
        }
    }

    Ok(())
}
