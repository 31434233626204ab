use anyhow::{Context, Result};
use clap::Parser;
use monit_aggs::aggs::{AggInfo, AggRegistry};
use monit_aggs::config::{AggConfig, ZeroDenominatorPolicy};
use monit_aggs::runner::AggRunner;
use monit_aggs::source;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "monit-aggs")]
#[command(about = "Compute aggregate metrics over xrootd file-access records")]
struct Args {
    /// Event table (.csv or .parquet)
    #[arg(required_unless_present = "list")]
    input: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source whose aggregates are run (overrides config)
    #[arg(short, long)]
    source: Option<String>,

    /// Use chunked computation where supported
    #[arg(long)]
    chunked: bool,

    /// Fail when a post-aggregate divides by zero
    #[arg(long)]
    strict: bool,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List registered aggregates and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let registry = AggRegistry::with_defaults()?;

    if args.list {
        let infos: Vec<AggInfo> = registry.iter().map(|d| d.info()).collect();
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => AggConfig::load(path)?,
        None => AggConfig::default(),
    };
    if let Some(source) = args.source {
        config.source = source;
    }
    if args.chunked {
        config.chunked = true;
    }
    if args.strict {
        config.zero_denominator = ZeroDenominatorPolicy::Error;
    }

    let input = args.input.context("no input file given")?;
    let df = source::load_events(&input)
        .with_context(|| format!("failed to load {}", input.display()))?;

    let runner = AggRunner::new(registry, config);
    let report = runner.report(&df)?;
    let json = serde_json::to_string_pretty(&report)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, json)?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
