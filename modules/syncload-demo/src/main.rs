//! Runs a nested companies/locations selection through batched loaders and
//! prints the response alongside per-loader batch statistics.

use std::process::ExitCode;
use std::rc::Rc;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use syncload_exec::{ExecutionResult, Executor, Selection};
use syncload_loader::{LoaderConfig, LoaderContext, LoaderStats};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod schema;

use schema::{Dataset, Loaders, Query};

#[derive(Parser)]
#[command(name = "syncload-demo")]
#[command(about = "Batch nested lookups through synchronous data loaders")]
#[command(version)]
struct Cli {
    /// Company ids to select (unknown ids produce field errors)
    #[arg(default_values_t = ["1".to_string(), "2".to_string(), "3".to_string()])]
    ids: Vec<String>,

    /// Split batches larger than this (overrides SYNCLOAD_MAX_BATCH_SIZE)
    #[arg(long)]
    max_batch_size: Option<usize>,

    /// Disable per-loader key caching
    #[arg(long)]
    no_cache: bool,

    /// Stop draining after this many passes (overrides SYNCLOAD_MAX_DRAIN_PASSES)
    #[arg(long)]
    max_drain_passes: Option<usize>,

    /// Follow location -> company -> location once more
    #[arg(long)]
    deep: bool,
}

#[derive(Serialize)]
struct Output {
    #[serde(flatten)]
    result: ExecutionResult,
    loaders: Vec<LoaderStats>,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("syncload=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = LoaderConfig::from_env()?;
    if cli.max_batch_size.is_some() {
        config.max_batch_size = cli.max_batch_size;
    }
    if cli.no_cache {
        config.cache = false;
    }
    if cli.max_drain_passes.is_some() {
        config.max_drain_passes = cli.max_drain_passes;
    }

    let ctx = LoaderContext::from_config(&config);
    let loaders = Loaders::new(&ctx, &config, Rc::new(Dataset::sample()));
    let executor = Executor::new(ctx.clone());

    info!(ids = ?cli.ids, ?config, "executing selection");
    let result = executor.execute(&Query { loaders }, &[selection(&cli.ids, cli.deep)])?;

    let output = Output {
        result,
        loaders: ctx.stats(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn selection(ids: &[String], deep: bool) -> Selection {
    let mut location = vec![Selection::field("id"), Selection::field("city")];
    if deep {
        location.push(Selection::field("company").select([
            Selection::field("name"),
            Selection::field("location").select([Selection::field("city")]),
        ]));
    }

    Selection::field("companies")
        .arg("ids", ids.to_vec())
        .select([
            Selection::field("id"),
            Selection::field("name"),
            Selection::field("location").select(location),
        ])
}
