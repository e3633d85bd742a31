//! `objsync` command-line entry point.

mod args;
mod backends;

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use objsync_core::{MigrationSummary, Pipeline};
use tokio::fs::{File, OpenOptions};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use args::{Cli, Command, ListArgs, MigrateArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries key listings and summaries.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Migrate(args) => migrate(args).await,
        Command::List(args) => list(args).await,
    }
}

async fn migrate(args: MigrateArgs) -> anyhow::Result<()> {
    let source = args
        .source
        .open_source(&args.connection)
        .await
        .with_context(|| format!("cannot open source {}", args.source))?;
    let destination = args
        .dest
        .open_destination(&args.connection)
        .await
        .with_context(|| format!("cannot open destination {}", args.dest))?;
    let pipeline = Pipeline::new(args.pipeline_config(), source, destination)?;

    let mut report = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.report)
        .await
        .with_context(|| format!("cannot open report {}", args.report.display()))?;

    tracing::info!(source = %args.source, dest = %args.dest, input = %args.input, "migrating");
    let summary = if args.reads_stdin() {
        let input = BufReader::new(tokio::io::stdin());
        pipeline.run(Some(input), &mut report).await?
    } else {
        let file = File::open(&args.input)
            .await
            .with_context(|| format!("cannot open input {}", args.input))?;
        pipeline.run(Some(BufReader::new(file)), &mut report).await?
    };

    print_summary(&summary, args.summary_json)
}

fn print_summary(summary: &MigrationSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    tracing::info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        unverified = summary.unverified,
        "run finished"
    );
    if summary.report_errors > 0 {
        tracing::warn!(
            missing = summary.report_errors,
            "some outcomes are missing from the report"
        );
    }
    Ok(())
}

async fn list(args: ListArgs) -> anyhow::Result<()> {
    let lister = args
        .source
        .open_lister(&args.connection)
        .await
        .with_context(|| format!("cannot open {}", args.source))?;
    let keys = lister.list_keys(&args.prefix).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for key in &keys {
        writeln!(out, "{key}")?;
    }
    out.flush()?;
    tracing::debug!(count = keys.len(), "listed keys");
    Ok(())
}
