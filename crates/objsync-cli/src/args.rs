use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use objsync_core::config::DEFAULT_WORKERS;
use objsync_core::storage::s3::S3Options;
use objsync_core::{ChecksumAlgorithm, PipelineConfig, UnverifiedPolicy};

use crate::backends::Location;

#[derive(Debug, Parser)]
#[command(name = "objsync", version, about = "Resumable, verified object migration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Copy and verify every key named by the input, appending to a report
    Migrate(MigrateArgs),
    /// Print the keys held by a backend, one per line
    List(ListArgs),
}

/// Adapter settings shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Network timeout per request, in seconds
    #[arg(long, env = "OBJSYNC_TIMEOUT", default_value_t = 300)]
    pub timeout: u64,

    /// Endpoint of an S3-compatible service (enables path-style addressing)
    #[arg(long, env = "OBJSYNC_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    #[arg(long, env = "OBJSYNC_S3_REGION")]
    pub s3_region: Option<String>,
}

impl ConnectionArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn s3_options(&self) -> S3Options {
        S3Options {
            endpoint: self.s3_endpoint.clone(),
            region: self.s3_region.clone(),
            timeout: Some(self.timeout()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChecksumArg {
    Md5,
    Sha256,
}

impl From<ChecksumArg> for ChecksumAlgorithm {
    fn from(arg: ChecksumArg) -> Self {
        match arg {
            ChecksumArg::Md5 => ChecksumAlgorithm::Md5,
            ChecksumArg::Sha256 => ChecksumAlgorithm::Sha256,
        }
    }
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Where objects are read from (s3://, wos://, file://, mem://)
    #[arg(long, env = "OBJSYNC_SOURCE")]
    pub source: Location,

    /// Where objects are written to (s3://, file://, mem://)
    #[arg(long, env = "OBJSYNC_DEST")]
    pub dest: Location,

    /// Key list or prior report; `-` reads stdin
    #[arg(long, env = "OBJSYNC_INPUT")]
    pub input: String,

    /// Report file, opened for append
    #[arg(long, env = "OBJSYNC_REPORT")]
    pub report: PathBuf,

    #[arg(long, env = "OBJSYNC_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Work queue capacity; 0 uses the worker count
    #[arg(long, env = "OBJSYNC_QUEUE_DEPTH", default_value_t = 0)]
    pub queue_depth: usize,

    #[arg(long, env = "OBJSYNC_CHECKSUM", value_enum, default_value_t = ChecksumArg::Md5)]
    pub checksum: ChecksumArg,

    /// Re-queue records that synced but failed verification
    #[arg(long, env = "OBJSYNC_RETRY_UNVERIFIED")]
    pub retry_unverified: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long, env = "OBJSYNC_SUMMARY_JSON")]
    pub summary_json: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl MigrateArgs {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.workers,
            queue_depth: self.queue_depth,
            checksum: self.checksum.into(),
            unverified: if self.retry_unverified {
                UnverifiedPolicy::Retry
            } else {
                UnverifiedPolicy::Skip
            },
        }
    }

    pub fn reads_stdin(&self) -> bool {
        self.input == "-"
    }
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, env = "OBJSYNC_SOURCE")]
    pub source: Location,

    /// Only list keys starting with this prefix
    #[arg(long, default_value = "")]
    pub prefix: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}
