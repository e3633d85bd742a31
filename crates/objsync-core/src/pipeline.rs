//! Wires producer, worker pool and monitor into one migration run.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::monitor::{MigrationSummary, Monitor};
use crate::pool::{spawn_workers, WorkerContext};
use crate::storage::{Destination, Source};
use crate::worklist;

/// A configured migration from one backend to another.
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn Source>,
    destination: Arc<dyn Destination>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn Source>,
        destination: Arc<dyn Destination>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Pipeline {
            config,
            source,
            destination,
        })
    }

    /// Migrate every key selected from `input`, appending one record per
    /// key to `report`.
    ///
    /// The calling task hosts the monitor; the producer and the workers run
    /// as spawned tasks. Returns once every queued key has been recorded.
    #[cfg_attr(feature = "observability", tracing::instrument(skip_all))]
    pub async fn run<R, W>(&self, input: Option<R>, report: &mut W) -> Result<MigrationSummary>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        let depth = self.config.effective_queue_depth();
        let (item_tx, item_rx) = mpsc::channel(depth);
        let (result_tx, result_rx) = mpsc::channel(depth);
        let (total_tx, total_rx) = oneshot::channel();
        let stop = CancellationToken::new();

        tracing::info!(
            workers = self.config.workers,
            checksum = %self.config.checksum,
            "starting migration"
        );

        let producer = tokio::spawn(worklist::produce(
            input,
            self.config.unverified,
            item_tx,
            total_tx,
        ));

        let workers = spawn_workers(
            self.config.workers,
            WorkerContext {
                source: Arc::clone(&self.source),
                destination: Arc::clone(&self.destination),
                algorithm: self.config.checksum,
                queue: Arc::new(Mutex::new(item_rx)),
                results: result_tx,
                stop: stop.clone(),
            },
        );

        let summary = Monitor::new(report).run(result_rx, total_rx, stop).await;

        for worker in workers {
            worker.await?;
        }
        producer.await?;
        Ok(summary)
    }
}
