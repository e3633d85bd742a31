use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::storage::{Destination, Source};
use crate::sync::sync_object;
use crate::types::{ChecksumAlgorithm, SyncOutcome, WorkItem};

/// Work queue receiver shared by all workers.
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<WorkItem>>>;

/// Everything a worker needs, cloned once per worker.
#[derive(Clone)]
pub struct WorkerContext {
    pub source: Arc<dyn Source>,
    pub destination: Arc<dyn Destination>,
    pub algorithm: ChecksumAlgorithm,
    pub queue: SharedQueue,
    pub results: mpsc::Sender<SyncOutcome>,
    pub stop: CancellationToken,
}

/// Spawn `count` identical workers.
pub fn spawn_workers(count: usize, ctx: WorkerContext) -> Vec<JoinHandle<usize>> {
    (0..count)
        .map(|id| tokio::spawn(run_worker(id, ctx.clone())))
        .collect()
}

async fn next_item(queue: &SharedQueue) -> Option<WorkItem> {
    queue.lock().await.recv().await
}

/// Pull items until stopped or the queue closes. Returns how many items
/// this worker processed.
///
/// Stop is only checked between items: an item taken off the queue is
/// always synced and its outcome published.
pub async fn run_worker(id: usize, ctx: WorkerContext) -> usize {
    let mut processed = 0;
    loop {
        let item = tokio::select! {
            biased;
            _ = ctx.stop.cancelled() => break,
            item = next_item(&ctx.queue) => match item {
                Some(item) => item,
                None => break,
            },
        };

        let outcome = sync_object(
            &item.key,
            ctx.source.as_ref(),
            ctx.destination.as_ref(),
            ctx.algorithm,
        )
        .await;
        processed += 1;

        if ctx.results.send(outcome).await.is_err() {
            tracing::debug!(worker = id, "results channel closed");
            break;
        }
    }
    tracing::debug!(worker = id, processed, "worker exiting");
    processed
}
