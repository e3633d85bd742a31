//! Work item producer: turns a key listing or a previous report into the
//! queue of keys still to migrate.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, oneshot};

use crate::report::{InputLine, PriorStatus};
use crate::types::{UnverifiedPolicy, WorkItem};

/// Decide whether one input line yields a work item.
pub fn select_key(line: &str, policy: UnverifiedPolicy) -> Option<String> {
    match InputLine::parse(line) {
        InputLine::Key(key) => Some(key),
        InputLine::Record {
            status: PriorStatus::Ok { verified },
            key,
        } => {
            if !verified && policy == UnverifiedPolicy::Retry {
                tracing::debug!(key = %key, "unverified object, retry");
                Some(key)
            } else {
                tracing::debug!(key = %key, "migrated object, skip");
                None
            }
        }
        InputLine::Record { key, .. } => Some(key),
        InputLine::Malformed(reason) => {
            tracing::warn!(line = line.trim_end(), reason, "skipping input line");
            None
        }
    }
}

/// Keys a resume run over `text` would queue, in input order.
pub fn resume_keys(text: &str, policy: UnverifiedPolicy) -> Vec<String> {
    text.lines()
        .filter_map(|line| select_key(line, policy))
        .collect()
}

/// Enumerate `input` into `queue`, then send the number of queued items on
/// `total` exactly once.
///
/// Blocks on `queue` when it is full. Read errors end enumeration early; the
/// items queued so far still count. With no input the total is zero.
pub async fn produce<R>(
    input: Option<R>,
    policy: UnverifiedPolicy,
    queue: mpsc::Sender<WorkItem>,
    total: oneshot::Sender<usize>,
) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let count = match input {
        Some(input) => enumerate(input, policy, &queue).await,
        None => {
            tracing::warn!("no work list provided");
            0
        }
    };
    tracing::info!(total = count, "objects to be migrated");
    if total.send(count).is_err() {
        tracing::debug!("total receiver gone");
    }
    count
}

async fn enumerate<R>(mut input: R, policy: UnverifiedPolicy, queue: &mpsc::Sender<WorkItem>) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    let mut count = 0;
    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => line_no += 1,
            Err(e) => {
                tracing::error!(error = %e, "failed to read work list");
                break;
            }
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping non-UTF-8 input line");
                continue;
            }
        };
        let Some(key) = select_key(line, policy) else {
            continue;
        };
        if queue.send(WorkItem { key }).await.is_err() {
            tracing::warn!("work queue closed, stopping enumeration");
            break;
        }
        count += 1;
    }
    count
}
