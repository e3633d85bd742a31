//! Completion monitor: records outcomes and decides when a run is done.
//!
//! The total number of work items only becomes known once the producer has
//! finished enumerating, which can happen before or after the workers have
//! drained the queue. Both "an outcome arrived" and "the total arrived" run
//! the same completion check.

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::report::ReportWriter;
use crate::types::SyncOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Total unknown; outcomes are being recorded.
    Collecting,
    /// Total known; waiting for `finished` to reach it.
    Draining { total: usize },
    /// Stop has been signalled.
    Done,
}

/// Counters owned by the monitor loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub finished: usize,
    pub succeeded: usize,
    pub verified: usize,
    pub total: Option<usize>,
}

/// What a finished run looked like.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub total: usize,
    pub finished: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Synced but the read-back checksum differed.
    pub unverified: usize,
    /// Outcomes that could not be written to the report.
    pub report_errors: usize,
}

pub struct Monitor<W> {
    state: MonitorState,
    progress: Progress,
    report: ReportWriter<W>,
    report_errors: usize,
}

impl<W: AsyncWrite + Unpin> Monitor<W> {
    pub fn new(report: W) -> Self {
        Monitor {
            state: MonitorState::Collecting,
            progress: Progress::default(),
            report: ReportWriter::new(report),
            report_errors: 0,
        }
    }

    /// Record one outcome and re-evaluate completion.
    pub async fn on_outcome(&mut self, outcome: &SyncOutcome) -> MonitorState {
        if let Err(e) = self.report.record(outcome).await {
            self.report_errors += 1;
            tracing::error!(key = %outcome.key, error = %e, "failed to write report record");
        }
        self.progress.finished += 1;
        if outcome.succeeded() {
            self.progress.succeeded += 1;
        }
        if outcome.verified() {
            self.progress.verified += 1;
        }
        tracing::debug!(
            key = %outcome.key,
            finished = self.progress.finished,
            total = ?self.progress.total,
            "recorded outcome"
        );
        self.evaluate();
        self.state
    }

    /// Learn the total and re-evaluate completion.
    pub fn on_total(&mut self, total: usize) -> MonitorState {
        self.progress.total = Some(total);
        if total == 0 {
            tracing::warn!("no objects to be migrated");
            self.state = MonitorState::Done;
        } else if self.state != MonitorState::Done {
            self.state = MonitorState::Draining { total };
            self.evaluate();
        }
        self.state
    }

    fn evaluate(&mut self) {
        if let MonitorState::Draining { total } = self.state {
            if self.progress.finished >= total {
                tracing::info!(
                    "migration completed: {}/{}",
                    self.progress.succeeded,
                    self.progress.finished
                );
                self.state = MonitorState::Done;
            }
        }
    }

    pub fn summary(&self) -> MigrationSummary {
        let p = &self.progress;
        MigrationSummary {
            total: p.total.unwrap_or(p.finished),
            finished: p.finished,
            succeeded: p.succeeded,
            failed: p.finished - p.succeeded,
            unverified: p.succeeded - p.verified,
            report_errors: self.report_errors,
        }
    }

    /// Drive the state machine until `Done`, then cancel `stop`.
    ///
    /// Also finishes if every result sender is gone, since no further
    /// outcome can arrive.
    pub async fn run(
        mut self,
        mut results: mpsc::Receiver<SyncOutcome>,
        mut total: oneshot::Receiver<usize>,
        stop: CancellationToken,
    ) -> MigrationSummary {
        let mut total_pending = true;
        while self.state != MonitorState::Done {
            tokio::select! {
                outcome = results.recv() => match outcome {
                    Some(outcome) => {
                        self.on_outcome(&outcome).await;
                    }
                    None => {
                        tracing::warn!(
                            finished = self.progress.finished,
                            total = ?self.progress.total,
                            "all workers exited before completion"
                        );
                        break;
                    }
                },
                received = &mut total, if total_pending => {
                    total_pending = false;
                    match received {
                        Ok(n) => {
                            self.on_total(n);
                        }
                        Err(_) => tracing::error!("work list producer exited without a total"),
                    }
                }
            }
        }
        self.state = MonitorState::Done;
        stop.cancel();
        self.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> Monitor<Vec<u8>> {
        Monitor::new(Vec::new())
    }

    #[tokio::test]
    async fn test_outcomes_then_total() {
        let mut m = monitor();
        assert_eq!(m.on_outcome(&SyncOutcome::synced("a", true)).await, MonitorState::Collecting);
        assert_eq!(m.on_outcome(&SyncOutcome::failed("b", "x")).await, MonitorState::Collecting);
        assert_eq!(m.on_total(2), MonitorState::Done);
        let s = m.summary();
        assert_eq!((s.total, s.finished, s.succeeded, s.failed), (2, 2, 1, 1));
    }

    #[tokio::test]
    async fn test_total_then_outcomes() {
        let mut m = monitor();
        assert_eq!(m.on_total(2), MonitorState::Draining { total: 2 });
        assert_eq!(
            m.on_outcome(&SyncOutcome::synced("a", false)).await,
            MonitorState::Draining { total: 2 }
        );
        assert_eq!(m.on_outcome(&SyncOutcome::synced("b", true)).await, MonitorState::Done);
        assert_eq!(m.summary().unverified, 1);
    }

    #[test]
    fn test_zero_total_is_done() {
        let mut m = monitor();
        assert_eq!(m.on_total(0), MonitorState::Done);
        assert_eq!(m.summary(), MigrationSummary::default());
    }

    #[tokio::test]
    async fn test_run_cancels_stop() {
        let (tx, rx) = mpsc::channel(4);
        let (total_tx, total_rx) = oneshot::channel();
        let stop = CancellationToken::new();
        tx.send(SyncOutcome::synced("a", true)).await.unwrap();
        total_tx.send(1).unwrap();

        let summary = monitor().run(rx, total_rx, stop.clone()).await;
        assert!(stop.is_cancelled());
        assert_eq!(summary.succeeded, 1);
        drop(tx);
    }

    #[tokio::test]
    async fn test_run_finishes_when_workers_vanish() {
        let (tx, rx) = mpsc::channel::<SyncOutcome>(4);
        let (_total_tx, total_rx) = oneshot::channel();
        drop(tx);
        let stop = CancellationToken::new();
        let summary = monitor().run(rx, total_rx, stop.clone()).await;
        assert!(stop.is_cancelled());
        assert_eq!(summary.finished, 0);
    }

    struct BrokenSink;

    impl AsyncWrite for BrokenSink {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::Error::other("disk full")))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_report_write_errors_are_counted_not_fatal() {
        let (tx, rx) = mpsc::channel(4);
        let (total_tx, total_rx) = oneshot::channel();
        tx.send(SyncOutcome::synced("a", true)).await.unwrap();
        tx.send(SyncOutcome::failed("b", "boom")).await.unwrap();
        total_tx.send(2).unwrap();

        let stop = CancellationToken::new();
        let summary = Monitor::new(BrokenSink).run(rx, total_rx, stop.clone()).await;
        assert!(stop.is_cancelled());
        assert_eq!(summary.finished, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.report_errors, 2);
        drop(tx);
    }

    #[tokio::test]
    async fn test_run_finishes_when_total_is_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let (total_tx, total_rx) = oneshot::channel::<usize>();
        tx.send(SyncOutcome::synced("a", true)).await.unwrap();
        drop(total_tx);
        drop(tx);

        let stop = CancellationToken::new();
        let summary = monitor().run(rx, total_rx, stop.clone()).await;
        assert!(stop.is_cancelled());
        assert_eq!(summary.finished, 1);
        assert_eq!(summary.total, 1);
    }
}
