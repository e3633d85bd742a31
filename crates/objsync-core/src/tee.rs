//! Fan-out of one single-pass byte stream to two consumers.
//!
//! The pump reads the source once and hands each chunk to two bounded
//! channels; a slow consumer applies backpressure to the pump instead of
//! growing a buffer. Failures travel in both directions:
//!
//! - a source read error is delivered to both branches as a read error, so
//!   neither consumer mistakes a broken stream for a complete one;
//! - a branch that stops reading makes the pump stop and poison the other
//!   branch.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::mpsc;

/// Chunks buffered per branch.
pub const BRANCH_DEPTH: usize = 4;

/// Size of each chunk read from the source.
pub const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum TeeError {
    #[error("{0}")]
    Source(#[from] io::Error),

    #[error("a consumer stopped reading before the end of the stream")]
    BranchClosed,
}

type Chunk = io::Result<Bytes>;

/// One consumer's view of the duplicated stream.
#[derive(Debug)]
pub struct BranchReader {
    rx: mpsc::Receiver<Chunk>,
    chunk: Bytes,
}

impl AsyncRead for BranchReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            if !self.chunk.is_empty() {
                let n = self.chunk.len().min(buf.remaining());
                buf.put_slice(&self.chunk[..n]);
                self.chunk.advance(n);
                return Poll::Ready(Ok(()));
            }
            match ready!(self.rx.poll_recv(cx)) {
                Some(Ok(chunk)) => self.chunk = chunk,
                Some(Err(e)) => return Poll::Ready(Err(e)),
                None => return Poll::Ready(Ok(())),
            }
        }
    }
}

/// Split `reader` into two readers fed by the returned pump future.
///
/// The pump resolves to the number of bytes delivered to both branches.
/// Drive it together with both consumers (e.g. `tokio::join!`); every
/// future finishes even when one of them fails.
pub fn fan_out<R>(
    mut reader: R,
) -> (
    BranchReader,
    BranchReader,
    impl Future<Output = Result<u64, TeeError>>,
)
where
    R: AsyncRead + Unpin,
{
    let (left_tx, left_rx) = mpsc::channel(BRANCH_DEPTH);
    let (right_tx, right_rx) = mpsc::channel(BRANCH_DEPTH);

    let pump = async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut copied = 0u64;
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => return Ok(copied),
                Ok(n) => n,
                Err(e) => {
                    poison(&left_tx, &e).await;
                    poison(&right_tx, &e).await;
                    return Err(TeeError::Source(e));
                }
            };
            let chunk = Bytes::copy_from_slice(&buf[..n]);
            let (left, right) =
                tokio::join!(left_tx.send(Ok(chunk.clone())), right_tx.send(Ok(chunk)));
            if left.is_err() || right.is_err() {
                let closed = io::Error::new(io::ErrorKind::BrokenPipe, "sibling branch closed");
                poison(&left_tx, &closed).await;
                poison(&right_tx, &closed).await;
                return Err(TeeError::BranchClosed);
            }
            copied += n as u64;
        }
    };

    let branch = |rx| BranchReader {
        rx,
        chunk: Bytes::new(),
    };
    (branch(left_rx), branch(right_rx), pump)
}

/// Deliver `err` to a branch that is still listening.
async fn poison(tx: &mpsc::Sender<Chunk>, err: &io::Error) {
    let _ = tx.send(Err(io::Error::new(err.kind(), err.to_string()))).await;
}
