//! Read, transfer and verify a single object.

use crate::checksum;
use crate::error::{Result, SyncError, TransferStage};
use crate::storage::{Destination, Source, StoredObject};
use crate::tee::{self, TeeError};
use crate::types::{Checksum, ChecksumAlgorithm, SyncOutcome};

/// Migrate `key` and report how it went. Never returns an error: every
/// failure is folded into the outcome.
#[cfg_attr(
    feature = "observability",
    tracing::instrument(skip(source, destination, algorithm))
)]
pub async fn sync_object(
    key: &str,
    source: &dyn Source,
    destination: &dyn Destination,
    algorithm: ChecksumAlgorithm,
) -> SyncOutcome {
    match transfer_and_verify(key, source, destination, algorithm).await {
        Ok(verified) => SyncOutcome::synced(key, verified),
        Err(e) => {
            tracing::warn!(key, error = %e, retryable = e.is_retryable(), "sync failed");
            SyncOutcome::failed(key, e)
        }
    }
}

/// Copy `key` while hashing the same bytes, then compare against a fresh
/// read of the destination. Returns whether the checksums matched.
pub async fn transfer_and_verify(
    key: &str,
    source: &dyn Source,
    destination: &dyn Destination,
    algorithm: ChecksumAlgorithm,
) -> Result<bool> {
    tracing::debug!(key, "retrieving object");
    let object = source
        .read(key)
        .await
        .map_err(|e| SyncError::transfer(TransferStage::SourceRead, key, e))?;

    tracing::debug!(key, length = ?object.meta.content_length, "writing object");
    let uploaded = upload_with_checksum(key, object, destination, algorithm).await?;

    tracing::debug!(key, "verifying object");
    let written = destination
        .read(key)
        .await
        .map_err(|e| SyncError::transfer(TransferStage::DestinationRead, key, e))?;
    let stored = checksum::digest(algorithm, written.body)
        .await
        .map_err(|source| SyncError::Checksum {
            key: key.to_string(),
            source,
        })?;

    if stored != uploaded {
        tracing::warn!(key, expected = %uploaded, actual = %stored, "checksum mismatch");
        return Ok(false);
    }
    tracing::debug!(key, checksum = uploaded.short(), "verified object");
    Ok(true)
}

/// Stream the source body to the destination and a hasher at once.
///
/// All three legs always run to completion: the tee turns a failure on one
/// side into a read error on the others, so the joined results name the
/// first cause.
async fn upload_with_checksum(
    key: &str,
    object: StoredObject,
    destination: &dyn Destination,
    algorithm: ChecksumAlgorithm,
) -> Result<Checksum> {
    let meta = object.meta;
    let (upload_branch, hash_branch, pump) = tee::fan_out(object.body);

    let upload = destination.write(key, Box::new(upload_branch), &meta);
    let hash = checksum::digest(algorithm, hash_branch);
    let (pumped, uploaded, hashed) = tokio::join!(pump, upload, hash);

    let copied = match pumped {
        Ok(n) => Some(n),
        Err(TeeError::Source(e)) => {
            return Err(SyncError::transfer(TransferStage::SourceRead, key, e))
        }
        Err(TeeError::BranchClosed) => None,
    };
    uploaded.map_err(|e| SyncError::transfer(TransferStage::DestinationWrite, key, e))?;
    let sum = hashed.map_err(|source| SyncError::Checksum {
        key: key.to_string(),
        source,
    })?;
    let Some(copied) = copied else {
        return Err(SyncError::transfer(
            TransferStage::DestinationWrite,
            key,
            TeeError::BranchClosed,
        ));
    };
    tracing::debug!(key, bytes = copied, "wrote object");
    Ok(sum)
}
