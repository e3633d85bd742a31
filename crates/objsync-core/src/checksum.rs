use md5::Md5;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::types::{Checksum, ChecksumAlgorithm};

const READ_CHUNK: usize = 64 * 1024;

/// Hash a byte stream to completion, consuming it exactly once.
pub async fn digest<R>(algorithm: ChecksumAlgorithm, reader: R) -> std::io::Result<Checksum>
where
    R: AsyncRead + Unpin,
{
    match algorithm {
        ChecksumAlgorithm::Md5 => digest_with::<Md5, _>(reader).await,
        ChecksumAlgorithm::Sha256 => digest_with::<Sha256, _>(reader).await,
    }
}

async fn digest_with<D, R>(mut reader: R) -> std::io::Result<Checksum>
where
    D: Digest,
    R: AsyncRead + Unpin,
{
    let mut hasher = D::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Checksum(hex::encode(hasher.finalize())))
}

/// Hash an in-memory buffer.
pub fn digest_bytes(algorithm: ChecksumAlgorithm, data: &[u8]) -> Checksum {
    let raw = match algorithm {
        ChecksumAlgorithm::Md5 => Md5::digest(data).to_vec(),
        ChecksumAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
    };
    Checksum(hex::encode(raw))
}
