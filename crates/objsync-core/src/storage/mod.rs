pub mod local;
pub mod memory;

#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "wos")]
pub mod wos;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

#[cfg(feature = "s3")]
pub use s3::S3Storage;

#[cfg(feature = "wos")]
pub use wos::WosSource;

use async_trait::async_trait;
use std::fmt;
use tokio::io::AsyncRead;

use crate::error::Result;

/// A single-pass object body.
pub type ObjectBody = Box<dyn AsyncRead + Send + Unpin>;

/// Content type used when a backend does not report one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata reported alongside an object body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

impl ObjectMeta {
    pub fn content_type_or_default(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// An object opened for reading.
pub struct StoredObject {
    pub meta: ObjectMeta,
    pub body: ObjectBody,
}

impl StoredObject {
    pub fn new(meta: ObjectMeta, body: impl AsyncRead + Send + Unpin + 'static) -> Self {
        StoredObject {
            meta,
            body: Box::new(body),
        }
    }
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// Where objects are migrated from.
#[async_trait]
pub trait Source: Send + Sync {
    /// Open `key` for reading.
    async fn read(&self, key: &str) -> Result<StoredObject>;
}

/// Where objects are migrated to and verified against.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Store `body` under `key`, replacing any existing content.
    ///
    /// Must consume `body` to the end before returning `Ok`.
    async fn write(&self, key: &str, body: ObjectBody, meta: &ObjectMeta) -> Result<()>;

    /// Open the stored object for reading back.
    async fn read(&self, key: &str) -> Result<StoredObject>;
}

/// Backends that can enumerate their keys to seed a fresh key list.
#[async_trait]
pub trait KeyLister: Send + Sync {
    /// All keys starting with `prefix`, in backend order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}
