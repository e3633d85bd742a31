use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;

use super::{Destination, KeyLister, ObjectBody, ObjectMeta, Source, StoredObject};
use crate::error::{Result, SyncError};

#[derive(Debug, Clone)]
struct Entry {
    content_type: Option<String>,
    data: Arc<Vec<u8>>,
}

/// Process-local object store. Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<BTreeMap<String, Entry>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `(key, bytes)` pairs.
    pub fn with_objects<K, V>(objects: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let map = objects
            .into_iter()
            .map(|(k, v)| {
                (
                    k.into(),
                    Entry {
                        content_type: None,
                        data: Arc::new(v.into()),
                    },
                )
            })
            .collect();
        MemoryStorage {
            objects: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects.write().await.insert(
            key.into(),
            Entry {
                content_type: None,
                data: Arc::new(data.into()),
            },
        );
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|e| e.data.as_ref().clone())
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .and_then(|e| e.content_type.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    async fn open(&self, key: &str) -> Result<StoredObject> {
        let entry = self
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| SyncError::NotFound {
                key: key.to_string(),
            })?;
        let meta = ObjectMeta {
            content_type: entry.content_type.clone(),
            content_length: Some(entry.data.len() as u64),
        };
        Ok(StoredObject::new(meta, Cursor::new(entry.data.as_ref().clone())))
    }
}

#[async_trait]
impl Source for MemoryStorage {
    async fn read(&self, key: &str) -> Result<StoredObject> {
        self.open(key).await
    }
}

#[async_trait]
impl Destination for MemoryStorage {
    async fn write(&self, key: &str, mut body: ObjectBody, meta: &ObjectMeta) -> Result<()> {
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        self.objects.write().await.insert(
            key.to_string(),
            Entry {
                content_type: meta.content_type.clone(),
                data: Arc::new(data),
            },
        );
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<StoredObject> {
        self.open(key).await
    }
}

#[async_trait]
impl KeyLister for MemoryStorage {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
