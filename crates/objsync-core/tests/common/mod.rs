//! Instrumented destinations shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use objsync_core::storage::{Destination, ObjectBody, ObjectMeta, StoredObject};
use objsync_core::{MemoryStorage, Result, SyncError};
use tokio::io::AsyncReadExt;

/// Source seeded with `"<key> content"` for each key.
pub fn seeded_source(keys: &[&str]) -> MemoryStorage {
    MemoryStorage::with_objects(keys.iter().map(|k| (*k, format!("{k} content"))))
}

pub fn key_list(keys: &[&str]) -> Vec<u8> {
    let mut text = keys.join("\n");
    text.push('\n');
    text.into_bytes()
}

pub fn report_lines(report: &[u8]) -> Vec<String> {
    String::from_utf8(report.to_vec())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Split a report line into (status, verified, key).
pub fn fields(line: &str) -> (String, String, String) {
    let parts: Vec<&str> = line.split(',').collect();
    assert!(parts.len() >= 4, "short report line: {line}");
    (parts[1].into(), parts[2].into(), parts[3].into())
}

/// Refuses writes for selected keys.
pub struct FailingDestination {
    pub inner: MemoryStorage,
    pub fail_keys: HashSet<String>,
}

impl FailingDestination {
    pub fn new(fail_keys: &[&str]) -> Self {
        FailingDestination {
            inner: MemoryStorage::new(),
            fail_keys: fail_keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[async_trait]
impl Destination for FailingDestination {
    async fn write(&self, key: &str, body: ObjectBody, meta: &ObjectMeta) -> Result<()> {
        if self.fail_keys.contains(key) {
            return Err(SyncError::Storage(format!("injected write failure\nfor {key}")));
        }
        self.inner.write(key, body, meta).await
    }

    async fn read(&self, key: &str) -> Result<StoredObject> {
        Destination::read(&self.inner, key).await
    }
}

/// Adds latency to every write and tracks how many writes overlap.
#[derive(Default)]
pub struct SlowDestination {
    pub inner: MemoryStorage,
    pub delay: Duration,
    pub writes: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl SlowDestination {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(SlowDestination {
            delay,
            ..Default::default()
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Destination for SlowDestination {
    async fn write(&self, key: &str, body: ObjectBody, meta: &ObjectMeta) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self.inner.write(key, body, meta).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn read(&self, key: &str) -> Result<StoredObject> {
        Destination::read(&self.inner, key).await
    }
}

/// Stores a corrupted copy: the first byte of every object is flipped.
#[derive(Default)]
pub struct MutatingDestination {
    pub inner: MemoryStorage,
}

#[async_trait]
impl Destination for MutatingDestination {
    async fn write(&self, key: &str, mut body: ObjectBody, _meta: &ObjectMeta) -> Result<()> {
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        if let Some(first) = data.first_mut() {
            *first ^= 0xff;
        }
        self.inner.insert(key, data).await;
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<StoredObject> {
        Destination::read(&self.inner, key).await
    }
}
