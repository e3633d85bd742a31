use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use super::{Destination, KeyLister, ObjectBody, ObjectMeta, Source, StoredObject};
use crate::error::{Result, SyncError};

/// Bodies at least this large go through the multipart API.
pub const PART_SIZE: usize = 8 * 1024 * 1024;

/// Connection settings for [`S3Storage`].
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    /// Custom endpoint for S3-compatible services; enables path-style addressing.
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// Per-operation timeout applied by the SDK.
    pub timeout: Option<Duration>,
}

/// S3-backed storage for one bucket.
///
/// Object keys are stored as `<prefix><key>`. Credentials are resolved via
/// the standard SDK chain (env vars, `~/.aws/credentials`, instance profile,
/// etc.).
///
/// Enable with the `s3` Cargo feature flag.
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    /// Create a new S3Storage and check that the bucket is reachable.
    ///
    /// `prefix` – optional key prefix (e.g. `"migrated/"`) – use `""` for none.
    pub async fn new(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        options: S3Options,
    ) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = options.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        if let Some(timeout) = options.timeout {
            loader = loader.timeout_config(
                aws_config::timeout::TimeoutConfig::builder()
                    .operation_timeout(timeout)
                    .build(),
            );
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = options.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let storage = S3Storage {
            client: S3Client::from_conf(builder.build()),
            bucket: bucket.into(),
            prefix: prefix.into(),
        };
        storage.check_bucket().await?;
        Ok(storage)
    }

    /// Wrap an already configured client.
    pub fn from_client(client: S3Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        S3Storage {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    fn object_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Verifies bucket access with a cheap `head_bucket` call.
    async fn check_bucket(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                SyncError::Storage(format!(
                    "S3 bucket '{}' not accessible: {}",
                    self.bucket,
                    e.into_service_error()
                ))
            })?;
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<StoredObject> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                let service_err = e.into_service_error();
                return Err(if service_err.is_no_such_key() {
                    SyncError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    SyncError::Storage(service_err.to_string())
                });
            }
        };
        let meta = ObjectMeta {
            content_type: resp.content_type().map(|s| s.to_string()),
            content_length: resp.content_length().and_then(|n| u64::try_from(n).ok()),
        };
        Ok(StoredObject::new(meta, Box::pin(resp.body.into_async_read())))
    }

    async fn put_single(&self, key: &str, data: Vec<u8>, meta: &ObjectMeta) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(meta.content_type_or_default())
            .send()
            .await
            .map_err(|e| SyncError::Storage(e.into_service_error().to_string()))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        first_part: Vec<u8>,
        body: &mut ObjectBody,
        meta: &ObjectMeta,
    ) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(meta.content_type_or_default())
            .send()
            .await
            .map_err(|e| SyncError::Storage(e.into_service_error().to_string()))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| SyncError::Storage("multipart upload without id".into()))?
            .to_string();

        match self.upload_parts(key, &upload_id, first_part, body).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| SyncError::Storage(e.into_service_error().to_string()))?;
                Ok(())
            }
            Err(err) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        key,
                        error = %abort_err.into_service_error(),
                        "failed to abort multipart upload"
                    );
                }
                Err(err)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        first_part: Vec<u8>,
        body: &mut ObjectBody,
    ) -> Result<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut part_number: i32 = 1;
        let mut data = first_part;
        loop {
            let last = data.len() < PART_SIZE;
            let resp = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(|e| SyncError::Storage(e.into_service_error().to_string()))?;
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(resp.e_tag().map(|s| s.to_string()))
                    .part_number(part_number)
                    .build(),
            );
            if last {
                return Ok(parts);
            }
            data = read_part(body).await?;
            if data.is_empty() {
                return Ok(parts);
            }
            part_number += 1;
        }
    }
}

/// Read up to [`PART_SIZE`] bytes; shorter only at end of stream.
async fn read_part(body: &mut ObjectBody) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(PART_SIZE);
    (&mut *body).take(PART_SIZE as u64).read_to_end(&mut buf).await?;
    Ok(buf)
}

#[async_trait]
impl Source for S3Storage {
    async fn read(&self, key: &str) -> Result<StoredObject> {
        self.open(key).await
    }
}

#[async_trait]
impl Destination for S3Storage {
    async fn write(&self, key: &str, mut body: ObjectBody, meta: &ObjectMeta) -> Result<()> {
        let object_key = self.object_key(key);
        let first = read_part(&mut body).await?;
        if first.len() < PART_SIZE {
            tracing::debug!(key, bytes = first.len(), "single put");
            return self.put_single(&object_key, first, meta).await;
        }
        tracing::debug!(key, "multipart put");
        self.put_multipart(&object_key, first, &mut body, meta).await
    }

    async fn read(&self, key: &str) -> Result<StoredObject> {
        self.open(key).await
    }
}

#[async_trait]
impl KeyLister for S3Storage {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let full_prefix = self.object_key(prefix);
        let mut keys = Vec::new();

        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix);
            if let Some(ref token) = continuation {
                req = req.continuation_token(token);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| SyncError::Storage(e.into_service_error().to_string()))?;

            for obj in resp.contents() {
                let key = obj.key().unwrap_or("");
                // Report keys relative to the storage prefix.
                let key = key.strip_prefix(&self.prefix).unwrap_or(key);
                if !key.is_empty() {
                    keys.push(key.to_string());
                }
            }

            if resp.is_truncated().unwrap_or(false) {
                continuation = resp.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }
        Ok(keys)
    }
}
