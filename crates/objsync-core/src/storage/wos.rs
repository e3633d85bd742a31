use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::StatusCode;
use std::time::Duration;
use tokio_util::io::StreamReader;

use super::{ObjectMeta, Source, StoredObject};
use crate::error::{Result, SyncError};

/// Status header every WOS response carries.
pub const STATUS_HEADER: &str = "x-ddn-status";

const STATUS_OK: &str = "0 ok";

/// Read-only client for a WOS object server (`GET /objects/<oid>`).
///
/// Enable with the `wos` Cargo feature flag.
#[derive(Debug, Clone)]
pub struct WosSource {
    client: reqwest::Client,
    read_url_prefix: String,
}

impl WosSource {
    /// `host` is `name[:port]`; requests go over plain HTTP.
    pub fn new(host: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        Ok(WosSource {
            client,
            read_url_prefix: format!("http://{}/objects/", host.trim_end_matches('/')),
        })
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}{}", self.read_url_prefix, key)
    }
}

/// Validate the response headers of a successful GET.
fn parse_headers(key: &str, headers: &HeaderMap) -> Result<ObjectMeta> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let status = header(STATUS_HEADER).ok_or_else(|| {
        SyncError::Storage(format!("wos read error {key}: not found {STATUS_HEADER}"))
    })?;
    if status != STATUS_OK {
        return Err(SyncError::Storage(format!(
            "wos read error {key}: failed {STATUS_HEADER} code: {status}"
        )));
    }

    let content_type = header(CONTENT_TYPE.as_str())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SyncError::Storage(format!("wos read error {key}: not found content type")))?;

    let raw_length = header(CONTENT_LENGTH.as_str())
        .ok_or_else(|| SyncError::Storage(format!("wos read error {key}: not found length")))?;
    let content_length = raw_length.parse::<u64>().map_err(|e| {
        SyncError::Storage(format!("wos read content-length error {key}: {e}"))
    })?;

    Ok(ObjectMeta {
        content_type: Some(content_type.to_string()),
        content_length: Some(content_length),
    })
}

#[async_trait]
impl Source for WosSource {
    async fn read(&self, key: &str) -> Result<StoredObject> {
        let resp = self
            .client
            .get(self.object_url(key))
            .send()
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        if resp.status() != StatusCode::OK {
            return Err(SyncError::Storage(format!(
                "wos read error {key}: http failed code: {}",
                resp.status().as_u16()
            )));
        }
        let meta = parse_headers(key, resp.headers())?;

        let stream = resp.bytes_stream().map_err(std::io::Error::other);
        Ok(StoredObject::new(meta, StreamReader::new(Box::pin(stream))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_object_url() {
        let src = WosSource::new("wos.local:8080", Duration::from_secs(5)).unwrap();
        assert_eq!(src.object_url("abc"), "http://wos.local:8080/objects/abc");
    }

    #[test]
    fn test_accepts_complete_headers() {
        let meta = parse_headers(
            "k",
            &headers(&[
                (STATUS_HEADER, "0 ok"),
                ("content-type", "application/octet-stream"),
                ("content-length", "42"),
            ]),
        )
        .unwrap();
        assert_eq!(meta.content_length, Some(42));
        assert_eq!(meta.content_type.as_deref(), Some("application/octet-stream"));
    }

    #[test]
    fn test_rejects_bad_status() {
        let err = parse_headers(
            "k",
            &headers(&[
                (STATUS_HEADER, "205 InvalidObjId"),
                ("content-type", "application/octet-stream"),
                ("content-length", "1"),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("205 InvalidObjId"));
    }

    #[test]
    fn test_rejects_missing_headers() {
        assert!(parse_headers("k", &headers(&[])).is_err());
        assert!(parse_headers("k", &headers(&[(STATUS_HEADER, "0 ok")])).is_err());
        assert!(parse_headers(
            "k",
            &headers(&[(STATUS_HEADER, "0 ok"), ("content-type", "text/plain")])
        )
        .is_err());
        assert!(parse_headers(
            "k",
            &headers(&[
                (STATUS_HEADER, "0 ok"),
                ("content-type", "text/plain"),
                ("content-length", "ten"),
            ])
        )
        .is_err());
    }
}
