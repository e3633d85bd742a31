//! Backend selection from `scheme://` locations.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Result};
use objsync_core::storage::{Destination, KeyLister, Source};
use objsync_core::storage::{S3Storage, WosSource};
use objsync_core::{LocalStorage, MemoryStorage};

use crate::args::ConnectionArgs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// `s3://bucket[/prefix]`
    S3 { bucket: String, prefix: String },
    /// `wos://host[:port]`, read only
    Wos { host: String },
    /// `file:///path`
    Local(PathBuf),
    /// `mem://`, an empty store that lives for one run
    Memory,
}

impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| format!("{s:?} is not a scheme://location"))?;
        match scheme {
            "s3" => {
                let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(format!("{s:?} has no bucket"));
                }
                let prefix = match prefix.trim_matches('/') {
                    "" => String::new(),
                    p => format!("{p}/"),
                };
                Ok(Location::S3 {
                    bucket: bucket.to_string(),
                    prefix,
                })
            }
            "wos" => {
                let host = rest.trim_end_matches('/');
                if host.is_empty() || host.contains('/') {
                    return Err(format!("{s:?} must be wos://host[:port]"));
                }
                Ok(Location::Wos {
                    host: host.to_string(),
                })
            }
            "file" => {
                if rest.is_empty() {
                    return Err(format!("{s:?} has no path"));
                }
                Ok(Location::Local(PathBuf::from(rest)))
            }
            "mem" => Ok(Location::Memory),
            other => Err(format!("unsupported scheme {other:?} in {s:?}")),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::S3 { bucket, prefix } => write!(f, "s3://{bucket}/{prefix}"),
            Location::Wos { host } => write!(f, "wos://{host}"),
            Location::Local(path) => write!(f, "file://{}", path.display()),
            Location::Memory => f.write_str("mem://"),
        }
    }
}

impl Location {
    pub async fn open_source(&self, conn: &ConnectionArgs) -> Result<Arc<dyn Source>> {
        let source: Arc<dyn Source> = match self {
            Location::S3 { bucket, prefix } => Arc::new(self.s3(bucket, prefix, conn).await?),
            Location::Wos { host } => Arc::new(WosSource::new(host, conn.timeout())?),
            Location::Local(root) => Arc::new(LocalStorage::new(root)),
            Location::Memory => Arc::new(MemoryStorage::new()),
        };
        Ok(source)
    }

    pub async fn open_destination(&self, conn: &ConnectionArgs) -> Result<Arc<dyn Destination>> {
        let destination: Arc<dyn Destination> = match self {
            Location::S3 { bucket, prefix } => Arc::new(self.s3(bucket, prefix, conn).await?),
            Location::Wos { .. } => bail!("{self} can only be used as a source"),
            Location::Local(root) => {
                tokio::fs::create_dir_all(root).await?;
                Arc::new(LocalStorage::new(root))
            }
            Location::Memory => Arc::new(MemoryStorage::new()),
        };
        Ok(destination)
    }

    pub async fn open_lister(&self, conn: &ConnectionArgs) -> Result<Arc<dyn KeyLister>> {
        let lister: Arc<dyn KeyLister> = match self {
            Location::S3 { bucket, prefix } => Arc::new(self.s3(bucket, prefix, conn).await?),
            Location::Wos { .. } => bail!("{self} cannot enumerate its keys"),
            Location::Local(root) => Arc::new(LocalStorage::new(root)),
            Location::Memory => Arc::new(MemoryStorage::new()),
        };
        Ok(lister)
    }

    async fn s3(&self, bucket: &str, prefix: &str, conn: &ConnectionArgs) -> Result<S3Storage> {
        tracing::debug!(location = %self, "connecting to bucket");
        Ok(S3Storage::new(bucket, prefix, conn.s3_options()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> ConnectionArgs {
        ConnectionArgs {
            timeout: 5,
            s3_endpoint: None,
            s3_region: None,
        }
    }

    #[test]
    fn test_parse_s3() {
        assert_eq!(
            "s3://bucket".parse::<Location>().unwrap(),
            Location::S3 { bucket: "bucket".into(), prefix: String::new() }
        );
        assert_eq!(
            "s3://bucket/a/b".parse::<Location>().unwrap(),
            Location::S3 { bucket: "bucket".into(), prefix: "a/b/".into() }
        );
        assert!("s3:///prefix".parse::<Location>().is_err());
    }

    #[test]
    fn test_parse_other_schemes() {
        assert_eq!(
            "wos://10.0.0.5:8080/".parse::<Location>().unwrap(),
            Location::Wos { host: "10.0.0.5:8080".into() }
        );
        assert!("wos://host/objects".parse::<Location>().is_err());
        assert_eq!(
            "file:///srv/data".parse::<Location>().unwrap(),
            Location::Local(PathBuf::from("/srv/data"))
        );
        assert_eq!("mem://".parse::<Location>().unwrap(), Location::Memory);
        assert!("/srv/data".parse::<Location>().is_err());
        assert!("gs://bucket".parse::<Location>().is_err());
    }

    #[tokio::test]
    async fn test_wos_is_source_only() {
        let wos: Location = "wos://host".parse().unwrap();
        assert!(wos.open_source(&conn()).await.is_ok());
        let err = wos.open_destination(&conn()).await.err().unwrap();
        assert!(err.to_string().contains("only be used as a source"), "{err}");
        assert!(wos.open_lister(&conn()).await.is_err());
    }

    #[tokio::test]
    async fn test_local_destination_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested/target");
        let location = Location::Local(root.clone());
        location.open_destination(&conn()).await.unwrap();
        assert!(root.is_dir());
    }
}
