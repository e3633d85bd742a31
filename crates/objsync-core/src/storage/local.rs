use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use super::{Destination, KeyLister, ObjectBody, ObjectMeta, Source, StoredObject};
use crate::error::{Result, SyncError};

/// Filesystem-backed storage rooted at a directory.
///
/// Keys are relative paths below the root. Writes land in a temporary file
/// next to the target and are renamed into place once the body is fully
/// consumed, so readers never observe a partial object.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

const TEMP_SUFFIX: &str = ".tmp";

/// In-progress writes are hidden files named `.<name>.<uuid>.tmp`.
fn is_partial_write(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.ends_with(TEMP_SUFFIX)
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStorage { root: root.into() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        let clean = !key.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(SyncError::InvalidArgument(format!(
                "key is not a relative path: {key}"
            )));
        }
        Ok(self.root.join(rel))
    }

    async fn open(&self, key: &str) -> Result<StoredObject> {
        let path = self.object_path(key)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::NotFound {
                    key: key.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();
        let meta = ObjectMeta {
            content_type: None,
            content_length: Some(len),
        };
        Ok(StoredObject::new(meta, file))
    }
}

#[async_trait]
impl Source for LocalStorage {
    async fn read(&self, key: &str) -> Result<StoredObject> {
        self.open(key).await
    }
}

#[async_trait]
impl Destination for LocalStorage {
    async fn write(&self, key: &str, mut body: ObjectBody, _meta: &ObjectMeta) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{file_name}.{}{TEMP_SUFFIX}", uuid::Uuid::new_v4()));

        let copied = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            tokio::io::copy(&mut body, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = copied {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<StoredObject> {
        self.open(key).await
    }
}

#[async_trait]
impl KeyLister for LocalStorage {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        let keys = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut keys = Vec::new();
            for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
                let entry = entry.map_err(|e| SyncError::Storage(e.to_string()))?;
                if !entry.file_type().is_file()
                    || is_partial_write(&entry.file_name().to_string_lossy())
                {
                    continue;
                }
                let Ok(rel) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(&prefix) {
                    keys.push(key);
                }
            }
            Ok(keys)
        })
        .await??;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_write_creates_parents_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path());
        Destination::write(
            &store,
            "nested/dir/obj",
            Box::new(&b"payload"[..]),
            &ObjectMeta::default(),
        )
        .await
        .unwrap();

        let mut obj = Source::read(&store, "nested/dir/obj").await.unwrap();
        assert_eq!(obj.meta.content_length, Some(7));
        let mut out = Vec::new();
        obj.body.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"payload");
    }

    #[tokio::test]
    async fn test_rejects_path_escape() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path());
        for key in ["../evil", "/etc/passwd", "a/../../b", ""] {
            let err = Source::read(&store, key).await.unwrap_err();
            assert!(matches!(err, SyncError::InvalidArgument(_)), "{key}");
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path());
        let err = Source::read(&store, "absent").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_keys_sorted_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path());
        for key in ["b/2", "a/1", "c"] {
            Destination::write(&store, key, Box::new(&b"x"[..]), &ObjectMeta::default())
                .await
                .unwrap();
        }
        assert_eq!(store.list_keys("").await.unwrap(), vec!["a/1", "b/2", "c"]);
        assert_eq!(store.list_keys("b/").await.unwrap(), vec!["b/2"]);
    }

    #[tokio::test]
    async fn test_list_keys_hides_partial_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path());
        Destination::write(&store, "a/obj", Box::new(&b"x"[..]), &ObjectMeta::default())
            .await
            .unwrap();
        // Left behind by an interrupted write.
        tokio::fs::write(dir.path().join("a/.obj.1b4e28ba-2fa1-11d2-883f-0016d3cca427.tmp"), b"x")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("a/.hidden"), b"x").await.unwrap();

        assert_eq!(store.list_keys("").await.unwrap(), vec!["a/.hidden", "a/obj"]);
    }
}
