//! Local filesystem storage backend

use async_trait::async_trait;
use framegen_core::{ContentHash, FrameGenError, Result};
use std::path::{Component, Path, PathBuf};

use crate::gateway::StorageGateway;

/// Stores uploads under `root/<key>`
pub struct LocalStorage {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(root: P, public_base_url: Option<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its path, rejecting keys that escape the root
    pub fn path_for_key(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(FrameGenError::Storage(format!("invalid storage key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

/// Storage key for one artifact of a frame.
///
/// A short content digest keeps a regenerated model from colliding with a
/// cached copy of the previous one.
pub fn artifact_key(frame_id: &str, hash: &ContentHash, extension: &str) -> String {
    let safe: String = frame_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("frames/{}/{}-{}.{}", safe, safe, hash.short_hex(12), extension)
}

#[async_trait]
impl StorageGateway for LocalStorage {
    #[tracing::instrument(name = "storage.upload", skip(self, local), fields(root = %self.root.display()))]
    async fn upload(&self, local: &Path, key: &str, content_type: &str) -> Result<String> {
        let dest = self.path_for_key(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = tokio::fs::copy(local, &dest)
            .await
            .map_err(|e| FrameGenError::Storage(format!("failed to store {}: {}", key, e)))?;
        tracing::debug!(bytes, "stored artifact");
        Ok(self.public_url(key))
    }

    #[tracing::instrument(name = "storage.delete", skip(self), fields(root = %self.root.display()))]
    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for_key(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("removed artifact");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FrameGenError::Storage(format!("failed to remove {}: {}", key, e))),
        }
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, key),
            None => format!("file://{}", self.root.join(key).display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_copies_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("frame.glb");
        std::fs::write(&src, b"glTF").unwrap();

        let storage = LocalStorage::new(dir.path().join("store"), Some("https://cdn.example.com/".into()));
        let url = storage
            .upload(&src, "frames/f1/f1-abc.glb", "model/gltf-binary")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/frames/f1/f1-abc.glb");
        assert_eq!(
            std::fs::read(dir.path().join("store/frames/f1/f1-abc.glb")).unwrap(),
            b"glTF"
        );
    }

    #[tokio::test]
    async fn test_delete_removes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("frame.usdz");
        std::fs::write(&src, b"usdz").unwrap();

        let storage = LocalStorage::new(dir.path().join("store"), None);
        storage.upload(&src, "frames/f1/f1-abc.usdz", "model/vnd.usdz+zip").await.unwrap();
        storage.delete("frames/f1/f1-abc.usdz").await.unwrap();
        assert!(!dir.path().join("store/frames/f1/f1-abc.usdz").exists());

        storage.delete("frames/f1/f1-abc.usdz").await.unwrap();
        assert!(matches!(storage.delete("../x").await, Err(FrameGenError::Storage(_))));
    }

    #[test]
    fn test_file_url_without_base() {
        let storage = LocalStorage::new("/srv/models", None);
        assert_eq!(storage.public_url("a/b.usdz"), "file:///srv/models/a/b.usdz");
    }

    #[tokio::test]
    async fn test_escaping_keys_rejected() {
        let storage = LocalStorage::new("/srv/models", None);
        assert!(storage.path_for_key("../etc/passwd").is_err());
        assert!(storage.path_for_key("/abs").is_err());
        assert!(storage.path_for_key("").is_err());
        let err = storage
            .upload(Path::new("x"), "a/../../b", "model/gltf-binary")
            .await
            .unwrap_err();
        assert!(matches!(err, FrameGenError::Storage(_)));
    }

    #[test]
    fn test_artifact_key_is_sanitized() {
        let hash = ContentHash::from_bytes(b"model");
        let key = artifact_key("oak 30x40/v2", &hash, "glb");
        assert!(key.starts_with("frames/oak_30x40_v2/oak_30x40_v2-"));
        assert!(key.ends_with(".glb"));
        assert_eq!(key, artifact_key("oak 30x40/v2", &hash, "glb"));
    }
}
