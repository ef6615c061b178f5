//! Storage for uploaded issue images.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

/// URL prefix under which the API serves the local upload directory.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

const ISSUE_IMAGES_DIR: &str = "issues";

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key`, replacing anything already there.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Public URL of a stored key. Pure; does not check the key exists.
    fn public_url(&self, key: &str) -> String;
}

/// Blob store rooted at `<upload_dir>/issues`.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(upload_dir: impl AsRef<Path>) -> Self {
        Self {
            root: upload_dir.as_ref().join(ISSUE_IMAGES_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            bail!("invalid blob key '{key}'");
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating {}", self.root.display()))?;

        let path = self.root.join(key);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{UPLOADS_URL_PREFIX}/{ISSUE_IMAGES_DIR}/{key}")
    }
}

/// Fresh blob key: `<unix-millis>-<uuid v4>.<ext>`.
pub fn new_blob_key(extension: &str) -> String {
    format!(
        "{}-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4(),
        extension
    )
}
