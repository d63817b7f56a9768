use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

/// Blob collaborator for uploaded files. Keys returned by `put` are
/// collision-resistant regardless of the caller-supplied name; the display
/// filename travels separately in the database.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn put(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<String>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    async fn delete(&self, key: &str) -> Result<()>;
}

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create upload dir {}", root.display()))?;
        Ok(Self { root })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        // Keys are generated by `put`; anything path-like is refused.
        if key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(anyhow!("invalid storage key: {key}"));
        }
        Ok(self.root.join(key))
    }
}

pub fn generate_key(suggested_name: &str) -> String {
    let sanitized: String = Path::new(suggested_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => ch,
            _ => '_',
        })
        .collect();
    format!("{}_{}", Uuid::new_v4(), sanitized)
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<String> {
        let key = generate_key(suggested_name);
        let path = self.resolve(&key)?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write blob {}", path.display()))?;
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("blob {key} missing"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("failed to delete blob {key}"))
    }
}
