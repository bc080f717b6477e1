//! Private document exchange
//!
//! Private unstructured content never touches the public store. It is streamed
//! to the document exchange, which returns a hash identifying the transferred
//! document.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs as tokio_fs;
use tokio::io::AsyncWriteExt;

use super::ContentStream;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Document not found: {0}")]
    NotFound(String),
}

/// Trait for point-to-point document transfer
#[async_trait]
pub trait PrivateExchange: Send + Sync {
    /// Transfer a document to `path` and return its hash
    async fn put_stream(&self, content: ContentStream, path: &str) -> Result<String, ExchangeError>;
}

/// A document exchange backed by a local directory
pub struct LocalDocumentExchange {
    base_dir: PathBuf,
}

impl LocalDocumentExchange {
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self, ExchangeError> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            tokio_fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    /// Read back a transferred document
    pub async fn read(&self, path: &str) -> Result<Vec<u8>, ExchangeError> {
        let full_path = self.resolve(path)?;
        if !full_path.exists() {
            return Err(ExchangeError::NotFound(path.to_string()));
        }
        Ok(tokio_fs::read(&full_path).await?)
    }

    /// Only plain relative paths are accepted; `..`, roots and prefixes are refused.
    fn resolve(&self, path: &str) -> Result<PathBuf, ExchangeError> {
        let relative = Path::new(path);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !plain {
            return Err(ExchangeError::InvalidPath(path.to_string()));
        }
        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl PrivateExchange for LocalDocumentExchange {
    async fn put_stream(
        &self,
        mut content: ContentStream,
        path: &str,
    ) -> Result<String, ExchangeError> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            tokio_fs::create_dir_all(parent).await?;
        }

        let mut hasher = Sha256::new();
        let mut file = tokio_fs::File::create(&full_path).await?;
        let mut size = 0usize;
        while let Some(chunk) = content.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            size += chunk.len();
        }
        file.flush().await?;

        let hash = format!("0x{}", hex::encode(hasher.finalize()));
        log::debug!("Transferred {} bytes to {} ({})", size, path, hash);
        Ok(hash)
    }
}
