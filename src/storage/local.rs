//! Local file system content store
//!
//! Objects live at `{base_dir}/{first two address chars}/{address}`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs as tokio_fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{PublicContentStore, StorageError};
use crate::content::{ipfs_hash_for, ipfs_hash_to_sha256};

/// A content-addressed store that uses the local file system
pub struct LocalContentStore {
    base_dir: PathBuf,
}

impl LocalContentStore {
    /// Create a new store, creating the base directory if needed
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            tokio_fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path for an address. Addresses that are not CIDv0 are rejected so
    /// callers cannot reach outside the base directory.
    fn get_path(&self, address: &str) -> Result<PathBuf, StorageError> {
        ipfs_hash_to_sha256(address)
            .map_err(|_| StorageError::InvalidAddress(address.to_string()))?;
        Ok(self.base_dir.join(&address[..2]).join(address))
    }
}

#[async_trait]
impl PublicContentStore for LocalContentStore {
    async fn put(&self, data: Vec<u8>) -> Result<String, StorageError> {
        let address =
            ipfs_hash_for(&data).map_err(|e| StorageError::InvalidAddress(e.to_string()))?;
        let path = self.get_path(&address)?;

        if path.exists() {
            log::debug!("Content {} already stored", address);
            return Ok(address);
        }

        if let Some(parent) = path.parent() {
            tokio_fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename, so readers never see partial objects
        let partial = path.with_extension("partial");
        let mut file = tokio_fs::File::create(&partial).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        tokio_fs::rename(&partial, &path).await?;

        Ok(address)
    }

    async fn get(&self, address: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.get_path(address)?;

        if !path.exists() {
            return Err(StorageError::NotFound(address.to_string()));
        }

        let mut file = tokio_fs::File::open(&path).await?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).await?;

        Ok(data)
    }
}
