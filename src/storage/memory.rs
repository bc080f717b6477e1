use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PublicContentStore, StorageError};
use crate::content::ipfs_hash_for;

/// A content-addressed store held entirely in memory
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct objects held
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    pub async fn contains(&self, address: &str) -> bool {
        self.blobs.read().await.contains_key(address)
    }
}

#[async_trait]
impl PublicContentStore for MemoryContentStore {
    async fn put(&self, data: Vec<u8>) -> Result<String, StorageError> {
        let address =
            ipfs_hash_for(&data).map_err(|e| StorageError::InvalidAddress(e.to_string()))?;
        self.blobs
            .write()
            .await
            .entry(address.clone())
            .or_insert(data);
        Ok(address)
    }

    async fn get(&self, address: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(address.to_string()))
    }
}
