//! Payload storage for asset instances
//!
//! Public payloads go to a content-addressed store; private documents are
//! streamed to a point-to-point document exchange. Both are collaborators of
//! the instance core, so only their traits and local implementations live here.

pub mod exchange;
pub mod local;
pub mod memory;

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use thiserror::Error;

pub use exchange::{ExchangeError, LocalDocumentExchange, PrivateExchange};
pub use local::LocalContentStore;
pub use memory::MemoryContentStore;

/// Error types for content store operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Invalid content address: {0}")]
    InvalidAddress(String),
}

/// A content-addressed store for public payloads.
///
/// The address is a deterministic function of the bytes, so storing the same
/// bytes twice yields the same address.
#[async_trait]
pub trait PublicContentStore: Send + Sync {
    /// Store data and return its content address
    async fn put(&self, data: Vec<u8>) -> Result<String, StorageError>;

    /// Retrieve data by its content address
    async fn get(&self, address: &str) -> Result<Vec<u8>, StorageError>;
}

/// A stream of document bytes, as received from an upload
pub type ContentStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Wrap an in-memory buffer as a single-chunk [`ContentStream`].
pub fn stream_from_bytes(data: impl Into<Bytes>) -> ContentStream {
    stream::once(futures_util::future::ready(Ok(data.into()))).boxed()
}

/// Drain a [`ContentStream`] into one buffer.
pub async fn collect_stream(mut content: ContentStream) -> Result<Vec<u8>, std::io::Error> {
    let mut data = Vec::new();
    while let Some(chunk) = content.next().await {
        data.extend_from_slice(&chunk?);
    }
    Ok(data)
}

/// Configuration for the directory-backed stores
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Directory for public content
    pub content_dir: PathBuf,

    /// Directory for documents received through the exchange
    pub exchange_dir: PathBuf,
}

impl StorageConfig {
    pub fn under(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            content_dir: base_dir.join("content"),
            exchange_dir: base_dir.join("exchange"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::under("./asset_trail_data")
    }
}
