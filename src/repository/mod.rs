//! Durable records of asset instances and read access to definitions
//!
//! The repository is the only shared mutable resource of the instance core.
//! Uniqueness checks go through [`InstanceRepository::insert_pending`] and
//! [`InstanceRepository::commit_confirmation`], which read and conditionally
//! write under a single critical section.

pub mod definitions;
pub mod local;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::types::AssetInstance;

pub use definitions::{AssetDefinitionSource, MemoryDefinitionSource};
pub use local::LocalInstanceRepository;

/// Error types for repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Instance not found: {0}")]
    NotFound(Uuid),
}

/// Result of an optimistic insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingInsert {
    Inserted,
    /// A confirmed instance already holds this unique content
    Rejected { holder: Uuid },
}

/// Result of committing a ledger confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationCommit {
    /// The instance is confirmed; the listed rivals were marked conflicted
    Committed { conflicted: Vec<Uuid> },
    /// The instance had already been confirmed; nothing was written
    AlreadyConfirmed,
    /// Another confirmed instance holds the same unique content; nothing was written
    RivalConfirmed { rival: Uuid },
}

/// Trait for asset instance persistence
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<AssetInstance>, RepositoryError>;

    /// One instance with this content, preferring a confirmed one. The service
    /// checks uniqueness inside `insert_pending`/`commit_confirmation` instead.
    async fn get_by_definition_and_content_hash(
        &self,
        definition_id: Uuid,
        content_hash: &str,
    ) -> Result<Option<AssetInstance>, RepositoryError>;

    /// Every instance with this content.
    async fn list_by_definition_and_content_hash(
        &self,
        definition_id: Uuid,
        content_hash: &str,
    ) -> Result<Vec<AssetInstance>, RepositoryError>;

    /// Create or replace the record with this id. The service writes through
    /// `insert_pending`/`commit_confirmation` instead.
    async fn upsert(&self, instance: AssetInstance) -> Result<(), RepositoryError>;

    /// Mark a single record conflicted. The service marks rivals inside
    /// `commit_confirmation` instead.
    async fn mark_conflicted(&self, id: Uuid, timestamp: u64) -> Result<(), RepositoryError>;

    /// Insert an unconfirmed instance. With `enforce_unique`, the insert is
    /// refused when a confirmed instance already holds the same content.
    async fn insert_pending(
        &self,
        instance: AssetInstance,
        enforce_unique: bool,
    ) -> Result<PendingInsert, RepositoryError>;

    /// Write a confirmed instance and, with `enforce_unique`, mark every other
    /// pending holder of the same content as conflicted at the instance's
    /// timestamp. Every changed record is written, or none is.
    async fn commit_confirmation(
        &self,
        instance: AssetInstance,
        enforce_unique: bool,
    ) -> Result<ConfirmationCommit, RepositoryError>;

    /// Instances ordered by timestamp, then id.
    async fn list(&self, skip: usize, limit: usize) -> Result<Vec<AssetInstance>, RepositoryError>;
}
