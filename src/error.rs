//! Error taxonomy for asset instance operations
//!
//! Request-path rejections and confirmation-path protocol violations share one
//! enum. Callers tell them apart with [`AssetError::kind`] and
//! [`AssetError::is_fatal`] rather than by matching individual messages.

use thiserror::Error;
use uuid::Uuid;

use crate::content::ContentError;
use crate::ledger::LedgerError;
use crate::repository::RepositoryError;
use crate::storage::{ExchangeError, StorageError};

/// Error types for asset instance operations
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Asset instance content conflict: {0}")]
    Conflict(String),

    #[error("Duplicate asset instance ID: {0}")]
    DuplicateEvent(Uuid),

    #[error("Unknown asset definition: {0}")]
    UnknownDefinition(Uuid),

    #[error("Confirmed asset instance content conflict: {0}")]
    ContentConflict(String),

    #[error("Missing description for asset instance {0}")]
    MissingDescription(Uuid),

    #[error("Invalid ledger event: {0}")]
    InvalidEvent(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] ContentError),

    #[error("Content store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Document exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Coarse classification of an [`AssetError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidState,
    InvalidRequest,
    Conflict,
    DuplicateEvent,
    UnknownDefinition,
    ContentConflict,
    MissingDescription,
    InvalidEvent,
    /// A collaborator (store, exchange, repository, ledger) failed
    Transport,
}

impl AssetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssetError::Validation(_) | AssetError::Encoding(_) => ErrorKind::Validation,
            AssetError::NotFound(_) => ErrorKind::NotFound,
            AssetError::InvalidState(_) => ErrorKind::InvalidState,
            AssetError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            AssetError::Conflict(_) => ErrorKind::Conflict,
            AssetError::DuplicateEvent(_) => ErrorKind::DuplicateEvent,
            AssetError::UnknownDefinition(_) => ErrorKind::UnknownDefinition,
            AssetError::ContentConflict(_) => ErrorKind::ContentConflict,
            AssetError::MissingDescription(_) => ErrorKind::MissingDescription,
            AssetError::InvalidEvent(_) => ErrorKind::InvalidEvent,
            AssetError::Storage(_)
            | AssetError::Exchange(_)
            | AssetError::Repository(_)
            | AssetError::Ledger(_) => ErrorKind::Transport,
        }
    }

    /// Protocol-level inconsistencies on the confirmation path. These must be
    /// escalated to an operator and are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DuplicateEvent
                | ErrorKind::UnknownDefinition
                | ErrorKind::ContentConflict
                | ErrorKind::MissingDescription
                | ErrorKind::InvalidEvent
        )
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}
