//! Ledger submission of asset instance transactions
//!
//! The gateway only submits. Confirmations come back later, independently,
//! as [`LedgerEvent`](crate::types::LedgerEvent)s on the event channel.

pub mod loopback;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use loopback::{LoopbackLedger, SubmittedTransaction};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Event channel closed")]
    ChannelClosed,
}

/// Trait for submitting create-instance transactions.
///
/// With `sync` set the call waits for the ledger to accept the transaction;
/// otherwise it returns once the transaction is handed off.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn submit_create(
        &self,
        instance_id_hex: &str,
        definition_id: Uuid,
        author: &str,
        content_hash: &str,
        sync: bool,
    ) -> Result<(), LedgerError>;

    async fn submit_create_with_description(
        &self,
        instance_id_hex: &str,
        definition_id: Uuid,
        author: &str,
        description_hash: &str,
        content_hash: &str,
        sync: bool,
    ) -> Result<(), LedgerError>;
}
