//! A single-node stand-in for the ledger
//!
//! Every submitted transaction is recorded and immediately confirmed: a
//! [`LedgerEvent`] is queued on the event channel with a timestamp taken from
//! a monotonically increasing clock.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use super::{LedgerError, LedgerGateway};
use crate::content::uuid_to_hex;
use crate::types::LedgerEvent;

/// A transaction as the loopback ledger received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub instance_id_hex: String,
    pub definition_id: Uuid,
    pub author: String,
    pub description_hash: Option<String>,
    pub content_hash: String,
    pub sync: bool,
}

pub struct LoopbackLedger {
    events: mpsc::Sender<LedgerEvent>,
    clock: AtomicU64,
    submissions: Mutex<Vec<SubmittedTransaction>>,
}

impl LoopbackLedger {
    pub fn new(events: mpsc::Sender<LedgerEvent>) -> Self {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        Self {
            events,
            clock: AtomicU64::new(now),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// A ledger together with the receiving end of its event channel
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<LedgerEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    pub async fn submissions(&self) -> Vec<SubmittedTransaction> {
        self.submissions.lock().await.clone()
    }

    async fn submit(&self, transaction: SubmittedTransaction) -> Result<(), LedgerError> {
        if self.events.is_closed() {
            return Err(LedgerError::ChannelClosed);
        }

        let timestamp = self.clock.fetch_add(1, Ordering::SeqCst);
        let event = LedgerEvent {
            asset_instance_id: transaction.instance_id_hex.clone(),
            asset_definition_id: uuid_to_hex(transaction.definition_id),
            author: transaction.author.clone(),
            description_hash: transaction.description_hash.clone(),
            content_hash: transaction.content_hash.clone(),
            timestamp: timestamp.to_string(),
        };
        let sync = transaction.sync;
        self.submissions.lock().await.push(transaction);

        if sync {
            self.events
                .send(event)
                .await
                .map_err(|_| LedgerError::ChannelClosed)
        } else {
            let events = self.events.clone();
            tokio::spawn(async move {
                let instance = event.asset_instance_id.clone();
                if events.send(event).await.is_err() {
                    log::warn!("Dropped confirmation for {}: event channel closed", instance);
                }
            });
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerGateway for LoopbackLedger {
    async fn submit_create(
        &self,
        instance_id_hex: &str,
        definition_id: Uuid,
        author: &str,
        content_hash: &str,
        sync: bool,
    ) -> Result<(), LedgerError> {
        self.submit(SubmittedTransaction {
            instance_id_hex: instance_id_hex.to_string(),
            definition_id,
            author: author.to_string(),
            description_hash: None,
            content_hash: content_hash.to_string(),
            sync,
        })
        .await
    }

    async fn submit_create_with_description(
        &self,
        instance_id_hex: &str,
        definition_id: Uuid,
        author: &str,
        description_hash: &str,
        content_hash: &str,
        sync: bool,
    ) -> Result<(), LedgerError> {
        self.submit(SubmittedTransaction {
            instance_id_hex: instance_id_hex.to_string(),
            definition_id,
            author: author.to_string(),
            description_hash: Some(description_hash.to_string()),
            content_hash: content_hash.to_string(),
            sync,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetInstanceCreated;

    #[tokio::test]
    async fn test_sync_submission_queues_confirmation() {
        let (ledger, mut events) = LoopbackLedger::channel(4);
        let instance = Uuid::new_v4();
        let definition = Uuid::new_v4();

        ledger
            .submit_create(&uuid_to_hex(instance), definition, "0xauthor", "0xaa", true)
            .await
            .unwrap();

        let event = AssetInstanceCreated::try_from(events.recv().await.unwrap()).unwrap();
        assert_eq!(event.asset_instance_id, instance);
        assert_eq!(event.asset_definition_id, definition);
        assert_eq!(event.description_hash, None);
        assert_eq!(ledger.submissions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_async_submission_and_increasing_timestamps() {
        let (ledger, mut events) = LoopbackLedger::channel(4);
        let definition = Uuid::new_v4();

        ledger
            .submit_create_with_description(
                &uuid_to_hex(Uuid::new_v4()),
                definition,
                "0xauthor",
                "0xdd",
                "0xaa",
                false,
            )
            .await
            .unwrap();
        ledger
            .submit_create(&uuid_to_hex(Uuid::new_v4()), definition, "0xauthor", "0xbb", true)
            .await
            .unwrap();

        let mut received = vec![events.recv().await.unwrap(), events.recv().await.unwrap()];
        received.sort_by_key(|e| e.timestamp.parse::<u64>().unwrap());
        assert_eq!(received[0].description_hash.as_deref(), Some("0xdd"));
        assert!(received[0].timestamp.parse::<u64>().unwrap() < received[1].timestamp.parse::<u64>().unwrap());
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let (ledger, events) = LoopbackLedger::channel(1);
        drop(events);
        let err = ledger
            .submit_create(&uuid_to_hex(Uuid::new_v4()), Uuid::new_v4(), "a", "0xaa", false)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ChannelClosed));
    }
}
