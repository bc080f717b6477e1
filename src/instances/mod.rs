//! Asset instance service
//!
//! Creation writes an instance optimistically and submits it to the ledger;
//! reconciliation later converges the local record onto what the ledger
//! confirmed. See `create` and `reconcile` for the two halves.

mod create;
mod reconcile;

pub use reconcile::Reconciliation;

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::content::{ipfs_hash_to_sha256, sha256_to_ipfs_hash, to_canonical_json};
use crate::error::AssetError;
use crate::ledger::LedgerGateway;
use crate::repository::{AssetDefinitionSource, InstanceRepository};
use crate::schema::SchemaValidator;
use crate::storage::{PrivateExchange, PublicContentStore, StorageError};
use crate::types::{AssetDefinition, AssetInstance};

/// Seconds since the Unix epoch, the timestamp of optimistic writes
pub fn now_timestamp() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Ledger digest of an address the public store handed back. An address the
/// store made up is a store fault, not a payload fault.
fn stored_digest(address: &str) -> Result<String, AssetError> {
    ipfs_hash_to_sha256(address).map_err(|e| {
        AssetError::Storage(StorageError::InvalidAddress(format!("{}: {}", address, e)))
    })
}

/// Creates asset instances and reconciles their ledger confirmations
pub struct AssetInstanceService {
    definitions: Arc<dyn AssetDefinitionSource>,
    repository: Arc<dyn InstanceRepository>,
    validator: Arc<dyn SchemaValidator>,
    public_store: Arc<dyn PublicContentStore>,
    exchange: Arc<dyn PrivateExchange>,
    ledger: Arc<dyn LedgerGateway>,
}

impl AssetInstanceService {
    pub fn new(
        definitions: Arc<dyn AssetDefinitionSource>,
        repository: Arc<dyn InstanceRepository>,
        validator: Arc<dyn SchemaValidator>,
        public_store: Arc<dyn PublicContentStore>,
        exchange: Arc<dyn PrivateExchange>,
        ledger: Arc<dyn LedgerGateway>,
    ) -> Self {
        Self {
            definitions,
            repository,
            validator,
            public_store,
            exchange,
            ledger,
        }
    }

    pub async fn get_instance(&self, id: Uuid) -> Result<AssetInstance, AssetError> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| AssetError::NotFound(format!("asset instance {}", id)))
    }

    pub async fn list_instances(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<AssetInstance>, AssetError> {
        Ok(self.repository.list(skip, limit).await?)
    }

    async fn definition(&self, id: Uuid) -> Result<Option<AssetDefinition>, AssetError> {
        Ok(self.definitions.get_by_id(id).await?)
    }

    fn validate(&self, schema: &Value, value: &Value, what: &str) -> Result<(), AssetError> {
        let issues = self.validator.validate(schema, value);
        if issues.is_empty() {
            return Ok(());
        }
        let details: Vec<String> = issues.iter().map(ToString::to_string).collect();
        Err(AssetError::Validation(format!(
            "{} does not conform to asset definition schema: {}",
            what,
            details.join("; ")
        )))
    }

    /// Store a JSON payload publicly and return its ledger digest.
    async fn store_json(&self, value: &Value) -> Result<String, AssetError> {
        let address = self.public_store.put(to_canonical_json(value)?).await?;
        stored_digest(&address)
    }

    /// Fetch a JSON payload by its ledger digest.
    async fn fetch_json(&self, digest: &str) -> Result<Value, AssetError> {
        let address = sha256_to_ipfs_hash(digest)?;
        let data = self.public_store.get(&address).await?;
        serde_json::from_slice(&data).map_err(|e| {
            AssetError::Validation(format!("payload {} is not valid JSON: {}", digest, e))
        })
    }
}
