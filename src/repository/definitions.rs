use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::RepositoryError;
use crate::types::AssetDefinition;

/// Read-only lookup of asset definitions
#[async_trait]
pub trait AssetDefinitionSource: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<AssetDefinition>, RepositoryError>;
}

/// Definitions held in memory, registered by whoever owns them
#[derive(Default)]
pub struct MemoryDefinitionSource {
    definitions: RwLock<HashMap<Uuid, AssetDefinition>>,
}

impl MemoryDefinitionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a definition, returning its id
    pub async fn insert(&self, definition: AssetDefinition) -> Uuid {
        let id = definition.id;
        self.definitions.write().await.insert(id, definition);
        id
    }

    /// Mark a definition as confirmed on the ledger
    pub async fn confirm(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut definitions = self.definitions.write().await;
        let definition = definitions.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        definition.confirmed = true;
        Ok(())
    }

    pub async fn list(&self) -> Vec<AssetDefinition> {
        self.definitions.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl AssetDefinitionSource for MemoryDefinitionSource {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<AssetDefinition>, RepositoryError> {
        Ok(self.definitions.read().await.get(&id).cloned())
    }
}
