//! Local instance repository
//!
//! Keeps every instance in memory with a secondary index on
//! `(definition, content hash)`. When opened on a directory, each instance is
//! also written through to `{id}.json` and reloaded on the next open.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs as tokio_fs;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ConfirmationCommit, InstanceRepository, PendingInsert, RepositoryError};
use crate::types::AssetInstance;

fn instance_path(storage_path: &Path, id: Uuid) -> PathBuf {
    storage_path.join(format!("{}.json", id))
}

/// Write an instance beside its final location as `{id}.json.partial`.
async fn stage_instance(
    storage_path: &Path,
    instance: &AssetInstance,
) -> Result<PathBuf, RepositoryError> {
    let json = serde_json::to_vec_pretty(instance)
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

    let partial = storage_path.join(format!("{}.json.partial", instance.id));
    tokio_fs::write(&partial, json)
        .await
        .map_err(|e| RepositoryError::IoError(e.to_string()))?;
    Ok(partial)
}

async fn discard(partials: &[PathBuf]) {
    for partial in partials {
        if let Err(e) = tokio_fs::remove_file(partial).await {
            log::warn!("Failed to remove {}: {}", partial.display(), e);
        }
    }
}

#[derive(Default)]
struct RepositoryState {
    instances: HashMap<Uuid, AssetInstance>,
    by_content: HashMap<(Uuid, String), BTreeSet<Uuid>>,
}

impl RepositoryState {
    fn put(&mut self, instance: AssetInstance) {
        let key = instance.content_key();
        if let Some(previous) = self.instances.get(&instance.id) {
            let previous_key = previous.content_key();
            if previous_key != key {
                if let Some(ids) = self.by_content.get_mut(&previous_key) {
                    ids.remove(&instance.id);
                    if ids.is_empty() {
                        self.by_content.remove(&previous_key);
                    }
                }
            }
        }
        self.by_content.entry(key).or_default().insert(instance.id);
        self.instances.insert(instance.id, instance);
    }

    fn holders<'a>(
        &'a self,
        definition_id: Uuid,
        content_hash: &str,
    ) -> impl Iterator<Item = &'a AssetInstance> + 'a {
        self.by_content
            .get(&(definition_id, content_hash.to_string()))
            .into_iter()
            .flatten()
            .filter_map(move |id| self.instances.get(id))
    }

    fn confirmed_holder(&self, instance: &AssetInstance) -> Option<Uuid> {
        self.holders(instance.asset_definition_id, &instance.content_hash)
            .find(|other| other.id != instance.id && other.confirmed)
            .map(|other| other.id)
    }
}

/// Instance repository kept in memory, optionally persisted to a directory
pub struct LocalInstanceRepository {
    storage_path: Option<PathBuf>,
    state: RwLock<RepositoryState>,
}

impl LocalInstanceRepository {
    /// A repository that forgets everything when dropped
    pub fn in_memory() -> Self {
        Self {
            storage_path: None,
            state: RwLock::new(RepositoryState::default()),
        }
    }

    /// Open a persistent repository, loading any instances already in the directory.
    pub async fn open(storage_path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let storage_path = storage_path.into();
        tokio_fs::create_dir_all(&storage_path)
            .await
            .map_err(|e| RepositoryError::IoError(e.to_string()))?;

        let mut state = RepositoryState::default();
        let mut entries = tokio_fs::read_dir(&storage_path)
            .await
            .map_err(|e| RepositoryError::IoError(e.to_string()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RepositoryError::IoError(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                let data = tokio_fs::read(&path)
                    .await
                    .map_err(|e| RepositoryError::IoError(e.to_string()))?;
                let instance: AssetInstance = serde_json::from_slice(&data).map_err(|e| {
                    RepositoryError::DeserializationError(format!("{}: {}", path.display(), e))
                })?;
                state.put(instance);
            }
        }

        log::info!(
            "Loaded {} asset instances from {}",
            state.instances.len(),
            storage_path.display()
        );

        Ok(Self {
            storage_path: Some(storage_path),
            state: RwLock::new(state),
        })
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.instances.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.instances.is_empty()
    }

    /// Write a group of records so that either all of them or none of them
    /// replace what is on disk. `state` still holds the previous versions and
    /// is used to put back files already swapped in when a later rename fails.
    async fn persist(
        &self,
        state: &RepositoryState,
        instances: &[&AssetInstance],
    ) -> Result<(), RepositoryError> {
        let storage_path = match &self.storage_path {
            Some(storage_path) => storage_path,
            None => return Ok(()),
        };

        let mut staged = Vec::with_capacity(instances.len());
        for instance in instances {
            match stage_instance(storage_path, instance).await {
                Ok(partial) => staged.push(partial),
                Err(e) => {
                    discard(&staged).await;
                    return Err(e);
                }
            }
        }

        for (done, (partial, instance)) in staged.iter().zip(instances).enumerate() {
            let path = instance_path(storage_path, instance.id);
            if let Err(e) = tokio_fs::rename(partial, &path).await {
                log::error!("Failed to write {}: {}", path.display(), e);
                discard(&staged[done..]).await;
                for swapped in &instances[..done] {
                    self.restore(storage_path, state, swapped.id).await;
                }
                return Err(RepositoryError::IoError(e.to_string()));
            }
        }
        Ok(())
    }

    /// Put the in-memory version of a record back on disk, or remove the
    /// file when the record is new.
    async fn restore(&self, storage_path: &Path, state: &RepositoryState, id: Uuid) {
        let path = instance_path(storage_path, id);
        let restored = match state.instances.get(&id) {
            Some(previous) => match stage_instance(storage_path, previous).await {
                Ok(partial) => tokio_fs::rename(&partial, &path)
                    .await
                    .map_err(|e| RepositoryError::IoError(e.to_string())),
                Err(e) => Err(e),
            },
            None => tokio_fs::remove_file(&path)
                .await
                .map_err(|e| RepositoryError::IoError(e.to_string())),
        };
        if let Err(e) = restored {
            log::error!("Failed to restore {} after an aborted commit: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl InstanceRepository for LocalInstanceRepository {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<AssetInstance>, RepositoryError> {
        Ok(self.state.read().await.instances.get(&id).cloned())
    }

    async fn get_by_definition_and_content_hash(
        &self,
        definition_id: Uuid,
        content_hash: &str,
    ) -> Result<Option<AssetInstance>, RepositoryError> {
        let state = self.state.read().await;
        let confirmed = state
            .holders(definition_id, content_hash)
            .find(|instance| instance.confirmed);
        let found = match confirmed {
            Some(instance) => Some(instance),
            None => state
                .holders(definition_id, content_hash)
                .min_by_key(|instance| (instance.timestamp, instance.id)),
        };
        Ok(found.cloned())
    }

    async fn list_by_definition_and_content_hash(
        &self,
        definition_id: Uuid,
        content_hash: &str,
    ) -> Result<Vec<AssetInstance>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.holders(definition_id, content_hash).cloned().collect())
    }

    async fn upsert(&self, instance: AssetInstance) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        self.persist(&state, &[&instance]).await?;
        state.put(instance);
        Ok(())
    }

    async fn mark_conflicted(&self, id: Uuid, timestamp: u64) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let mut instance = state
            .instances
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))?;
        instance.conflicted = true;
        instance.timestamp = timestamp;

        self.persist(&state, &[&instance]).await?;
        state.put(instance);
        Ok(())
    }

    async fn insert_pending(
        &self,
        instance: AssetInstance,
        enforce_unique: bool,
    ) -> Result<PendingInsert, RepositoryError> {
        let mut state = self.state.write().await;
        if enforce_unique {
            if let Some(holder) = state.confirmed_holder(&instance) {
                return Ok(PendingInsert::Rejected { holder });
            }
        }

        self.persist(&state, &[&instance]).await?;
        state.put(instance);
        Ok(PendingInsert::Inserted)
    }

    async fn commit_confirmation(
        &self,
        mut instance: AssetInstance,
        enforce_unique: bool,
    ) -> Result<ConfirmationCommit, RepositoryError> {
        let mut state = self.state.write().await;

        if state
            .instances
            .get(&instance.id)
            .map_or(false, |existing| existing.confirmed)
        {
            return Ok(ConfirmationCommit::AlreadyConfirmed);
        }

        let mut losers = Vec::new();
        if enforce_unique {
            if let Some(rival) = state.confirmed_holder(&instance) {
                return Ok(ConfirmationCommit::RivalConfirmed { rival });
            }
            losers = state
                .holders(instance.asset_definition_id, &instance.content_hash)
                .filter(|other| other.id != instance.id && !other.conflicted)
                .cloned()
                .collect::<Vec<_>>();
            for loser in &mut losers {
                loser.conflicted = true;
                loser.timestamp = instance.timestamp;
            }
        }

        instance.confirmed = true;
        instance.conflicted = false;

        let mut changed: Vec<&AssetInstance> = losers.iter().collect();
        changed.push(&instance);
        self.persist(&state, &changed).await?;

        let conflicted = losers.iter().map(|loser| loser.id).collect();
        for loser in losers {
            state.put(loser);
        }
        state.put(instance);

        Ok(ConfirmationCommit::Committed { conflicted })
    }

    async fn list(&self, skip: usize, limit: usize) -> Result<Vec<AssetInstance>, RepositoryError> {
        let state = self.state.read().await;
        let mut instances: Vec<&AssetInstance> = state.instances.values().collect();
        instances.sort_by_key(|instance| (instance.timestamp, instance.id));
        Ok(instances
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }
}
