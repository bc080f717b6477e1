use serde_json::Value;
use uuid::Uuid;

use super::{now_timestamp, stored_digest, AssetInstanceService};
use crate::content::{exchange_path, json_digest, uuid_to_hex};
use crate::error::AssetError;
use crate::repository::PendingInsert;
use crate::storage::{collect_stream, ContentStream, StorageError};
use crate::types::{AssetDefinition, AssetInstance};

impl AssetInstanceService {
    /// Create an instance whose content is a JSON value checked against the
    /// definition's content schema. Returns the new instance id.
    pub async fn create_structured(
        &self,
        author: &str,
        asset_definition_id: Uuid,
        description: Option<Value>,
        content: Value,
        sync: bool,
    ) -> Result<Uuid, AssetError> {
        let definition = self.creatable_definition(asset_definition_id).await?;
        let content_schema = definition.content_schema.as_ref().ok_or_else(|| {
            AssetError::InvalidRequest(
                "Unstructured asset instances must be created using multipart/form-data".into(),
            )
        })?;

        // Validate everything before the first external write
        let description = self.checked_description(&definition, description)?;
        self.validate(content_schema, &content, "Content")?;

        let description_hash = match &description {
            Some(description) => Some(self.store_json(description).await?),
            None => None,
        };

        let (content_hash, content) = if definition.is_content_private {
            (json_digest(&content)?, None)
        } else {
            (self.store_json(&content).await?, Some(content))
        };

        let instance = AssetInstance {
            id: Uuid::new_v4(),
            author: author.to_string(),
            asset_definition_id,
            description_hash,
            description,
            content_hash,
            content,
            confirmed: false,
            conflicted: false,
            timestamp: now_timestamp(),
        };
        self.record_and_submit(&definition, instance, sync).await
    }

    /// Create an instance whose content is an opaque file. Private files go
    /// through the document exchange, public ones to the content store.
    pub async fn create_unstructured(
        &self,
        author: &str,
        asset_definition_id: Uuid,
        description: Option<Value>,
        content: ContentStream,
        file_name: &str,
        sync: bool,
    ) -> Result<Uuid, AssetError> {
        let instance_id = Uuid::new_v4();
        let definition = self.creatable_definition(asset_definition_id).await?;
        if definition.is_structured() {
            return Err(AssetError::InvalidState(
                "Structured asset instances must be created using JSON".into(),
            ));
        }
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name == ".." {
            return Err(AssetError::Validation(format!("Invalid file name {:?}", file_name)));
        }

        let description = self.checked_description(&definition, description)?;
        let description_hash = match &description {
            Some(description) => Some(self.store_json(description).await?),
            None => None,
        };

        let content_hash = if definition.is_content_private {
            let path = exchange_path(&definition.name, instance_id, file_name);
            self.exchange.put_stream(content, &path).await?
        } else {
            let data = collect_stream(content).await.map_err(StorageError::from)?;
            let address = self.public_store.put(data).await?;
            stored_digest(&address)?
        };

        let instance = AssetInstance {
            id: instance_id,
            author: author.to_string(),
            asset_definition_id,
            description_hash,
            description,
            content_hash,
            content: None,
            confirmed: false,
            conflicted: false,
            timestamp: now_timestamp(),
        };
        self.record_and_submit(&definition, instance, sync).await
    }

    async fn creatable_definition(&self, id: Uuid) -> Result<AssetDefinition, AssetError> {
        let definition = self
            .definition(id)
            .await?
            .ok_or_else(|| AssetError::NotFound(format!("Unknown asset definition {}", id)))?;
        if !definition.confirmed {
            return Err(AssetError::InvalidState(
                "Asset definition must be confirmed".into(),
            ));
        }
        Ok(definition)
    }

    fn checked_description(
        &self,
        definition: &AssetDefinition,
        description: Option<Value>,
    ) -> Result<Option<Value>, AssetError> {
        match &definition.description_schema {
            Some(schema) => {
                let description = description.ok_or_else(|| {
                    AssetError::Validation("Missing asset description".into())
                })?;
                self.validate(schema, &description, "Description")?;
                Ok(Some(description))
            }
            None => {
                if description.is_some() {
                    log::debug!(
                        "Ignoring description for {}: definition declares no description schema",
                        definition.id
                    );
                }
                Ok(None)
            }
        }
    }

    /// Write the optimistic record, then submit it to the ledger.
    async fn record_and_submit(
        &self,
        definition: &AssetDefinition,
        instance: AssetInstance,
        sync: bool,
    ) -> Result<Uuid, AssetError> {
        let id = instance.id;
        let author = instance.author.clone();
        let content_hash = instance.content_hash.clone();
        let description_hash = instance.description_hash.clone();

        match self
            .repository
            .insert_pending(instance, definition.is_content_unique)
            .await?
        {
            PendingInsert::Inserted => {
                log::debug!("Recorded pending asset instance {}", id);
            }
            PendingInsert::Rejected { holder } => {
                return Err(AssetError::Conflict(format!(
                    "{} is already held by confirmed instance {}",
                    content_hash, holder
                )));
            }
        }

        let id_hex = uuid_to_hex(id);
        match &description_hash {
            Some(description_hash) => {
                self.ledger
                    .submit_create_with_description(
                        &id_hex,
                        definition.id,
                        &author,
                        description_hash,
                        &content_hash,
                        sync,
                    )
                    .await?
            }
            None => {
                self.ledger
                    .submit_create(&id_hex, definition.id, &author, &content_hash, sync)
                    .await?
            }
        }

        log::info!(
            "Submitted asset instance {} of {} ({})",
            id,
            definition.name,
            content_hash
        );
        Ok(id)
    }
}
