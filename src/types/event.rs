use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::hex_to_uuid;
use crate::error::AssetError;

/// Confirmation of an asset instance as it arrives from the ledger.
///
/// Identifiers are `0x` hex and the timestamp is a decimal string; convert to
/// [`AssetInstanceCreated`] before use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    #[serde(rename = "assetInstanceID")]
    pub asset_instance_id: String,
    #[serde(rename = "assetDefinitionID")]
    pub asset_definition_id: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_hash: Option<String>,
    pub content_hash: String,
    pub timestamp: String,
}

/// A validated ledger confirmation of an asset instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInstanceCreated {
    pub asset_instance_id: Uuid,
    pub asset_definition_id: Uuid,
    pub author: String,
    pub description_hash: Option<String>,
    pub content_hash: String,
    pub timestamp: u64,
}

impl TryFrom<LedgerEvent> for AssetInstanceCreated {
    type Error = AssetError;

    fn try_from(event: LedgerEvent) -> Result<Self, Self::Error> {
        let asset_instance_id = hex_to_uuid(&event.asset_instance_id)
            .map_err(|e| AssetError::InvalidEvent(e.to_string()))?;
        let asset_definition_id = hex_to_uuid(&event.asset_definition_id)
            .map_err(|e| AssetError::InvalidEvent(e.to_string()))?;
        let timestamp = event.timestamp.trim().parse::<u64>().map_err(|_| {
            AssetError::InvalidEvent(format!("timestamp {:?}", event.timestamp))
        })?;
        if event.content_hash.is_empty() {
            return Err(AssetError::InvalidEvent(format!(
                "empty content hash for {}",
                event.asset_instance_id
            )));
        }

        Ok(Self {
            asset_instance_id,
            asset_definition_id,
            author: event.author,
            description_hash: event.description_hash,
            content_hash: event.content_hash,
            timestamp,
        })
    }
}
