use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Where an instance sits in its confirmation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Written optimistically by its author, not yet seen on the ledger
    Pending,
    /// Reconciled against a ledger confirmation; terminal
    Confirmed,
    /// Lost a unique-content race to another confirmed instance
    Conflicted,
}

/// A concrete occurrence of an asset definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetInstance {
    #[serde(rename = "assetInstanceID")]
    pub id: Uuid,
    pub author: String,
    #[serde(rename = "assetDefinitionID")]
    pub asset_definition_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    pub confirmed: bool,
    #[serde(default)]
    pub conflicted: bool,
    pub timestamp: u64,
}

impl AssetInstance {
    pub fn state(&self) -> InstanceState {
        if self.confirmed {
            InstanceState::Confirmed
        } else if self.conflicted {
            InstanceState::Conflicted
        } else {
            InstanceState::Pending
        }
    }

    /// The uniqueness key for content within a definition.
    pub fn content_key(&self) -> (Uuid, String) {
        (self.asset_definition_id, self.content_hash.clone())
    }
}
