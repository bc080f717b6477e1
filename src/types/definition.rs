use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The template an asset instance is created against.
///
/// Definitions are owned outside this crate; the instance core only reads
/// them. A definition with a content schema is *structured*: its instances
/// carry JSON content. Without one, instances carry an opaque file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetDefinition {
    #[serde(rename = "assetDefinitionID")]
    pub id: Uuid,
    pub name: String,
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_schema: Option<Value>,
    #[serde(default)]
    pub is_content_private: bool,
    #[serde(default)]
    pub is_content_unique: bool,
}

impl AssetDefinition {
    /// An unconfirmed, unstructured, public definition with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            confirmed: false,
            description_schema: None,
            content_schema: None,
            is_content_private: false,
            is_content_unique: false,
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }

    pub fn with_description_schema(mut self, schema: Value) -> Self {
        self.description_schema = Some(schema);
        self
    }

    pub fn with_content_schema(mut self, schema: Value) -> Self {
        self.content_schema = Some(schema);
        self
    }

    pub fn private_content(mut self) -> Self {
        self.is_content_private = true;
        self
    }

    pub fn unique_content(mut self) -> Self {
        self.is_content_unique = true;
        self
    }

    pub fn is_structured(&self) -> bool {
        self.content_schema.is_some()
    }
}
