//! Payload validation against asset definition schemas
//!
//! Definitions carry JSON-Schema documents for their descriptions and
//! structured content. The validator is a stateless dependency handed to the
//! instance service.

use std::fmt;

use jsonschema::JSONSchema;
use serde_json::Value;

/// A single validation failure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON pointer to the offending value, empty for the root
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Trait for schema validators
pub trait SchemaValidator: Send + Sync {
    /// Every way `value` fails to conform to `schema`. Empty when valid.
    fn validate(&self, schema: &Value, value: &Value) -> Vec<ValidationIssue>;

    fn is_valid(&self, schema: &Value, value: &Value) -> bool {
        self.validate(schema, value).is_empty()
    }
}

/// Draft 7 JSON-Schema validation. A schema that does not itself compile is
/// reported as a single root issue.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, schema: &Value, value: &Value) -> Vec<ValidationIssue> {
        let compiled = match JSONSchema::compile(schema) {
            Ok(compiled) => compiled,
            Err(e) => return vec![ValidationIssue::new("", format!("invalid schema: {}", e))],
        };

        let issues = match compiled.validate(value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| ValidationIssue::new(&error.instance_path.to_string(), error.to_string()))
                .collect(),
        };
        issues
    }
}
