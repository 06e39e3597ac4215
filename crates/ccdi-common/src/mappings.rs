//! Bidirectional value mapping between stored graph values and API values.
//!
//! The document is grouped by node type, then by API field name:
//!
//! ```json
//! { "diagnosis": { "disease_phase": {
//!     "mappings": { "Recurrent Disease": "Relapse" },
//!     "null_mappings": ["Not Reported"],
//!     "reverse_mappings": { "Relapse": ["Recurrent Disease", "Relapse"] } } } }
//! ```
//!
//! A reverse entry may be a string, a list, or `null`. `null` means the API
//! value stands for "no stored value"; filters on it match absent nodes and
//! the field's null-mapped values.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::sentinel;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(v) => vec![v.clone()],
            OneOrMany::Many(vs) => vs.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldMapping {
    #[serde(default)]
    pub mappings: BTreeMap<String, String>,

    #[serde(default)]
    pub null_mappings: Vec<String>,

    #[serde(default)]
    pub reverse_mappings: BTreeMap<String, Option<OneOrMany>>,

    /// Also match the API value itself as a stored value when filtering.
    #[serde(default)]
    pub match_api_value: bool,

    #[serde(skip)]
    pub node_type: String,
}

/// Stored-space form of an API filter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReverseMapped {
    /// Match any of these stored values.
    Values(Vec<String>),
    /// Match a missing node, a null property, or a null-mapped value.
    Absent,
}

#[derive(Debug, Clone, Default)]
pub struct ValueMappingRegistry {
    fields: HashMap<String, FieldMapping>,
}

impl ValueMappingRegistry {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let doc: BTreeMap<String, BTreeMap<String, FieldMapping>> =
            serde_json::from_str(json).context("invalid field mapping document")?;
        let mut fields = HashMap::new();
        for (node_type, node_fields) in doc {
            for (field, mut mapping) in node_fields {
                mapping.node_type = node_type.clone();
                if fields.insert(field.clone(), mapping).is_some() {
                    anyhow::bail!("field '{field}' is mapped under more than one node type");
                }
            }
        }
        tracing::debug!(fields = fields.len(), "loaded value mappings");
        Ok(Self { fields })
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&content)
    }

    pub fn field(&self, field: &str) -> Option<&FieldMapping> {
        self.fields.get(field)
    }

    /// Stored value → API value. `None` for blanks and null-mapped values;
    /// unmapped values pass through trimmed.
    pub fn map_value(&self, field: &str, stored: &str) -> Option<String> {
        let value = stored.trim();
        if value.is_empty() {
            return None;
        }
        let Some(mapping) = self.fields.get(field) else {
            return Some(value.to_string());
        };
        if mapping.null_mappings.iter().any(|n| n == value) {
            return None;
        }
        Some(
            mapping
                .mappings
                .get(value)
                .cloned()
                .unwrap_or_else(|| value.to_string()),
        )
    }

    /// Map a raw graph value, treating sentinels as absent.
    pub fn map_json(&self, field: &str, stored: &Value) -> Option<String> {
        sentinel::clean_text(stored).and_then(|s| self.map_value(field, &s))
    }

    /// API value → stored value(s). Unmapped values pass through.
    pub fn reverse_map(&self, field: &str, api_value: &str) -> ReverseMapped {
        let value = api_value.trim();
        let Some(mapping) = self.fields.get(field) else {
            return ReverseMapped::Values(vec![value.to_string()]);
        };
        match mapping.reverse_mappings.get(value) {
            Some(None) => ReverseMapped::Absent,
            Some(Some(stored)) => {
                let mut values = stored.to_vec();
                if mapping.match_api_value && !values.iter().any(|v| v == value) {
                    values.push(value.to_string());
                }
                ReverseMapped::Values(values)
            }
            None => ReverseMapped::Values(vec![value.to_string()]),
        }
    }

    pub fn null_mappings(&self, field: &str) -> &[String] {
        self.fields
            .get(field)
            .map(|m| m.null_mappings.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_null_mapped(&self, field: &str, value: &str) -> bool {
        self.null_mappings(field).iter().any(|n| n == value.trim())
    }

    /// A stored value with a forward mapping but no reverse entry: it shows
    /// up in data yet is not an acceptable filter value.
    pub fn is_database_only(&self, field: &str, value: &str) -> bool {
        let value = value.trim();
        self.fields.get(field).is_some_and(|m| {
            m.mappings.contains_key(value) && !m.reverse_mappings.contains_key(value)
        })
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
