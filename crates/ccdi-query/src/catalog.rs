//! Immutable lookup tables every compiler and mapper reads.
//!
//! Built once at startup and shared behind an `Arc`.

use std::collections::BTreeMap;

use anyhow::Context;
use serde_json::Value;

use ccdi_common::sentinel::clean_text;
use ccdi_common::vocab::UNKNOWN_SEX_CODE;
use ccdi_common::{FieldAllowlist, FileTypes, Settings, ValueMappingRegistry};

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub allowlist: FieldAllowlist,
    pub mappings: ValueMappingRegistry,
    pub file_types: FileTypes,
    /// Stored `sex_at_birth` value → API code.
    pub sex_mappings: BTreeMap<String, String>,
    pub base_url: Option<String>,
}

impl Catalog {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let mappings = ValueMappingRegistry::load(&settings.data.field_mappings)
            .context("loading field mappings")?;
        let file_types =
            FileTypes::load(&settings.data.file_types).context("loading file types")?;
        Ok(Self {
            allowlist: FieldAllowlist::new(settings.allowlist.unharmonized_fields.clone()),
            mappings,
            file_types,
            sex_mappings: settings.sex_value_mappings.clone(),
            base_url: settings.server.base_url.clone(),
        })
    }

    /// Normalize a stored sex value to an API code. Unknown values fall
    /// back to `U`; sentinels are absent.
    pub fn normalize_sex(&self, stored: &Value) -> Option<String> {
        let text = clean_text(stored)?;
        if let Some(code) = self.sex_mappings.get(&text) {
            return Some(code.clone());
        }
        let lower = text.to_lowercase();
        if let Some(code) = self
            .sex_mappings
            .iter()
            .find(|(k, _)| k.to_lowercase() == lower)
            .map(|(_, v)| v)
        {
            return Some(code.clone());
        }
        if self.sex_mappings.values().any(|v| *v == text) {
            return Some(text);
        }
        Some(UNKNOWN_SEX_CODE.to_string())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}
