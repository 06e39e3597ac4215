//! Permitted filter and count fields per entity.
//!
//! Harmonized fields are fixed per entity. Unharmonized fields live under the
//! `metadata.unharmonized.` prefix and are checked against a configured key
//! set, which also guards property names that end up inside Cypher text.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::entity::EntityType;
use crate::error::{FederationError, FieldUse, Result};

pub const UNHARMONIZED_PREFIX: &str = "metadata.unharmonized.";
const SHORT_UNHARMONIZED_PREFIX: &str = "unharmonized.";

/// Keys that are always reserved and allowed as filters.
pub const RESERVED_FILTER_FIELDS: [&str; 3] = ["identifiers", "depositions", "search"];

pub const COMMON_UNHARMONIZED_FIELDS: [&str; 13] = [
    "study_id",
    "patient_id",
    "sample_id",
    "batch",
    "cohort",
    "platform",
    "instrument",
    "library_prep",
    "sequencing_center",
    "data_type",
    "experimental_strategy",
    "workflow_type",
    "file_name",
];

const SUBJECT_FILTER_FIELDS: &[&str] = &[
    "sex",
    "race",
    "ethnicity",
    "identifiers",
    "vital_status",
    "age_at_vital_status",
    "depositions",
];

const SUBJECT_COUNT_FIELDS: &[&str] = &[
    "sex",
    "race",
    "ethnicity",
    "vital_status",
    "age_at_vital_status",
    "associated_diagnoses",
];

const SAMPLE_FILTER_FIELDS: &[&str] = &[
    "disease_phase",
    "anatomical_sites",
    "library_selection_method",
    "library_strategy",
    "library_source_material",
    "preservation_method",
    "tumor_grade",
    "specimen_molecular_analyte_type",
    "tissue_type",
    "tumor_classification",
    "age_at_diagnosis",
    "age_at_collection",
    "tumor_tissue_morphology",
    "depositions",
    "diagnosis",
];

const SAMPLE_COUNT_FIELDS: &[&str] = &[
    "disease_phase",
    "anatomical_sites",
    "library_selection_method",
    "library_strategy",
    "library_source_material",
    "preservation_method",
    "tumor_grade",
    "specimen_molecular_analyte_type",
    "tissue_type",
    "tumor_classification",
    "age_at_diagnosis",
    "age_at_collection",
    "tumor_tissue_morphology",
    "diagnosis",
];

const FILE_FILTER_FIELDS: &[&str] = &["type", "size", "checksums", "description", "depositions"];

const FILE_COUNT_FIELDS: &[&str] = &["type", "depositions"];

fn property_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// A field name after prefix handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef<'a> {
    Harmonized(&'a str),
    Unharmonized(&'a str),
}

/// Split off the unharmonized prefix, if any.
pub fn parse_field(field: &str) -> FieldRef<'_> {
    if let Some(key) = field.strip_prefix(UNHARMONIZED_PREFIX) {
        FieldRef::Unharmonized(key)
    } else if let Some(key) = field.strip_prefix(SHORT_UNHARMONIZED_PREFIX) {
        FieldRef::Unharmonized(key)
    } else {
        FieldRef::Harmonized(field)
    }
}

#[derive(Debug, Clone)]
pub struct FieldAllowlist {
    unharmonized: BTreeMap<EntityType, BTreeSet<String>>,
}

impl Default for FieldAllowlist {
    fn default() -> Self {
        Self::new(COMMON_UNHARMONIZED_FIELDS.iter().map(|s| s.to_string()))
    }
}

impl FieldAllowlist {
    /// Build an allowlist that accepts the given unharmonized keys on every
    /// entity. Keys that are not plain property names are dropped.
    pub fn new(unharmonized: impl IntoIterator<Item = String>) -> Self {
        let keys: BTreeSet<String> = unharmonized
            .into_iter()
            .filter(|k| {
                let ok = property_name_regex().is_match(k);
                if !ok {
                    tracing::warn!(key = %k, "ignoring unharmonized key that is not a property name");
                }
                ok
            })
            .collect();
        let unharmonized = EntityType::ALL
            .into_iter()
            .map(|e| (e, keys.clone()))
            .collect();
        Self { unharmonized }
    }

    pub fn add_unharmonized_field(&mut self, entity: EntityType, key: &str) {
        if property_name_regex().is_match(key) {
            self.unharmonized.entry(entity).or_default().insert(key.to_string());
        }
    }

    pub fn harmonized_filter_fields(entity: EntityType) -> &'static [&'static str] {
        match entity {
            EntityType::Subject => SUBJECT_FILTER_FIELDS,
            EntityType::Sample => SAMPLE_FILTER_FIELDS,
            EntityType::File => FILE_FILTER_FIELDS,
        }
    }

    pub fn count_fields(entity: EntityType) -> &'static [&'static str] {
        match entity {
            EntityType::Subject => SUBJECT_COUNT_FIELDS,
            EntityType::Sample => SAMPLE_COUNT_FIELDS,
            EntityType::File => FILE_COUNT_FIELDS,
        }
    }

    pub fn is_unharmonized_field_allowed(&self, entity: EntityType, key: &str) -> bool {
        self.unharmonized
            .get(&entity)
            .is_some_and(|keys| keys.contains(key))
    }

    pub fn unharmonized_fields(&self, entity: EntityType) -> Vec<&str> {
        self.unharmonized
            .get(&entity)
            .map(|keys| keys.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// True when `field` may be used as a filter on `entity`.
    pub fn is_field_allowed(&self, entity: EntityType, field: &str) -> bool {
        match parse_field(field) {
            FieldRef::Unharmonized(key) => self.is_unharmonized_field_allowed(entity, key),
            FieldRef::Harmonized(name) => {
                RESERVED_FILTER_FIELDS.contains(&name)
                    || Self::harmonized_filter_fields(entity).contains(&name)
            }
        }
    }

    pub fn is_count_field_allowed(&self, entity: EntityType, field: &str) -> bool {
        match parse_field(field) {
            FieldRef::Unharmonized(key) => self.is_unharmonized_field_allowed(entity, key),
            FieldRef::Harmonized(name) => Self::count_fields(entity).contains(&name),
        }
    }

    pub fn validate_filter_field(&self, entity: EntityType, field: &str) -> Result<()> {
        if self.is_field_allowed(entity, field) {
            Ok(())
        } else {
            Err(FederationError::UnsupportedField {
                entity,
                field: field.to_string(),
                usage: FieldUse::Filter,
            })
        }
    }

    pub fn validate_count_field(&self, entity: EntityType, field: &str) -> Result<()> {
        if self.is_count_field_allowed(entity, field) {
            Ok(())
        } else {
            Err(FederationError::UnsupportedField {
                entity,
                field: field.to_string(),
                usage: FieldUse::Count,
            })
        }
    }
}
