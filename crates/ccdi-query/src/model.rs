//! Response shapes for listing, lookup and aggregation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ccdi_common::ORGANIZATION;

// ── Identifiers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Namespace {
    pub organization: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityId {
    pub namespace: Namespace,
    pub name: String,
}

impl EntityId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Namespace { organization: ORGANIZATION.to_string(), name: namespace.into() },
            name: name.into(),
        }
    }
}

/// A metadata value that was evaluated and found present. Absent values
/// serialize as `null` at the field level instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueField<T> {
    pub value: T,
}

impl<T> ValueField<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

pub fn present<T>(value: Option<T>) -> Option<ValueField<T>> {
    value.map(ValueField::new)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deposition {
    pub kind: &'static str,
    pub value: String,
}

/// dbGaP depositions for the distinct study ids, sorted.
pub fn depositions(studies: &[String]) -> Option<Vec<ValueField<Deposition>>> {
    let ids = sorted_studies(studies);
    if ids.is_empty() {
        return None;
    }
    Some(
        ids.into_iter()
            .map(|value| ValueField::new(Deposition { kind: "dbGaP", value }))
            .collect(),
    )
}

pub fn sorted_studies(studies: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = studies
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// The study used as an entity's identifier namespace: the alphabetically
/// last one it belongs to.
pub fn primary_namespace(studies: &[String]) -> Option<String> {
    sorted_studies(studies).pop()
}

pub type Unharmonized = BTreeMap<String, ValueField<Value>>;

// ── Subject ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociatedDiagnosis {
    pub value: String,
    pub owned: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectMetadata {
    pub sex: Option<ValueField<String>>,
    pub race: Option<Vec<ValueField<String>>>,
    pub ethnicity: Option<ValueField<String>>,
    pub identifiers: Option<Vec<ValueField<EntityId>>>,
    pub vital_status: Option<ValueField<String>>,
    pub age_at_vital_status: Option<ValueField<i64>>,
    pub associated_diagnoses: Option<Vec<AssociatedDiagnosis>>,
    pub depositions: Option<Vec<ValueField<Deposition>>>,
    pub unharmonized: Option<Unharmonized>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subject {
    pub id: EntityId,
    pub kind: &'static str,
    pub metadata: SubjectMetadata,
    pub gateways: Vec<Value>,
}

// ── Sample ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleIdentifier {
    pub namespace: Namespace,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosisField {
    pub value: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleMetadata {
    pub disease_phase: Option<ValueField<String>>,
    pub anatomical_sites: Option<Vec<ValueField<String>>>,
    pub library_selection_method: Option<ValueField<String>>,
    pub library_strategy: Option<ValueField<String>>,
    pub library_source_material: Option<ValueField<String>>,
    pub preservation_method: Option<ValueField<String>>,
    pub tumor_grade: Option<ValueField<String>>,
    pub specimen_molecular_analyte_type: Option<ValueField<String>>,
    pub tissue_type: Option<ValueField<String>>,
    pub tumor_classification: Option<ValueField<String>>,
    pub age_at_diagnosis: Option<ValueField<i64>>,
    pub age_at_collection: Option<ValueField<i64>>,
    pub tumor_tissue_morphology: Option<ValueField<String>>,
    pub diagnosis: Option<DiagnosisField>,
    pub identifiers: Option<Vec<ValueField<SampleIdentifier>>>,
    pub depositions: Option<Vec<ValueField<Deposition>>>,
    pub unharmonized: Option<Unharmonized>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub id: EntityId,
    pub subject: Option<EntityId>,
    pub metadata: SampleMetadata,
    pub gateways: Vec<Value>,
}

// ── File ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checksums {
    pub md5: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetadata {
    #[serde(rename = "type")]
    pub file_type: Option<ValueField<String>>,
    pub size: Option<ValueField<i64>>,
    pub checksums: Option<ValueField<Checksums>>,
    pub description: Option<ValueField<String>>,
    pub depositions: Option<Vec<ValueField<Deposition>>>,
    pub unharmonized: Option<Unharmonized>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct File {
    pub id: EntityId,
    pub samples: Vec<EntityId>,
    pub metadata: FileMetadata,
    pub gateways: Vec<Value>,
}

// ── Aggregates ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResult {
    pub total: u64,
    pub missing: u64,
    pub values: Vec<ValueCount>,
}

impl CountResult {
    pub fn empty() -> Self {
        Self { total: 0, missing: 0, values: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub counts: SummaryCounts,
}

impl Summary {
    pub fn new(total: u64) -> Self {
        Self { counts: SummaryCounts { total } }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_fields_serialize_as_null() {
        let meta = FileMetadata {
            file_type: Some(ValueField::new("BAM".into())),
            size: None,
            checksums: None,
            description: None,
            depositions: None,
            unharmonized: None,
        };
        let v = serde_json::to_value(&meta).unwrap();
        assert_eq!(v["type"], json!({"value": "BAM"}));
        assert_eq!(v["size"], Value::Null);
        assert!(v.as_object().unwrap().contains_key("checksums"));
    }

    #[test]
    fn test_primary_namespace_is_last_study() {
        let studies = vec!["phs002431".to_string(), "phs000467".to_string(), "phs002431".to_string()];
        assert_eq!(primary_namespace(&studies).as_deref(), Some("phs002431"));
        assert_eq!(primary_namespace(&[]), None);
    }

    #[test]
    fn test_depositions_sorted_and_distinct() {
        let studies = vec!["phs2".to_string(), "phs1".to_string(), "phs2".to_string()];
        let v = serde_json::to_value(depositions(&studies)).unwrap();
        assert_eq!(
            v,
            json!([
                {"value": {"kind": "dbGaP", "value": "phs1"}},
                {"value": {"kind": "dbGaP", "value": "phs2"}}
            ])
        );
    }

    #[test]
    fn test_entity_id_shape() {
        let v = serde_json::to_value(EntityId::new("phs1", "P1")).unwrap();
        assert_eq!(
            v,
            json!({"namespace": {"organization": "CCDI-DCC", "name": "phs1"}, "name": "P1"})
        );
    }
}
