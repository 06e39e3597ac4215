//! Subject (participant) schema: filters, record mapping and counting.

use ccdi_common::vocab::{sex_code_to_stored, Race};
use ccdi_common::{EntityType, Ethnicity, FederationError, Result, VitalStatus};

use crate::aggregate::Emission;
use crate::catalog::Catalog;
use crate::cypher::{ParamBag, Predicate};
use crate::derive::{
    derive_vital_status, diagnosis_contains_condition, displayed_race_expr, ethnicity_condition,
    race_profile, resolve_diagnosis_node, vital_status_stages, SurvivalRecord,
    VitalStatusOutcome,
};
use crate::filters::FilterSet;
use crate::model::{
    depositions, present, primary_namespace, AssociatedDiagnosis, EntityId, Subject,
    SubjectMetadata, ValueField,
};
use crate::schema::{
    compile_shared, distinct, integer_values, unharmonized, unharmonized_count_value,
    unsupported, CompiledFilters, EntitySchema, Relation, RowView,
};

/// Upper bound for `age_at_vital_status`, in days.
pub const MAX_AGE_DAYS: i64 = 73_000;

const SURVIVAL: Relation = Relation {
    key: "survival",
    pattern: Some("(s:survival)-[:of_survival]->(p)"),
    item: "collect(DISTINCT s) AS survivals",
    alias: "survivals",
    material: "[x IN survivals | properties(x)] AS survival_props",
};

const DIAGNOSIS: Relation = Relation {
    key: "diagnosis",
    pattern: Some("(d:diagnosis)-[:of_diagnosis]->(p)"),
    item: "collect(DISTINCT d) AS diagnoses",
    alias: "diagnoses",
    material: "[x IN diagnoses | properties(x)] AS diagnosis_props",
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectSchema;

impl SubjectSchema {
    fn vital_status(row: &RowView<'_>) -> VitalStatusOutcome {
        let records: Vec<SurvivalRecord> = row
            .list("survival_props")
            .iter()
            .map(SurvivalRecord::from_properties)
            .collect();
        derive_vital_status(&records)
    }

    fn diagnoses(row: &RowView<'_>) -> Vec<String> {
        distinct(row.list("diagnosis_props").iter().filter_map(resolve_diagnosis_node).collect())
    }

    /// Stored `sex_at_birth` values that normalize to an API code.
    fn stored_sex_values(catalog: &Catalog, code: &str) -> Result<Vec<String>> {
        let canonical = sex_code_to_stored(code).ok_or_else(|| {
            FederationError::invalid_parameter("sex", format!("'{code}' is not one of M, F, U"))
        })?;
        let mut stored = vec![canonical.to_string()];
        for (value, mapped) in &catalog.sex_mappings {
            if mapped == code && !stored.contains(value) {
                stored.push(value.clone());
            }
        }
        Ok(stored)
    }
}

impl EntitySchema for SubjectSchema {
    type Record = Subject;

    const ENTITY: EntityType = EntityType::Subject;
    const VAR: &'static str = "p";
    const PRIMARY_PATTERN: &'static str = "(p:participant)";
    const ID: &'static str = "p.participant_id";
    const STUDY_PATTERNS: &'static [&'static str] =
        &["(p)-[:of_participant]->(c:consent_group)-[:of_consent_group]->(st:study)"];
    const STUDIES_ITEM: &'static str = "collect(DISTINCT st.study_id) AS studies";
    const RELATIONS: &'static [Relation] = &[SURVIVAL, DIAGNOSIS];

    fn compile(
        &self,
        catalog: &Catalog,
        filters: &FilterSet,
        params: &mut ParamBag,
    ) -> Result<CompiledFilters> {
        let mut out = CompiledFilters::default();
        for (field, value) in filters.fields() {
            let values = value.values();
            if compile_shared::<Self>(field, &values, params, &mut out) {
                continue;
            }
            match field {
                "sex" => {
                    let mut stored = Vec::new();
                    for code in &values {
                        stored.extend(Self::stored_sex_values(catalog, code)?);
                    }
                    let p = params.bind(stored);
                    out.primary.push(Predicate::is_in("p.sex_at_birth", p));
                }
                "race" => {
                    let races: Vec<String> = values
                        .iter()
                        .filter(|v| Race::parse(v).is_some())
                        .cloned()
                        .collect();
                    if races.is_empty() {
                        return Err(FederationError::invalid_parameter(
                            "race",
                            format!("none of {values:?} is a race value"),
                        ));
                    }
                    let p = params.bind(races);
                    out.primary.push(Predicate::AnyIn { list_expr: displayed_race_expr("p"), param: p });
                }
                "ethnicity" => {
                    let mut parts = Vec::new();
                    for v in &values {
                        let ethnicity = Ethnicity::parse(v).ok_or_else(|| {
                            FederationError::invalid_parameter(
                                "ethnicity",
                                format!("'{v}' is not an ethnicity value"),
                            )
                        })?;
                        parts.push(Predicate::expr(ethnicity_condition("p", ethnicity)));
                    }
                    out.primary.push(Predicate::or(parts));
                }
                "vital_status" => {
                    for v in &values {
                        if VitalStatus::parse(v).is_none() {
                            return Err(FederationError::invalid_parameter(
                                "vital_status",
                                format!("'{v}' is not a vital status"),
                            ));
                        }
                    }
                    out.need(SURVIVAL.key);
                    let p = params.bind(values.clone());
                    out.derived.push(Predicate::is_in("vital_status", p));
                }
                "age_at_vital_status" => {
                    let ages = integer_values(field, &values)?;
                    if let Some(bad) = ages.iter().find(|a| !(0..=MAX_AGE_DAYS).contains(*a)) {
                        return Err(FederationError::invalid_parameter(
                            field,
                            format!("{bad} is outside 0..={MAX_AGE_DAYS}"),
                        ));
                    }
                    out.need(SURVIVAL.key);
                    let p = params.bind(ages);
                    out.derived.push(Predicate::is_in("age_at_vital_status", p));
                }
                other => return Err(unsupported(Self::ENTITY, other)),
            }
        }

        if let Some(term) = filters.search() {
            out.need(DIAGNOSIS.key);
            let t = params.bind(term);
            out.related.push(Predicate::or(vec![
                Predicate::expr(format!(
                    "ANY(x IN diagnoses WHERE {})",
                    diagnosis_contains_condition("x", &t)
                )),
                Predicate::expr(format!(
                    "ANY(k IN keys(p) WHERE toLower(k) CONTAINS 'diagnos' \
                     AND toLower(toString(p[k])) CONTAINS toLower({t}))"
                )),
            ]));
        }
        Ok(out)
    }

    fn count_filters(&self, field: &str, filters: &FilterSet) -> FilterSet {
        match field {
            "race" | "ethnicity" => filters.without(field),
            "associated_diagnoses" => filters.without(field).without_search(),
            _ => filters.clone(),
        }
    }

    fn field_relations(&self, field: &str) -> &'static [&'static str] {
        match field {
            "vital_status" | "age_at_vital_status" => &["survival"],
            "associated_diagnoses" => &["diagnosis"],
            _ => &[],
        }
    }

    fn derived_stages(&self, carry: &[&str]) -> Vec<Vec<String>> {
        vital_status_stages(carry)
    }

    fn to_record(
        &self,
        catalog: &Catalog,
        row: &RowView<'_>,
        namespace: Option<&str>,
    ) -> Result<Subject> {
        let name = row
            .id()
            .ok_or_else(|| FederationError::Database("participant row without an id".into()))?;
        let studies = row.studies();
        let namespace = namespace
            .map(str::to_string)
            .or_else(|| primary_namespace(&studies))
            .ok_or_else(|| FederationError::Database(format!("participant {name} has no study")))?;

        let profile = race_profile(row.prop("race"));
        let vital = Self::vital_status(row);
        let diagnoses = Self::diagnoses(row);
        let id = EntityId::new(&namespace, &name);

        let metadata = SubjectMetadata {
            sex: present(catalog.normalize_sex(row.prop("sex_at_birth"))),
            race: profile
                .displayed
                .map(|races| races.into_iter().map(ValueField::new).collect()),
            ethnicity: present(profile.ethnicity.map(|e| e.as_str().to_string())),
            identifiers: Some(vec![ValueField::new(id.clone())]),
            vital_status: present(vital.status),
            age_at_vital_status: present(vital.age),
            associated_diagnoses: (!diagnoses.is_empty()).then(|| {
                diagnoses
                    .into_iter()
                    .map(|value| AssociatedDiagnosis { value, owned: true, comment: None })
                    .collect()
            }),
            depositions: depositions(&studies),
            unharmonized: unharmonized(catalog, Self::ENTITY, row.get("props")),
        };
        Ok(Subject { id, kind: "Participant", metadata, gateways: Vec::new() })
    }

    fn count_values(&self, catalog: &Catalog, field: &str, row: &RowView<'_>) -> Vec<String> {
        if let Some(values) = unharmonized_count_value(row, field) {
            return values;
        }
        match field {
            "sex" => catalog.normalize_sex(row.prop("sex_at_birth")).into_iter().collect(),
            "race" => race_profile(row.prop("race")).displayed.unwrap_or_default(),
            "ethnicity" => race_profile(row.prop("race"))
                .ethnicity
                .map(|e| e.as_str().to_string())
                .into_iter()
                .collect(),
            "vital_status" => Self::vital_status(row).status.into_iter().collect(),
            "age_at_vital_status" => {
                Self::vital_status(row).age.map(|a| a.to_string()).into_iter().collect()
            }
            "associated_diagnoses" => Self::diagnoses(row),
            _ => Vec::new(),
        }
    }

    fn emission(&self, field: &str) -> Emission {
        match field {
            "race" => Emission::enumerated(Race::values()),
            "ethnicity" => Emission::alphabetical(Ethnicity::values()),
            _ => Emission::Observed,
        }
    }

    fn single_valued(&self, field: &str) -> bool {
        matches!(field, "sex" | "ethnicity" | "vital_status" | "age_at_vital_status")
    }
}
