//! Derived fields: vital status, race/ethnicity, resolved diagnoses.
//!
//! Each derivation exists twice: in Rust for building responses and
//! counting, and as a Cypher expression for filtering. The two must agree,
//! so they live side by side.

use serde_json::Value;

use ccdi_common::sentinel::{clean_int, clean_text, split_tokens};
use ccdi_common::vocab::{Ethnicity, DEAD, HISPANIC_OR_LATINO, NOT_REPORTED};

use crate::cypher::{integer_text, not_sentinel_text, token_list};

pub const SURVIVAL_STATUS: &str = "last_known_survival_status";
pub const SURVIVAL_AGE: &str = "age_at_last_known_survival_status";
const SEE_COMMENT: &str = "see diagnosis_comment";

// ── Vital status ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurvivalRecord {
    pub status: Option<String>,
    pub age: Option<i64>,
}

impl SurvivalRecord {
    pub fn new(status: Option<&str>, age: Option<i64>) -> Self {
        Self { status: status.map(str::to_string), age }
    }

    /// Read a survival node's property map.
    pub fn from_properties(props: &Value) -> Self {
        Self {
            status: props.get(SURVIVAL_STATUS).and_then(clean_text),
            age: props.get(SURVIVAL_AGE).and_then(clean_int),
        }
    }

    fn valid_age(&self) -> Option<i64> {
        self.age.filter(|a| *a >= 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VitalStatusOutcome {
    pub status: Option<String>,
    pub age: Option<i64>,
}

/// Reduce a participant's survival records to one status and age.
///
/// `Dead` wins outright, aged by the oldest valid `Dead` record. Otherwise
/// the record with the greatest valid age decides; equal ages resolve to
/// the lexicographically smallest status. With no valid ages the smallest
/// status is reported without an age. Records without a status are ignored.
pub fn derive_vital_status(records: &[SurvivalRecord]) -> VitalStatusOutcome {
    let survs: Vec<&SurvivalRecord> = records.iter().filter(|r| r.status.is_some()).collect();
    if survs.is_empty() {
        return VitalStatusOutcome::default();
    }

    let is_dead = |r: &SurvivalRecord| r.status.as_deref() == Some(DEAD);
    if survs.iter().any(|r| is_dead(r)) {
        let age = survs.iter().filter(|r| is_dead(r)).filter_map(|r| r.valid_age()).max();
        return VitalStatusOutcome { status: Some(DEAD.to_string()), age };
    }

    let max_age = survs.iter().filter_map(|r| r.valid_age()).max();
    let status = survs
        .iter()
        .filter(|r| max_age.is_none() || r.valid_age() == max_age)
        .filter_map(|r| r.status.clone())
        .min();
    VitalStatusOutcome { status, age: max_age }
}

/// Cypher `WITH` items computing `vital_status` and `age_at_vital_status`
/// from a collected `survivals` list, matching [`derive_vital_status`].
/// `carry` names the variables that must survive the stage.
///
/// The first stage cleans each record the way [`SurvivalRecord::from_properties`]
/// does: sentinel statuses are dropped, statuses are trimmed and ages may be
/// quoted integers.
pub fn vital_status_stages(carry: &[&str]) -> Vec<Vec<String>> {
    let carried = |extra: &[&str]| -> Vec<String> {
        carry.iter().chain(extra.iter()).map(|s| s.to_string()).collect()
    };
    let status = format!("trim(toString(s.{SURVIVAL_STATUS}))");
    let age = integer_text(&format!("s.{SURVIVAL_AGE}"));
    let valid = "s.age IS NOT NULL AND s.age >= 0";

    let mut first = carried(&[]);
    first.push(format!(
        "[s IN survivals WHERE s.{SURVIVAL_STATUS} IS NOT NULL AND {} | {{status: {status}, age: {age}}}] AS survs",
        not_sentinel_text(&format!("toString(s.{SURVIVAL_STATUS})"))
    ));

    let mut second = carried(&["survs"]);
    second.push(format!("ANY(s IN survs WHERE s.status = '{DEAD}') AS has_dead"));
    second.push(format!(
        "reduce(m = null, s IN survs | CASE WHEN s.status = '{DEAD}' AND {valid} \
         AND (m IS NULL OR s.age > m) THEN s.age ELSE m END) AS dead_age"
    ));
    second.push(format!(
        "reduce(m = null, s IN survs | CASE WHEN {valid} AND (m IS NULL OR s.age > m) \
         THEN s.age ELSE m END) AS max_age"
    ));

    let mut third = carried(&[]);
    third.push(format!(
        "CASE WHEN has_dead THEN '{DEAD}' ELSE reduce(b = null, s IN survs | \
         CASE WHEN (max_age IS NULL OR s.age = max_age) AND (b IS NULL OR s.status < b) \
         THEN s.status ELSE b END) END AS vital_status"
    ));
    third.push("CASE WHEN has_dead THEN dead_age ELSE max_age END AS age_at_vital_status".to_string());

    vec![first, second, third]
}

// ── Race and ethnicity ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaceProfile {
    /// `None` when the participant has no race recorded at all.
    pub displayed: Option<Vec<String>>,
    pub ethnicity: Option<Ethnicity>,
}

/// Split the stored race value and derive the displayed race list and
/// ethnicity from it.
pub fn race_profile(raw: &Value) -> RaceProfile {
    let tokens = split_tokens(raw);
    if tokens.is_empty() {
        return RaceProfile::default();
    }
    let hispanic = tokens.iter().any(|t| t == HISPANIC_OR_LATINO);
    let mut shown: Vec<String> = Vec::new();
    for t in tokens.into_iter().filter(|t| t != HISPANIC_OR_LATINO) {
        if !shown.contains(&t) {
            shown.push(t);
        }
    }
    if shown.is_empty() {
        shown.push(NOT_REPORTED.to_string());
    }
    RaceProfile {
        displayed: Some(shown),
        ethnicity: Some(if hispanic { Ethnicity::HispanicOrLatino } else { Ethnicity::NotReported }),
    }
}

/// Cypher list of the stored race tokens on `var`.
pub fn race_tokens_expr(var: &str) -> String {
    token_list(&format!("{var}.race"))
}

/// Cypher list of the displayed race values on `var`.
pub fn displayed_race_expr(var: &str) -> String {
    let tokens = race_tokens_expr(var);
    format!(
        "CASE WHEN size({tokens}) > 0 AND size([t IN {tokens} WHERE t <> '{HISPANIC_OR_LATINO}']) = 0 \
         THEN ['{NOT_REPORTED}'] ELSE [t IN {tokens} WHERE t <> '{HISPANIC_OR_LATINO}'] END"
    )
}

/// Cypher boolean: the participant derives to the given ethnicity.
pub fn ethnicity_condition(var: &str, ethnicity: Ethnicity) -> String {
    let tokens = race_tokens_expr(var);
    match ethnicity {
        Ethnicity::HispanicOrLatino => format!("'{HISPANIC_OR_LATINO}' IN {tokens}"),
        Ethnicity::NotReported => {
            format!("size({tokens}) > 0 AND NOT '{HISPANIC_OR_LATINO}' IN {tokens}")
        }
    }
}

// ── Diagnoses ────────────────────────────────────────────────────────────────

/// The reportable diagnosis text. A "see diagnosis_comment" placeholder is
/// replaced by the trimmed comment, or dropped when there is none.
pub fn resolve_diagnosis(diagnosis: &Value, comment: &Value) -> Option<String> {
    let text = clean_text(diagnosis)?;
    if text.eq_ignore_ascii_case(SEE_COMMENT) {
        clean_text(comment)
    } else {
        Some(text)
    }
}

/// Resolve a diagnosis node's property map.
pub fn resolve_diagnosis_node(props: &Value) -> Option<String> {
    resolve_diagnosis(
        props.get("diagnosis").unwrap_or(&Value::Null),
        props.get("diagnosis_comment").unwrap_or(&Value::Null),
    )
}

/// Cypher boolean: the diagnosis node bound to `var` resolves to one of the
/// values in `param`.
pub fn diagnosis_in_condition(var: &str, param: &str) -> String {
    format!(
        "({var}.diagnosis IN {param} OR (toLower(trim(toString({var}.diagnosis))) = '{SEE_COMMENT}' \
         AND {var}.diagnosis_comment IS NOT NULL AND trim(toString({var}.diagnosis_comment)) IN {param}))"
    )
}

/// Cypher boolean: the resolved diagnosis on `var` contains the term.
pub fn diagnosis_contains_condition(var: &str, param: &str) -> String {
    format!(
        "(toLower(toString({var}.diagnosis)) CONTAINS toLower({param}) OR \
         (toLower(trim(toString({var}.diagnosis))) = '{SEE_COMMENT}' AND \
         toLower(toString({var}.diagnosis_comment)) CONTAINS toLower({param})))"
    )
}
