//! Compiled query text for the three entities.

use ccdi_common::{EntityType, FederationError, FileTypes};
use ccdi_db::ParamValue;
use ccdi_query::schema::{count_query, list_query, lookup_query, summary_query};
use ccdi_query::{Catalog, FileSchema, FilterSet, SampleSchema, SubjectSchema};
use ccdi_test_utils::pretty_assertions::assert_eq;
use ccdi_test_utils::test_settings;

fn catalog() -> Catalog {
    Catalog::from_settings(&test_settings()).unwrap()
}

#[test]
fn test_subject_listing_without_filters() {
    let q = list_query(&SubjectSchema, &catalog(), &FilterSet::new(), 0, 100)
        .unwrap()
        .unwrap();
    assert_eq!(
        q.text,
        "MATCH (p:participant)\n\
         WHERE p.participant_id IS NOT NULL\n\
         OPTIONAL MATCH (p)-[:of_participant]->(c:consent_group)-[:of_consent_group]->(st:study)\n\
         OPTIONAL MATCH (s:survival)-[:of_survival]->(p)\n\
         OPTIONAL MATCH (d:diagnosis)-[:of_diagnosis]->(p)\n\
         WITH p, collect(DISTINCT st.study_id) AS studies, collect(DISTINCT s) AS survivals, \
         collect(DISTINCT d) AS diagnoses\n\
         WHERE size(studies) > 0\n\
         RETURN p.participant_id AS id, properties(p) AS props, studies, \
         [x IN survivals | properties(x)] AS survival_props, \
         [x IN diagnoses | properties(x)] AS diagnosis_props\n\
         ORDER BY id\n\
         SKIP $offset\n\
         LIMIT $limit"
    );
    assert_eq!(q.params["offset"], ParamValue::Int(0));
    assert_eq!(q.params["limit"], ParamValue::Int(100));
}

#[test]
fn test_summary_only_traverses_what_filters_need() {
    let q = summary_query(&SubjectSchema, &catalog(), &FilterSet::new().with("sex", "F"))
        .unwrap()
        .unwrap();
    assert_eq!(
        q.text,
        "MATCH (p:participant)\n\
         WHERE p.participant_id IS NOT NULL AND p.sex_at_birth IN $p0\n\
         OPTIONAL MATCH (p)-[:of_participant]->(c:consent_group)-[:of_consent_group]->(st:study)\n\
         WITH p, collect(DISTINCT st.study_id) AS studies\n\
         WHERE size(studies) > 0\n\
         RETURN count(DISTINCT p) AS total"
    );
}

#[test]
fn test_summary_and_count_share_the_anchor() {
    let c = catalog();
    let filters = FilterSet::new().with("depositions", "phs002431");
    let summary = summary_query(&SubjectSchema, &c, &filters).unwrap().unwrap();
    let count = count_query(&SubjectSchema, &c, "sex", &filters).unwrap().unwrap();
    let head = |text: &str| text.split("\nRETURN").next().unwrap_or_default().to_string();
    assert_eq!(head(&summary.text), head(&count.text));
    assert_eq!(summary.params, count.params);
}

#[test]
fn test_vital_status_filter_adds_derivation_stages() {
    let filters = FilterSet::new().with("vital_status", "Dead");
    let q = count_query(&SubjectSchema, &catalog(), "sex", &filters).unwrap().unwrap();
    assert!(q.text.contains("OPTIONAL MATCH (s:survival)-[:of_survival]->(p)"));
    assert!(!q.text.contains("(d:diagnosis)"));
    assert!(q.text.contains("AS vital_status"));
    assert!(q.text.contains("WHERE vital_status IN $p0"));
}

#[test]
fn test_count_of_diagnoses_traverses_diagnoses() {
    let q = count_query(&SubjectSchema, &catalog(), "associated_diagnoses", &FilterSet::new())
        .unwrap()
        .unwrap();
    assert!(q.text.contains("(d:diagnosis)-[:of_diagnosis]->(p)"));
    assert!(!q.text.contains("(s:survival)"));
    assert!(q.text.contains("AS diagnosis_props"));
}

#[test]
fn test_count_ignores_the_counted_fields_own_filter() {
    let c = catalog();
    let only_sex = FilterSet::new().with("sex", "F");
    for field in ["race", "ethnicity"] {
        let value = if field == "race" { "White" } else { "Not reported" };
        let filters = only_sex.clone().with(field, value);
        let q = count_query(&SubjectSchema, &c, field, &filters).unwrap().unwrap();
        let expected = count_query(&SubjectSchema, &c, field, &only_sex).unwrap().unwrap();
        assert_eq!(q, expected);
    }

    let filters = only_sex.clone().with("associated_diagnoses", "Neuroblastoma").with_search("wilms");
    let q = count_query(&SubjectSchema, &c, "associated_diagnoses", &filters).unwrap().unwrap();
    let expected = count_query(&SubjectSchema, &c, "associated_diagnoses", &only_sex).unwrap().unwrap();
    assert_eq!(q, expected);
}

#[test]
fn test_count_keeps_filters_on_other_fields() {
    let c = catalog();
    let filters = FilterSet::new().with("race", "White");
    let q = count_query(&SubjectSchema, &c, "sex", &filters).unwrap().unwrap();
    let unfiltered = count_query(&SubjectSchema, &c, "sex", &FilterSet::new()).unwrap().unwrap();
    assert!(q.text.contains("WHERE p.participant_id IS NOT NULL AND ANY(v IN $p0"));
    assert_ne!(q.text, unfiltered.text);
}

#[test]
fn test_sample_diagnosis_count_ignores_diagnosis_filter_and_search() {
    let c = catalog();
    let tissue = FilterSet::new().with("tissue_type", "Tumor");
    let filters = tissue.clone().with("diagnosis", "Neuroblastoma").with_search("wilms");
    let q = count_query(&SampleSchema, &c, "diagnosis", &filters).unwrap().unwrap();
    let expected = count_query(&SampleSchema, &c, "diagnosis", &tissue).unwrap().unwrap();
    assert_eq!(q, expected);
    assert!(!q.text.contains("CONTAINS"));
}

#[test]
fn test_counted_field_filter_is_still_validated_by_name() {
    let filters = FilterSet::new().with("sex", "F").with("not_a_field", "x");
    let err = count_query(&SubjectSchema, &catalog(), "race", &filters).unwrap_err();
    assert!(matches!(err, FederationError::UnsupportedField { .. }));
}

#[test]
fn test_count_field_outside_allowlist() {
    let err = count_query(&SampleSchema, &catalog(), "race", &FilterSet::new()).unwrap_err();
    assert!(matches!(
        err,
        FederationError::UnsupportedField { entity: EntityType::Sample, .. }
    ));
}

#[test]
fn test_sample_rejects_subject_filter() {
    let err = list_query(&SampleSchema, &catalog(), &FilterSet::new().with("sex", "F"), 0, 10)
        .unwrap_err();
    assert!(matches!(err, FederationError::UnsupportedField { .. }));
}

#[test]
fn test_singular_anatomical_site_is_invalid() {
    let filters = FilterSet::new().with("anatomical_site", "Lung");
    let err = list_query(&SampleSchema, &catalog(), &filters, 0, 10).unwrap_err();
    assert!(matches!(err, FederationError::InvalidParameters { .. }));
}

#[test]
fn test_sample_lookup_requires_the_namespace() {
    let q = lookup_query(&SampleSchema, "phs002431", "SAMP1");
    assert!(q.text.contains("WHERE sa.sample_id IS NOT NULL AND sa.sample_id = $name"));
    assert!(q.text.contains("WHERE size(studies) > 0 AND $namespace IN studies"));
    assert!(q.text.ends_with("LIMIT $limit"));
    assert_eq!(q.params["namespace"], ParamValue::Str("phs002431".into()));
}

#[test]
fn test_sample_null_mapped_filter_accepts_missing_files() {
    let filters = FilterSet::new().with("library_source_material", "Other");
    let q = list_query(&SampleSchema, &catalog(), &filters, 0, 10).unwrap().unwrap();
    assert!(q.text.contains(
        "size(seq_files) = 0 OR ANY(x IN seq_files WHERE x.library_source_material IS NULL \
         OR x.library_source_material IN $p0)"
    ));
}

#[test]
fn test_library_strategy_matches_mapped_and_original() {
    let filters = FilterSet::new().with("library_strategy", "Other");
    let q = list_query(&SampleSchema, &catalog(), &filters, 0, 10).unwrap().unwrap();
    assert_eq!(
        q.params["p0"],
        ParamValue::List(vec![
            ParamValue::Str("Archer Fusion".into()),
            ParamValue::Str("Other".into())
        ])
    );
}

#[test]
fn test_unknown_file_type_compiles_to_nothing() {
    let filters = FilterSet::new().with("type", "NOT_A_TYPE");
    assert!(list_query(&FileSchema, &catalog(), &filters, 0, 10).unwrap().is_none());
    assert!(summary_query(&FileSchema, &catalog(), &filters).unwrap().is_none());
}

#[test]
fn test_file_listing_collects_samples() {
    let c = Catalog { file_types: FileTypes::from_values(["BAM"]), ..catalog() };
    let filters = FilterSet::new().with("type", "BAM").with("metadata.unharmonized.file_name", "x.bam");
    let q = list_query(&FileSchema, &c, &filters, 20, 10).unwrap().unwrap();
    assert!(q.text.starts_with(
        "MATCH (sf:sequencing_file)-[:of_sequencing_file]->(sa:sample)\n\
         WHERE sf.id IS NOT NULL AND toString(sf.`file_name`) IN $p0 \
         AND toLower(toString(sf.file_type)) IN $p1"
    ));
    assert!(q.text.contains("collect(DISTINCT sa.sample_id) AS sample_ids"));
    assert_eq!(q.params["offset"], ParamValue::Int(20));
}
