//! Services driven against a scripted graph session.

use std::sync::Arc;

use serde_json::json;

use ccdi_common::{EntityType, FederationError};
use ccdi_db::{DbError, GraphSession};
use ccdi_query::cache::{CacheService, MokaCache, NoCache};
use ccdi_query::{
    Catalog, CountResult, FilterSet, ServiceConfig, Services, Summary, ValueCount,
};
use ccdi_test_utils::pretty_assertions::assert_eq;
use ccdi_test_utils::{rows, test_settings, ScriptedSession};

fn services(session: Arc<ScriptedSession>, cache: Arc<dyn CacheService>) -> Services {
    let catalog = Catalog::from_settings(&test_settings()).unwrap();
    let graph: Arc<dyn GraphSession> = session;
    Services::new(graph, Arc::new(catalog), cache, ServiceConfig::default())
}

fn participant(id: &str, sex: &str, race: &str, studies: &[&str]) -> serde_json::Value {
    json!({
        "id": id,
        "props": {"participant_id": id, "sex_at_birth": sex, "race": race},
        "studies": studies,
        "survival_props": [],
        "diagnosis_props": []
    })
}

fn vc(value: &str, count: u64) -> ValueCount {
    ValueCount { value: value.to_string(), count }
}

#[tokio::test]
async fn test_list_maps_rows_and_paginates() {
    let session = Arc::new(ScriptedSession::new().with_rows(rows([
        participant("P1", "Female", "White", &["phs1"]),
        participant("P2", "Male", "Asian", &["phs1", "phs2"]),
    ])));
    let svc = services(session.clone(), Arc::new(NoCache));

    let subjects = svc.subject.list(&FilterSet::new(), Some(3), Some(50)).await.unwrap();
    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[1].id.namespace.name, "phs2");

    let q = session.last_query().unwrap();
    assert_eq!(q.params["offset"], ccdi_db::ParamValue::Int(100));
    assert_eq!(q.params["limit"], ccdi_db::ParamValue::Int(50));
}

#[tokio::test]
async fn test_per_page_is_capped() {
    let session = Arc::new(ScriptedSession::new());
    let svc = services(session.clone(), Arc::new(NoCache));
    let out = svc.sample.list(&FilterSet::new(), None, Some(5000)).await.unwrap();
    assert!(out.is_empty());
    let q = session.last_query().unwrap();
    assert_eq!(q.params["limit"], ccdi_db::ParamValue::Int(1000));
}

#[tokio::test]
async fn test_zero_page_is_invalid() {
    let session = Arc::new(ScriptedSession::new());
    let svc = services(session.clone(), Arc::new(NoCache));
    let err = svc.file.list(&FilterSet::new(), Some(0), None).await.unwrap_err();
    assert!(matches!(err, FederationError::InvalidParameters { .. }));
    let err = svc.file.list(&FilterSet::new(), None, Some(0)).await.unwrap_err();
    assert!(matches!(err, FederationError::InvalidParameters { .. }));
    assert_eq!(session.query_count(), 0);
}

#[tokio::test]
async fn test_lookup() {
    let session = Arc::new(
        ScriptedSession::new().with_rows(rows([participant("P1", "Female", "White", &["phs1", "phs2"])])),
    );
    let svc = services(session.clone(), Arc::new(NoCache));
    let subject = svc.subject.get_by_identifier("CCDI-DCC", "phs1", "P1").await.unwrap();
    // The requested namespace wins over the alphabetically last study.
    assert_eq!(subject.id.namespace.name, "phs1");

    let err = svc.subject.get_by_identifier("CCDI-DCC", "phs1", "P9").await.unwrap_err();
    assert!(matches!(err, FederationError::NotFound { entity: EntityType::Subject, .. }));

    let err = svc.subject.get_by_identifier("OTHER", "phs1", "P1").await.unwrap_err();
    assert!(matches!(err, FederationError::NotFound { .. }));

    let err = svc.subject.get_by_identifier("CCDI-DCC", "phs.1", "P1").await.unwrap_err();
    assert!(matches!(err, FederationError::InvalidParameters { .. }));
    assert_eq!(session.query_count(), 2);
}

#[tokio::test]
async fn test_race_count_emits_every_race() {
    let session = Arc::new(ScriptedSession::new().with_rows(rows([
        participant("P1", "Female", "Asian;White", &["phs1"]),
        participant("P2", "Male", "Hispanic or Latino", &["phs1"]),
        participant("P3", "Male", "Invalid value", &["phs1"]),
    ])));
    let svc = services(session, Arc::new(NoCache));
    let counts = svc.subject.count_by_field("race", &FilterSet::new()).await.unwrap();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.missing, 1);
    assert_eq!(counts.values.len(), 8);
    assert_eq!(&counts.values[..3], &[vc("Asian", 1), vc("Not Reported", 1), vc("White", 1)]);
    assert!(counts.values[3..].iter().all(|v| v.count == 0));
}

#[tokio::test]
async fn test_ethnicity_count_is_alphabetical() {
    let session = Arc::new(ScriptedSession::new().with_rows(rows([
        participant("P1", "Female", "White", &["phs1"]),
        participant("P2", "Male", "Hispanic or Latino;White", &["phs1"]),
        participant("P3", "Male", "White", &["phs1"]),
    ])));
    let svc = services(session, Arc::new(NoCache));
    let counts = svc.subject.count_by_field("ethnicity", &FilterSet::new()).await.unwrap();
    assert_eq!(
        counts,
        CountResult {
            total: 3,
            missing: 0,
            values: vec![vc("Hispanic or Latino", 1), vc("Not reported", 2)],
        }
    );
}

#[tokio::test]
async fn test_ethnicity_count_ignores_ethnicity_filter() {
    let session = Arc::new(ScriptedSession::new().with_rows(rows([
        participant("P1", "Female", "White", &["phs1"]),
        participant("P2", "Male", "Hispanic or Latino;White", &["phs1"]),
    ])));
    let svc = services(session.clone(), Arc::new(NoCache));
    let filters = FilterSet::new().with("ethnicity", "Hispanic or Latino").with("sex", "M");
    let counts = svc.subject.count_by_field("ethnicity", &filters).await.unwrap();
    assert_eq!(counts.values, vec![vc("Hispanic or Latino", 1), vc("Not reported", 1)]);

    let queries = session.queries();
    assert_eq!(queries.len(), 1);
    assert!(!queries[0].text.contains("'Hispanic or Latino' IN"));
    assert!(queries[0].text.contains("p.sex_at_birth IN $p0"));
}

#[tokio::test]
async fn test_vital_status_count() {
    let session = Arc::new(ScriptedSession::new().with_rows(rows([
        json!({"id": "P1", "props": {}, "studies": ["phs1"], "survival_props": [
            {"last_known_survival_status": "Alive", "age_at_last_known_survival_status": 10},
            {"last_known_survival_status": "Dead", "age_at_last_known_survival_status": 30}
        ]}),
        json!({"id": "P2", "props": {}, "studies": ["phs1"], "survival_props": [
            {"last_known_survival_status": "Alive", "age_at_last_known_survival_status": 40}
        ]}),
        json!({"id": "P3", "props": {}, "studies": ["phs1"], "survival_props": []}),
    ])));
    let svc = services(session, Arc::new(NoCache));
    let counts = svc.subject.count_by_field("vital_status", &FilterSet::new()).await.unwrap();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.missing, 1);
    assert_eq!(counts.values, vec![vc("Alive", 1), vc("Dead", 1)]);
}

#[tokio::test]
async fn test_count_is_cached() {
    let session = Arc::new(
        ScriptedSession::new().with_rows(rows([participant("P1", "Female", "White", &["phs1"])])),
    );
    let svc = services(session.clone(), Arc::new(MokaCache::new(64)));
    let filters = FilterSet::new().with("depositions", "phs1");
    let first = svc.subject.count_by_field("sex", &filters).await.unwrap();
    let second = svc.subject.count_by_field("sex", &filters).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.values, vec![vc("F", 1)]);
    assert_eq!(session.query_count(), 1);
}

#[tokio::test]
async fn test_summary() {
    let session = Arc::new(ScriptedSession::new().with_rows(rows([json!({"total": 42})])));
    let svc = services(session, Arc::new(MokaCache::new(64)));
    let summary = svc.sample.summary(&FilterSet::new()).await.unwrap();
    assert_eq!(summary, Summary::new(42));
}

#[tokio::test]
async fn test_unknown_file_type_yields_zero_without_querying() {
    let session = Arc::new(ScriptedSession::new());
    let svc = services(session.clone(), Arc::new(NoCache));
    let filters = FilterSet::new().with("type", "NOT_A_TYPE");
    assert!(svc.file.list(&filters, None, None).await.unwrap().is_empty());
    assert_eq!(svc.file.summary(&filters).await.unwrap(), Summary::new(0));
    assert_eq!(
        svc.file.count_by_field("type", &filters).await.unwrap(),
        CountResult::empty()
    );
    assert_eq!(session.query_count(), 0);
}

#[tokio::test]
async fn test_connection_failure_surfaces_as_no_data() {
    let session = Arc::new(ScriptedSession::new().with_error(DbError::Connection("refused".into())));
    let svc = services(session, Arc::new(NoCache));
    let err = svc.subject.summary(&FilterSet::new()).await.unwrap_err();
    assert!(matches!(err, FederationError::DataUnavailable(_)));
    assert_eq!(err.to_string(), "No data available");
}

#[tokio::test]
async fn test_sample_count_uses_related_nodes() {
    let session = Arc::new(ScriptedSession::new().with_rows(rows([
        json!({"id": "S1", "props": {}, "studies": ["phs1"], "seq_file_props": [
            {"library_source_molecule": "Transcriptomic"}, {"library_source_molecule": "Genomic"}
        ]}),
        json!({"id": "S2", "props": {}, "studies": ["phs1"], "seq_file_props": [
            {"library_source_molecule": "Viral RNA"}
        ]}),
        json!({"id": "S3", "props": {}, "studies": ["phs1"], "seq_file_props": []}),
    ])));
    let svc = services(session.clone(), Arc::new(NoCache));
    let counts = svc
        .sample
        .count_by_field("specimen_molecular_analyte_type", &FilterSet::new())
        .await
        .unwrap();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.missing, 1);
    assert_eq!(counts.values, vec![vc("RNA", 2), vc("DNA", 1)]);
    let q = session.last_query().unwrap();
    assert!(q.text.contains("(sf:sequencing_file)-[:of_sequencing_file]->(sa)"));
    assert!(!q.text.contains("(pf:pathology_file)"));
}
