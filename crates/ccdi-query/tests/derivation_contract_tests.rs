//! Rust derivations checked against their Cypher forms on a live Memgraph.
//!
//! Each case runs once through the Rust functions that build responses and
//! once through the Cypher expressions that filter, and both must land on
//! the pinned outcome.

use serde_json::{json, Value};

use ccdi_common::sentinel::split_tokens;
use ccdi_common::{Ethnicity, Settings};
use ccdi_db::{CypherQuery, GraphSession, MemgraphSession, ParamValue, QueryParams};
use ccdi_query::cypher::token_list;
use ccdi_query::derive::{
    derive_vital_status, displayed_race_expr, ethnicity_condition, race_profile, vital_status_stages,
    SurvivalRecord, SURVIVAL_AGE, SURVIVAL_STATUS,
};
use ccdi_test_utils::pretty_assertions::assert_eq;

async fn session() -> MemgraphSession {
    let mut settings = Settings::default();
    settings.apply_env(|key| std::env::var(key).ok()).unwrap();
    MemgraphSession::connect(&settings.database).await.unwrap()
}

fn param(v: &Value) -> ParamValue {
    match v {
        Value::Null => ParamValue::Null,
        Value::Bool(b) => ParamValue::Bool(*b),
        Value::Number(n) => ParamValue::Int(n.as_i64().unwrap()),
        Value::String(s) => ParamValue::Str(s.clone()),
        Value::Array(items) => ParamValue::List(items.iter().map(param).collect()),
        Value::Object(_) => panic!("maps are not bound as parameters"),
    }
}

fn with_stages(stages: Vec<Vec<String>>) -> String {
    stages
        .into_iter()
        .map(|items| format!("WITH {}", items.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// (records as (status, age), expected status, expected age)
fn survival_cases() -> Vec<(Vec<(Value, Value)>, Option<&'static str>, Option<i64>)> {
    vec![
        (vec![(json!("Alive"), json!(10)), (json!("Invalid value"), json!(20))], Some("Alive"), Some(10)),
        (vec![(json!("Alive"), json!(10)), (json!("-999"), json!(20))], Some("Alive"), Some(10)),
        (vec![(json!("Alive"), json!(10)), (json!(" "), json!(20))], Some("Alive"), Some(10)),
        (vec![(json!(" Alive "), json!("'4017'"))], Some("Alive"), Some(4017)),
        (vec![(json!("Alive"), json!(90)), (json!("Dead"), json!(20)), (json!("Dead"), json!(30))], Some("Dead"), Some(30)),
        (vec![(json!("Alive"), json!(10)), (json!("Dead"), json!(-999))], Some("Dead"), None),
        (vec![(json!("Unknown"), json!(40)), (json!("Alive"), json!(40))], Some("Alive"), Some(40)),
        (vec![(json!("Unknown"), Value::Null), (json!("Alive"), json!("-999"))], Some("Alive"), None),
        (vec![(json!("Invalid value"), json!(5))], None, None),
        (vec![], None, None),
    ]
}

fn survival_query(records: &[(Value, Value)]) -> CypherQuery {
    let mut params = QueryParams::new();
    params.insert("statuses".into(), ParamValue::List(records.iter().map(|(s, _)| param(s)).collect()));
    params.insert("ages".into(), ParamValue::List(records.iter().map(|(_, a)| param(a)).collect()));
    let text = format!(
        "WITH $statuses AS statuses, $ages AS ages\n\
         WITH [i IN range(0, size(statuses) - 1) | {{{SURVIVAL_STATUS}: statuses[i], {SURVIVAL_AGE}: ages[i]}}] AS survivals\n\
         {}\n\
         RETURN vital_status, age_at_vital_status",
        with_stages(vital_status_stages(&["survivals"]))
    );
    CypherQuery::with_params(text, params)
}

#[test]
fn test_survival_cases_hold_in_rust() {
    for (records, status, age) in survival_cases() {
        let parsed: Vec<SurvivalRecord> = records
            .iter()
            .map(|(s, a)| {
                let mut props = serde_json::Map::new();
                props.insert(SURVIVAL_STATUS.to_string(), s.clone());
                props.insert(SURVIVAL_AGE.to_string(), a.clone());
                SurvivalRecord::from_properties(&Value::Object(props))
            })
            .collect();
        let out = derive_vital_status(&parsed);
        assert_eq!((out.status.as_deref(), out.age), (status, age), "{records:?}");
    }
}

#[tokio::test]
#[ignore = "requires a running Memgraph at MEMGRAPH_URI"]
async fn test_live_vital_status_matches_rust() {
    let session = session().await;
    for (records, status, age) in survival_cases() {
        let rows = session.run(&survival_query(&records)).await.unwrap();
        assert_eq!(rows[0]["vital_status"], json!(status), "{records:?}");
        assert_eq!(rows[0]["age_at_vital_status"], json!(age), "{records:?}");
    }
}

fn race_cases() -> Vec<Value> {
    vec![
        json!("White"),
        json!("Asian;White"),
        json!("Hispanic or Latino"),
        json!("Hispanic or Latino; White"),
        json!("Invalid value"),
        json!("White;Invalid value"),
        json!("-999"),
        json!(["Asian", "Black or African American;White"]),
        Value::Null,
    ]
}

#[test]
fn test_race_cases_hold_in_rust() {
    let expected = [
        (Some(vec!["White"]), Some(Ethnicity::NotReported)),
        (Some(vec!["Asian", "White"]), Some(Ethnicity::NotReported)),
        (Some(vec!["Not Reported"]), Some(Ethnicity::HispanicOrLatino)),
        (Some(vec!["White"]), Some(Ethnicity::HispanicOrLatino)),
        (None, None),
        (Some(vec!["White"]), Some(Ethnicity::NotReported)),
        (None, None),
        (Some(vec!["Asian", "Black or African American", "White"]), Some(Ethnicity::NotReported)),
        (None, None),
    ];
    for (race, (displayed, ethnicity)) in race_cases().iter().zip(expected) {
        let p = race_profile(race);
        let displayed = displayed.map(|v| v.into_iter().map(str::to_string).collect::<Vec<_>>());
        assert_eq!((p.displayed, p.ethnicity), (displayed, ethnicity), "{race}");
    }
}

#[tokio::test]
#[ignore = "requires a running Memgraph at MEMGRAPH_URI"]
async fn test_live_race_and_ethnicity_match_rust() {
    let session = session().await;
    for race in race_cases() {
        let mut params = QueryParams::new();
        params.insert("race".into(), param(&race));
        let text = format!(
            "WITH {{race: $race}} AS p\n\
             RETURN {} AS displayed, {} AS hispanic, {} AS not_reported",
            displayed_race_expr("p"),
            ethnicity_condition("p", Ethnicity::HispanicOrLatino),
            ethnicity_condition("p", Ethnicity::NotReported),
        );
        let rows = session.run(&CypherQuery::with_params(text, params)).await.unwrap();
        let profile = race_profile(&race);
        assert_eq!(rows[0]["displayed"], json!(profile.displayed.unwrap_or_default()), "{race}");
        assert_eq!(
            rows[0]["hispanic"],
            json!(profile.ethnicity == Some(Ethnicity::HispanicOrLatino)),
            "{race}"
        );
        assert_eq!(
            rows[0]["not_reported"],
            json!(profile.ethnicity == Some(Ethnicity::NotReported)),
            "{race}"
        );
    }
}

/// (stored anatomic_site, wanted sites, matches)
fn site_cases() -> Vec<(Value, Vec<&'static str>, bool)> {
    vec![
        (json!("Bone;Lung"), vec!["Lung"], true),
        (json!("Bone; Lung"), vec!["Liver", "Bone"], true),
        (json!(["Skin", "Bone;Lung"]), vec!["Lung"], true),
        (json!("Bone;Lung"), vec!["Bone;Lung"], false),
        (json!("Invalid value"), vec!["Invalid value"], false),
        (Value::Null, vec!["Bone"], false),
    ]
}

#[test]
fn test_site_cases_hold_in_rust() {
    for (site, wanted, hit) in site_cases() {
        let tokens = split_tokens(&site);
        assert_eq!(tokens.iter().any(|t| wanted.contains(&t.as_str())), hit, "{site}");
    }
}

#[tokio::test]
#[ignore = "requires a running Memgraph at MEMGRAPH_URI"]
async fn test_live_site_tokens_match_rust() {
    let session = session().await;
    for (site, wanted, hit) in site_cases() {
        let mut params = QueryParams::new();
        params.insert("site".into(), param(&site));
        params.insert("wanted".into(), wanted.clone().into());
        let text = format!(
            "WITH {{anatomic_site: $site}} AS sa\n\
             RETURN ANY(v IN $wanted WHERE v IN {}) AS hit",
            token_list("sa.anatomic_site")
        );
        let rows = session.run(&CypherQuery::with_params(text, params)).await.unwrap();
        assert_eq!(rows[0]["hit"], json!(hit), "{site} {wanted:?}");
    }
}
