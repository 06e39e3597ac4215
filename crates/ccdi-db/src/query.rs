//! Parameterized Cypher queries.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A bound query parameter. Only the shapes the compilers emit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<ParamValue>),
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<ParamValue> for neo4rs::BoltType {
    fn from(v: ParamValue) -> Self {
        match v {
            ParamValue::Null => neo4rs::BoltType::Null(neo4rs::BoltNull),
            ParamValue::Bool(b) => b.into(),
            ParamValue::Int(i) => i.into(),
            ParamValue::Str(s) => s.into(),
            ParamValue::List(items) => items
                .into_iter()
                .map(neo4rs::BoltType::from)
                .collect::<Vec<neo4rs::BoltType>>()
                .into(),
        }
    }
}

pub type QueryParams = BTreeMap<String, ParamValue>;

/// Query text plus its parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CypherQuery {
    pub text: String,
    pub params: QueryParams,
}

impl CypherQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), params: QueryParams::new() }
    }

    pub fn with_params(text: impl Into<String>, params: QueryParams) -> Self {
        Self { text: text.into(), params }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub(crate) fn to_neo4rs(&self) -> neo4rs::Query {
        self.params
            .iter()
            .fold(neo4rs::query(&self.text), |q, (k, v)| {
                q.param(k.as_str(), neo4rs::BoltType::from(v.clone()))
            })
    }
}

impl fmt::Display for CypherQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
