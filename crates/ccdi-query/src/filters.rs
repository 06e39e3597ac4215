//! Caller-supplied filters, normalized.

use std::collections::BTreeMap;

use serde_json::json;

use ccdi_common::{EntityType, FieldAllowlist, Result};

/// Separator for alternatives inside one query-string value.
pub const ALTERNATIVE_SEPARATOR: &str = "||";

/// The free-text diagnosis search term.
pub const SEARCH_FIELD: &str = "search";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    /// Trimmed, non-empty alternatives in input order.
    pub fn values(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            FilterValue::One(v) => vec![v.as_str()],
            FilterValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .flat_map(|v| v.split(ALTERNATIVE_SEPARATOR))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::One(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::One(v)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(v: Vec<&str>) -> Self {
        FilterValue::Many(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(v: Vec<String>) -> Self {
        FilterValue::Many(v)
    }
}

/// Field → value(s), plus the diagnosis search term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    fields: BTreeMap<String, FilterValue>,
    search: Option<String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from query-string pairs. Repeated keys accumulate; blank values
    /// are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut set = Self::new();
        for (k, v) in pairs {
            let (k, v) = (k.into(), v.into());
            if v.trim().is_empty() {
                continue;
            }
            if k == SEARCH_FIELD {
                set.search = Some(v.trim().to_string());
                continue;
            }
            let merged = match set.fields.remove(&k) {
                None => FilterValue::One(v),
                Some(FilterValue::One(prev)) => FilterValue::Many(vec![prev, v]),
                Some(FilterValue::Many(mut prev)) => {
                    prev.push(v);
                    FilterValue::Many(prev)
                }
            };
            set.fields.insert(k, merged);
        }
        set
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FilterValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// A copy without `field`.
    pub fn without(&self, field: &str) -> Self {
        let mut out = self.clone();
        out.fields.remove(field);
        out
    }

    /// A copy without the search term.
    pub fn without_search(&self) -> Self {
        Self { search: None, ..self.clone() }
    }

    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.fields.get(field)
    }

    /// Normalized alternatives for a field; empty when absent.
    pub fn values(&self, field: &str) -> Vec<String> {
        self.fields.get(field).map(FilterValue::values).unwrap_or_default()
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.search().is_none()
    }

    /// Reject any field the allowlist does not permit for filtering.
    pub fn validate(&self, entity: EntityType, allowlist: &FieldAllowlist) -> Result<()> {
        for field in self.fields.keys() {
            allowlist.validate_filter_field(entity, field)?;
        }
        Ok(())
    }

    /// Deterministic JSON rendering: keys sorted, list values sorted.
    pub fn cache_key(&self) -> String {
        let fields: BTreeMap<&str, Vec<String>> = self
            .fields
            .iter()
            .map(|(k, v)| {
                let mut values = v.values();
                values.sort();
                (k.as_str(), values)
            })
            .collect();
        json!({ "fields": fields, "search": self.search() }).to_string()
    }
}
