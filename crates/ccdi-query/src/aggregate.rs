//! Count-by-field aggregation.
//!
//! One values query yields one row per anchored entity. Total, missing and
//! the value buckets are all computed here from that single result set.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error};

use ccdi_common::{FederationError, Result};

use crate::model::{CountResult, ValueCount};

/// How buckets are emitted for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    /// Observed values only, count descending then value ascending.
    Observed,
    /// Every listed value, zero counts included, sorted like `Observed`.
    /// Values outside the list count as missing.
    Enumerated(Vec<String>),
    /// Every listed value, sorted by value.
    Alphabetical(Vec<String>),
}

impl Emission {
    pub fn enumerated(values: Vec<&str>) -> Self {
        Emission::Enumerated(values.into_iter().map(str::to_string).collect())
    }

    pub fn alphabetical(values: Vec<&str>) -> Self {
        Emission::Alphabetical(values.into_iter().map(str::to_string).collect())
    }

    fn members(&self) -> Option<&[String]> {
        match self {
            Emission::Observed => None,
            Emission::Enumerated(v) | Emission::Alphabetical(v) => Some(v),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregationEngine;

impl AggregationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Fold `(entity id, normalized values)` pairs into a count result.
    ///
    /// An entity seen on several rows contributes the union of its values.
    /// For a `single_valued` field the buckets must add up to the entities
    /// that have a value; an entity carrying two values breaks that.
    pub fn aggregate<I>(
        &self,
        field: &str,
        rows: I,
        emission: &Emission,
        single_valued: bool,
    ) -> Result<CountResult>
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let members: Option<BTreeSet<&str>> =
            emission.members().map(|m| m.iter().map(String::as_str).collect());

        let mut entities: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (id, values) in rows {
            let set = entities.entry(id).or_default();
            for v in values {
                if members.as_ref().map_or(true, |m| m.contains(v.as_str())) {
                    set.insert(v);
                }
            }
        }

        let total = entities.len() as u64;
        let missing = entities.values().filter(|s| s.is_empty()).count() as u64;

        let mut buckets: BTreeMap<String, u64> = BTreeMap::new();
        if let Some(m) = emission.members() {
            for v in m {
                buckets.insert(v.clone(), 0);
            }
        }
        for v in entities.values().flatten() {
            *buckets.entry(v.clone()).or_default() += 1;
        }

        let summed: u64 = buckets.values().sum();
        if single_valued && missing + summed != total {
            error!(field, total, missing, summed, "count invariant violated");
            return Err(FederationError::InternalConsistency(format!(
                "{field}: total {total} != missing {missing} + counted {summed}"
            )));
        }

        let mut values: Vec<ValueCount> = buckets
            .into_iter()
            .map(|(value, count)| ValueCount { value, count })
            .collect();
        match emission {
            Emission::Alphabetical(_) => values.sort_by(|a, b| a.value.cmp(&b.value)),
            _ => values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value))),
        }

        debug!(field, total, missing, buckets = values.len(), "aggregated counts");
        Ok(CountResult { total, missing, values })
    }
}
