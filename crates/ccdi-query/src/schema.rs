//! Per-entity query schema and the shared query head.
//!
//! Every query for an entity starts the same way:
//!
//! ```text
//! MATCH <primary> WHERE <primary predicates>
//! OPTIONAL MATCH <study paths>
//! OPTIONAL MATCH <related paths the request needs>
//! WITH <primary>, <studies>, <collected related nodes>
//! WHERE size(studies) > 0 AND <related predicates>
//! [derivation stages WHERE <derived predicates>]
//! ```
//!
//! Listing, lookup, counting and summary only differ in what follows, so
//! the anchor and the filter semantics cannot drift between them.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use ccdi_common::allowlist::{parse_field, FieldRef};
use ccdi_common::sentinel::{clean_int, clean_text, split_tokens};
use ccdi_common::{EntityType, FederationError, FieldUse, ReverseMapped, Result};
use ccdi_db::{CypherQuery, Record};

use crate::aggregate::Emission;
use crate::catalog::Catalog;
use crate::cypher::{integer_text, property, ParamBag, Predicate, QueryBuilder};
use crate::filters::FilterSet;

/// A related node kind reached through an optional path.
#[derive(Debug, Clone, Copy)]
pub struct Relation {
    pub key: &'static str,
    /// Pattern for `OPTIONAL MATCH`; `None` when bound by the primary match.
    pub pattern: Option<&'static str>,
    /// Aggregation item in the head `WITH`.
    pub item: &'static str,
    /// Name the aggregation is bound to.
    pub alias: &'static str,
    /// `RETURN` item exposing the collected material to the mapper.
    pub material: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose<'a> {
    Listing,
    Lookup { namespace: &'a str, name: &'a str },
    Count(&'a str),
    Summary,
}

/// Filters compiled into the three places they can apply.
#[derive(Debug, Default)]
pub struct CompiledFilters {
    pub primary: Vec<Predicate>,
    pub related: Vec<Predicate>,
    pub derived: Vec<Predicate>,
    pub needs: BTreeSet<&'static str>,
    /// Some filter value can never match (e.g. an unknown file type).
    pub unsatisfiable: bool,
}

impl CompiledFilters {
    pub fn need(&mut self, relation: &'static str) {
        self.needs.insert(relation);
    }
}

pub trait EntitySchema: Send + Sync + 'static {
    type Record: Serialize + Send + Sync;

    const ENTITY: EntityType;
    /// Variable bound to the primary node.
    const VAR: &'static str;
    const PRIMARY_PATTERN: &'static str;
    /// Business identifier expression; also the sort key.
    const ID: &'static str;
    const STUDY_PATTERNS: &'static [&'static str];
    /// `WITH` item binding `studies`.
    const STUDIES_ITEM: &'static str;
    const RELATIONS: &'static [Relation];

    /// Parameter checks that run before the allowlist.
    fn check_parameters(&self, _filters: &FilterSet) -> Result<()> {
        Ok(())
    }

    /// Validate and compile the entity-specific filters.
    fn compile(
        &self,
        catalog: &Catalog,
        filters: &FilterSet,
        params: &mut ParamBag,
    ) -> Result<CompiledFilters>;

    /// The filters a count of `field` applies. Fields whose counts report
    /// their whole distribution drop their own filter here.
    fn count_filters(&self, _field: &str, filters: &FilterSet) -> FilterSet {
        filters.clone()
    }

    /// Relations whose material a count of `field` reads.
    fn field_relations(&self, field: &str) -> &'static [&'static str];

    /// Extra `WITH` stages needed to evaluate derived predicates. Each stage
    /// lists its items after the carried variables.
    fn derived_stages(&self, _carry: &[&str]) -> Vec<Vec<String>> {
        Vec::new()
    }

    fn to_record(&self, catalog: &Catalog, row: &RowView<'_>, namespace: Option<&str>)
        -> Result<Self::Record>;

    /// Normalized values of `field` for one entity; empty means missing.
    fn count_values(&self, catalog: &Catalog, field: &str, row: &RowView<'_>) -> Vec<String>;

    fn emission(&self, field: &str) -> Emission;

    /// At most one value per entity.
    fn single_valued(&self, field: &str) -> bool;
}

// ── Query assembly ───────────────────────────────────────────────────────────

/// Relations the head must traverse for this request.
fn required_relations<S: EntitySchema>(
    schema: &S,
    purpose: Purpose<'_>,
    compiled: &CompiledFilters,
) -> Vec<&'static Relation> {
    let mut keys: BTreeSet<&str> = compiled.needs.iter().copied().collect();
    match purpose {
        Purpose::Listing | Purpose::Lookup { .. } => {
            keys.extend(S::RELATIONS.iter().map(|r| r.key));
        }
        Purpose::Count(field) => keys.extend(schema.field_relations(field).iter().copied()),
        Purpose::Summary => {}
    }
    S::RELATIONS.iter().filter(|r| keys.contains(r.key)).collect()
}

/// Build the shared head and return the builder plus the relations it bound.
pub fn build_head<S: EntitySchema>(
    schema: &S,
    purpose: Purpose<'_>,
    mut compiled: CompiledFilters,
    mut params: ParamBag,
) -> (QueryBuilder, Vec<&'static Relation>) {
    let mut primary = vec![Predicate::IsNotNull(S::ID.to_string())];
    let mut related = vec![Predicate::expr("size(studies) > 0")];
    if let Purpose::Lookup { namespace, name } = purpose {
        let name = params.bind_named("name", name);
        primary.push(Predicate::eq(S::ID, name));
        let namespace = params.bind_named("namespace", namespace);
        related.push(Predicate::expr(format!("{namespace} IN studies")));
    }
    primary.append(&mut compiled.primary);
    related.append(&mut compiled.related);

    let relations = required_relations(schema, purpose, &compiled);
    let mut qb = QueryBuilder::new(params);
    qb.match_(S::PRIMARY_PATTERN, Predicate::and(primary));
    for pattern in S::STUDY_PATTERNS {
        qb.optional_match(*pattern);
    }
    for rel in &relations {
        if let Some(pattern) = rel.pattern {
            qb.optional_match(pattern);
        }
    }

    let mut carry: Vec<&str> = vec![S::VAR, "studies"];
    carry.extend(relations.iter().map(|r| r.alias));
    let mut items = vec![S::VAR.to_string(), S::STUDIES_ITEM.to_string()];
    items.extend(relations.iter().map(|r| r.item.to_string()));
    qb.with(items, Predicate::and(related));

    if !compiled.derived.is_empty() {
        let stages = schema.derived_stages(&carry);
        let last = stages.len().saturating_sub(1);
        let mut derived = Some(Predicate::and(std::mem::take(&mut compiled.derived)));
        for (i, stage) in stages.into_iter().enumerate() {
            let filter = if i == last { derived.take().unwrap_or(Predicate::True) } else { Predicate::True };
            qb.with(stage, filter);
        }
    }
    (qb, relations)
}

fn material_items<S: EntitySchema>(relations: &[&'static Relation]) -> Vec<String> {
    let mut items = vec![
        format!("{} AS id", S::ID),
        format!("properties({}) AS props", S::VAR),
        "studies".to_string(),
    ];
    items.extend(relations.iter().map(|r| r.material.to_string()));
    items
}

/// Compile filters with allowlist validation. `None` when the filters can
/// never match.
pub fn compile_filters<S: EntitySchema>(
    schema: &S,
    catalog: &Catalog,
    filters: &FilterSet,
) -> Result<Option<(CompiledFilters, ParamBag)>> {
    schema.check_parameters(filters)?;
    filters.validate(S::ENTITY, &catalog.allowlist)?;
    let mut params = ParamBag::new();
    let compiled = schema.compile(catalog, filters, &mut params)?;
    if compiled.unsatisfiable {
        return Ok(None);
    }
    Ok(Some((compiled, params)))
}

pub fn list_query<S: EntitySchema>(
    schema: &S,
    catalog: &Catalog,
    filters: &FilterSet,
    offset: u64,
    limit: u64,
) -> Result<Option<CypherQuery>> {
    let Some((compiled, params)) = compile_filters(schema, catalog, filters)? else {
        return Ok(None);
    };
    let (mut qb, relations) = build_head(schema, Purpose::Listing, compiled, params);
    qb.return_(material_items::<S>(&relations))
        .order_by(vec!["id".to_string()])
        .skip(offset)
        .limit(limit);
    Ok(Some(qb.build()))
}

pub fn lookup_query<S: EntitySchema>(schema: &S, namespace: &str, name: &str) -> CypherQuery {
    let purpose = Purpose::Lookup { namespace, name };
    let (mut qb, relations) = build_head(schema, purpose, CompiledFilters::default(), ParamBag::new());
    qb.return_(material_items::<S>(&relations)).limit(1);
    qb.build()
}

pub fn count_query<S: EntitySchema>(
    schema: &S,
    catalog: &Catalog,
    field: &str,
    filters: &FilterSet,
) -> Result<Option<CypherQuery>> {
    catalog.allowlist.validate_count_field(S::ENTITY, field)?;
    filters.validate(S::ENTITY, &catalog.allowlist)?;
    let filters = schema.count_filters(field, filters);
    let Some((compiled, params)) = compile_filters(schema, catalog, &filters)? else {
        return Ok(None);
    };
    let (mut qb, relations) = build_head(schema, Purpose::Count(field), compiled, params);
    qb.return_(material_items::<S>(&relations));
    Ok(Some(qb.build()))
}

pub fn summary_query<S: EntitySchema>(
    schema: &S,
    catalog: &Catalog,
    filters: &FilterSet,
) -> Result<Option<CypherQuery>> {
    let Some((compiled, params)) = compile_filters(schema, catalog, filters)? else {
        return Ok(None);
    };
    let (mut qb, _) = build_head(schema, Purpose::Summary, compiled, params);
    qb.return_(vec![format!("count(DISTINCT {}) AS total", S::VAR)]);
    Ok(Some(qb.build()))
}

// ── Predicate helpers ────────────────────────────────────────────────────────

/// Where a property lives relative to the head.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// On the primary node variable.
    Primary(&'a str),
    /// On any node of a collected list.
    Related(&'a str),
}

impl Target<'_> {
    /// Apply `body` to the element variable, wrapping it in `ANY` for lists.
    pub fn wrap(&self, body: impl Fn(&str) -> Predicate) -> Predicate {
        match self {
            Target::Primary(var) => body(var),
            Target::Related(alias) => Predicate::any("x", alias, body("x")),
        }
    }
}

/// Stored-space form of a filter: values to match and whether "absent"
/// was requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredMatch {
    pub values: Vec<String>,
    pub absent: bool,
    pub null_values: Vec<String>,
}

/// Reverse-map API filter values, rejecting database-only values.
pub fn reverse_values(catalog: &Catalog, field: &str, values: &[String]) -> Result<StoredMatch> {
    let mut out = StoredMatch::default();
    for value in values {
        if catalog.mappings.is_database_only(field, value) {
            return Err(FederationError::invalid_parameter(
                field,
                format!("'{value}' is not a valid value for {field}"),
            ));
        }
        match catalog.mappings.reverse_map(field, value) {
            ReverseMapped::Values(stored) => {
                for s in stored {
                    if !out.values.contains(&s) {
                        out.values.push(s);
                    }
                }
            }
            ReverseMapped::Absent => out.absent = true,
        }
    }
    if out.absent {
        out.null_values = catalog.mappings.null_mappings(field).to_vec();
    }
    Ok(out)
}

/// `prop IN values`, or-ed with the absent condition when requested.
pub fn stored_value_predicate(
    params: &mut ParamBag,
    target: Target<'_>,
    prop: &str,
    m: &StoredMatch,
) -> Predicate {
    let mut parts = Vec::new();
    if !m.values.is_empty() {
        let p = params.bind(m.values.clone());
        parts.push(target.wrap(|v| Predicate::is_in(format!("{v}.{prop}"), p.clone())));
    }
    if m.absent {
        let nulls = params.bind(m.null_values.clone());
        let on_node = target.wrap(|v| {
            Predicate::or(vec![
                Predicate::IsNull(format!("{v}.{prop}")),
                Predicate::is_in(format!("{v}.{prop}"), nulls.clone()),
            ])
        });
        parts.push(match target {
            Target::Related(alias) => {
                Predicate::or(vec![Predicate::expr(format!("size({alias}) = 0")), on_node])
            }
            Target::Primary(_) => on_node,
        });
    }
    Predicate::or(parts)
}

/// Parse integer filter values, rejecting anything else.
pub fn integer_values(field: &str, values: &[String]) -> Result<Vec<i64>> {
    values
        .iter()
        .map(|v| {
            v.trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .parse::<i64>()
                .map_err(|_| {
                    FederationError::invalid_parameter(field, format!("'{v}' is not an integer"))
                })
        })
        .collect()
}

/// Integer form of `prop` in `[ints]` on the target. Quoted numbers
/// compare as the integers [`RowView::int`] reads.
pub fn integer_predicate(params: &mut ParamBag, target: Target<'_>, prop: &str, ints: Vec<i64>) -> Predicate {
    let p = params.bind(ints);
    target.wrap(|v| Predicate::is_in(integer_text(&format!("{v}.{prop}")), p.clone()))
}

/// Compile the fields every entity shares: `identifiers`, `depositions` and
/// unharmonized keys. Returns `false` when `field` is entity-specific.
pub fn compile_shared<S: EntitySchema>(
    field: &str,
    values: &[String],
    params: &mut ParamBag,
    out: &mut CompiledFilters,
) -> bool {
    if let FieldRef::Unharmonized(key) = parse_field(field) {
        let p = params.bind(values.to_vec());
        out.primary.push(Predicate::is_in(format!("toString({})", property(S::VAR, key)), p));
        return true;
    }
    match field {
        "identifiers" => {
            let p = params.bind(values.to_vec());
            out.primary.push(Predicate::is_in(S::ID, p));
            true
        }
        "depositions" => {
            let p = params.bind(values.to_vec());
            out.related.push(Predicate::AnyIn { list_expr: "studies".to_string(), param: p });
            true
        }
        _ => false,
    }
}

/// A harmonized field that passed the allowlist but has no compiler.
pub fn unsupported(entity: EntityType, field: &str) -> FederationError {
    FederationError::UnsupportedField {
        entity,
        field: field.to_string(),
        usage: FieldUse::Filter,
    }
}

/// Count value of an unharmonized key on the primary node. `None` when
/// `field` is harmonized.
pub fn unharmonized_count_value(row: &RowView<'_>, field: &str) -> Option<Vec<String>> {
    match parse_field(field) {
        FieldRef::Unharmonized(key) => Some(row.text(key).into_iter().collect()),
        FieldRef::Harmonized(_) => None,
    }
}

// ── Row access ───────────────────────────────────────────────────────────────

/// Read helpers over one result row.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    row: &'a Record,
}

static NULL: Value = Value::Null;

impl<'a> RowView<'a> {
    pub fn new(row: &'a Record) -> Self {
        Self { row }
    }

    pub fn get(&self, key: &str) -> &'a Value {
        self.row.get(key).unwrap_or(&NULL)
    }

    pub fn id(&self) -> Option<String> {
        clean_text(self.get("id"))
    }

    /// Property of the primary node.
    pub fn prop(&self, name: &str) -> &'a Value {
        self.get("props").get(name).unwrap_or(&NULL)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        clean_text(self.prop(name))
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        clean_int(self.prop(name))
    }

    pub fn tokens(&self, name: &str) -> Vec<String> {
        split_tokens(self.prop(name))
    }

    /// A list-valued column; anything else reads as empty.
    pub fn list(&self, key: &str) -> &'a [Value] {
        self.get(key).as_array().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn strings(&self, key: &str) -> Vec<String> {
        self.list(key).iter().filter_map(clean_text).collect()
    }

    pub fn studies(&self) -> Vec<String> {
        self.strings("studies")
    }
}

/// Text of `prop` on every node map in `nodes`.
pub fn node_texts(nodes: &[Value], prop: &str) -> Vec<String> {
    nodes
        .iter()
        .filter_map(|n| n.get(prop))
        .filter_map(clean_text)
        .collect()
}

/// Sorted distinct values.
pub fn distinct(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

/// Unharmonized properties on a node that the allowlist exposes.
pub fn unharmonized(
    catalog: &Catalog,
    entity: EntityType,
    props: &Value,
) -> Option<crate::model::Unharmonized> {
    let map = props.as_object()?;
    let out: crate::model::Unharmonized = catalog
        .allowlist
        .unharmonized_fields(entity)
        .into_iter()
        .filter_map(|key| {
            let v = map.get(key)?;
            clean_text(v)?;
            Some((key.to_string(), crate::model::ValueField::new(v.clone())))
        })
        .collect();
    (!out.is_empty()).then_some(out)
}
