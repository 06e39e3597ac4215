//! Structured Cypher: a predicate tree and a clause list, rendered once.
//!
//! Values never appear in query text. Every literal goes through a
//! [`ParamBag`], which hands back the `$pN` placeholder to embed.

use ccdi_common::sentinel::{INVALID_VALUE, NUMERIC_SENTINEL};
use ccdi_db::{CypherQuery, ParamValue, QueryParams};

// ── Parameters ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct ParamBag {
    params: QueryParams,
    next: usize,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value under a fresh name and return its `$name` placeholder.
    pub fn bind(&mut self, value: impl Into<ParamValue>) -> String {
        let name = format!("p{}", self.next);
        self.next += 1;
        self.params.insert(name.clone(), value.into());
        format!("${name}")
    }

    /// Bind under a fixed name (pagination, lookup keys).
    pub fn bind_named(&mut self, name: &str, value: impl Into<ParamValue>) -> String {
        self.params.insert(name.to_string(), value.into());
        format!("${name}")
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_params(self) -> QueryParams {
        self.params
    }
}

// ── Expressions ──────────────────────────────────────────────────────────────

/// Backtick-quote a property name for use after `var.`.
pub fn quote_property(name: &str) -> String {
    format!("`{}`", name.replace('`', ""))
}

pub fn property(var: &str, name: &str) -> String {
    format!("{var}.{}", quote_property(name))
}

/// Trimmed `;`-tokens of a property that may hold a string or a list of
/// strings, with blank and sentinel tokens dropped.
pub fn token_list(expr: &str) -> String {
    format!(
        "[t IN reduce(acc = [], tv IN (CASE WHEN {expr} IS NULL THEN [] \
         WHEN valueType({expr}) STARTS WITH 'LIST' THEN {expr} ELSE [{expr}] END) \
         | acc + split(toString(tv), ';')) WHERE {} | trim(t)]",
        not_sentinel_text("t")
    )
}

/// Cypher boolean: the string `expr` is not blank, `-999` or the
/// "Invalid value" marker.
pub fn not_sentinel_text(expr: &str) -> String {
    format!(
        "trim({expr}) <> '' AND toLower(trim({expr})) <> '{INVALID_VALUE}' \
         AND trim({expr}) <> '{NUMERIC_SENTINEL}'"
    )
}

/// Cypher integer of a number or a possibly quoted numeric string; null
/// when it does not parse.
pub fn integer_text(expr: &str) -> String {
    format!("toInteger(replace(replace(trim(toString({expr})), '\"', ''), \"'\", ''))")
}

// ── Predicates ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    False,
    /// `expr = $p`
    Eq { expr: String, param: String },
    /// `expr IN $p`
    In { expr: String, param: String },
    /// Case-insensitive equality against a single value.
    EqCi { expr: String, param: String },
    /// Case-insensitive substring.
    ContainsCi { expr: String, param: String },
    IsNull(String),
    IsNotNull(String),
    /// Some element of the parameter list occurs in `list_expr`.
    AnyIn { list_expr: String, param: String },
    /// `ANY(var IN list WHERE body)`
    Any { var: String, list: String, body: Box<Predicate> },
    /// Literal boolean text. Caller values enter only as bound placeholders.
    Expr(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(expr: impl Into<String>, param: impl Into<String>) -> Self {
        Predicate::Eq { expr: expr.into(), param: param.into() }
    }

    pub fn is_in(expr: impl Into<String>, param: impl Into<String>) -> Self {
        Predicate::In { expr: expr.into(), param: param.into() }
    }

    pub fn any(var: &str, list: &str, body: Predicate) -> Self {
        Predicate::Any { var: var.to_string(), list: list.to_string(), body: Box::new(body) }
    }

    pub fn expr(text: impl Into<String>) -> Self {
        Predicate::Expr(text.into())
    }

    /// Conjunction with `True` dropped and nested `And`s flattened.
    pub fn and(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut out = Vec::new();
        for p in parts {
            match p {
                Predicate::True => {}
                Predicate::And(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Predicate::True,
            1 => out.remove(0),
            _ => Predicate::And(out),
        }
    }

    /// Disjunction with `False` dropped and nested `Or`s flattened.
    pub fn or(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut out = Vec::new();
        for p in parts {
            match p {
                Predicate::False => {}
                Predicate::Or(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Predicate::False,
            1 => out.remove(0),
            _ => Predicate::Or(out),
        }
    }

    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Predicate::True)
    }

    pub fn render(&self) -> String {
        match self {
            Predicate::True => "true".to_string(),
            Predicate::False => "false".to_string(),
            Predicate::Eq { expr, param } => format!("{expr} = {param}"),
            Predicate::In { expr, param } => format!("{expr} IN {param}"),
            Predicate::EqCi { expr, param } => {
                format!("toLower(toString({expr})) = toLower({param})")
            }
            Predicate::ContainsCi { expr, param } => {
                format!("toLower(toString({expr})) CONTAINS toLower({param})")
            }
            Predicate::IsNull(expr) => format!("{expr} IS NULL"),
            Predicate::IsNotNull(expr) => format!("{expr} IS NOT NULL"),
            Predicate::AnyIn { list_expr, param } => {
                format!("ANY(v IN {param} WHERE v IN {list_expr})")
            }
            Predicate::Any { var, list, body } => {
                format!("ANY({var} IN {list} WHERE {})", body.render())
            }
            Predicate::Expr(text) => text.clone(),
            Predicate::And(parts) => join(parts, " AND "),
            Predicate::Or(parts) => join(parts, " OR "),
            Predicate::Not(inner) => format!("NOT ({})", inner.render()),
        }
    }
}

fn join(parts: &[Predicate], sep: &str) -> String {
    parts
        .iter()
        .map(|p| match p {
            Predicate::And(_) | Predicate::Or(_) => format!("({})", p.render()),
            _ => p.render(),
        })
        .collect::<Vec<_>>()
        .join(sep)
}

// ── Clauses ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match { pattern: String, optional: bool, filter: Predicate },
    With { items: Vec<String>, distinct: bool, filter: Predicate },
    Return { items: Vec<String>, distinct: bool },
    OrderBy(Vec<String>),
    Skip(String),
    Limit(String),
}

impl Clause {
    fn render(&self) -> String {
        match self {
            Clause::Match { pattern, optional, filter } => {
                let kw = if *optional { "OPTIONAL MATCH" } else { "MATCH" };
                with_where(format!("{kw} {pattern}"), filter)
            }
            Clause::With { items, distinct, filter } => {
                let kw = if *distinct { "WITH DISTINCT" } else { "WITH" };
                with_where(format!("{kw} {}", items.join(", ")), filter)
            }
            Clause::Return { items, distinct } => {
                let kw = if *distinct { "RETURN DISTINCT" } else { "RETURN" };
                format!("{kw} {}", items.join(", "))
            }
            Clause::OrderBy(keys) => format!("ORDER BY {}", keys.join(", ")),
            Clause::Skip(param) => format!("SKIP {param}"),
            Clause::Limit(param) => format!("LIMIT {param}"),
        }
    }
}

fn with_where(head: String, filter: &Predicate) -> String {
    if filter.is_true() {
        head
    } else {
        format!("{head}\nWHERE {}", filter.render())
    }
}

/// Ordered clause list plus the parameters its predicates reference.
#[derive(Debug, Default, Clone)]
pub struct QueryBuilder {
    clauses: Vec<Clause>,
    pub params: ParamBag,
}

impl QueryBuilder {
    pub fn new(params: ParamBag) -> Self {
        Self { clauses: Vec::new(), params }
    }

    pub fn push(&mut self, clause: Clause) -> &mut Self {
        self.clauses.push(clause);
        self
    }

    pub fn match_(&mut self, pattern: impl Into<String>, filter: Predicate) -> &mut Self {
        self.push(Clause::Match { pattern: pattern.into(), optional: false, filter })
    }

    pub fn optional_match(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.push(Clause::Match { pattern: pattern.into(), optional: true, filter: Predicate::True })
    }

    pub fn with(&mut self, items: Vec<String>, filter: Predicate) -> &mut Self {
        self.push(Clause::With { items, distinct: false, filter })
    }

    pub fn return_(&mut self, items: Vec<String>) -> &mut Self {
        self.push(Clause::Return { items, distinct: false })
    }

    pub fn order_by(&mut self, keys: Vec<String>) -> &mut Self {
        self.push(Clause::OrderBy(keys))
    }

    pub fn skip(&mut self, offset: u64) -> &mut Self {
        let p = self.params.bind_named("offset", offset as i64);
        self.push(Clause::Skip(p))
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        let p = self.params.bind_named("limit", limit as i64);
        self.push(Clause::Limit(p))
    }

    pub fn build(self) -> CypherQuery {
        let text = self
            .clauses
            .iter()
            .map(Clause::render)
            .collect::<Vec<_>>()
            .join("\n");
        CypherQuery::with_params(text, self.params.into_params())
    }
}
