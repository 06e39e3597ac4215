//! Per-entity repository: compile, execute, map.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use ccdi_common::Result;
use ccdi_db::{CypherQuery, GraphSession, Record};

use crate::aggregate::AggregationEngine;
use crate::catalog::Catalog;
use crate::filters::FilterSet;
use crate::model::{CountResult, Summary};
use crate::schema::{self, EntitySchema, RowView};

pub struct Repository<S: EntitySchema> {
    schema: S,
    graph: Arc<dyn GraphSession>,
    catalog: Arc<Catalog>,
    engine: AggregationEngine,
}

impl<S: EntitySchema> Repository<S> {
    pub fn new(schema: S, graph: Arc<dyn GraphSession>, catalog: Arc<Catalog>) -> Self {
        Self { schema, graph, catalog, engine: AggregationEngine::new() }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn run(&self, query: &CypherQuery) -> Result<Vec<Record>> {
        debug!(entity = %S::ENTITY, query = %query.text, params = query.params.len(), "running query");
        let rows = self.graph.run(query).await?;
        debug!(entity = %S::ENTITY, rows = rows.len(), "query returned");
        Ok(rows)
    }

    /// One page of records ordered by business identifier.
    #[instrument(skip(self), fields(entity = %S::ENTITY))]
    pub async fn list(&self, filters: &FilterSet, offset: u64, limit: u64) -> Result<Vec<S::Record>> {
        let Some(query) = schema::list_query(&self.schema, &self.catalog, filters, offset, limit)?
        else {
            return Ok(Vec::new());
        };
        let rows = self.run(&query).await?;
        rows.iter()
            .map(|row| self.schema.to_record(&self.catalog, &RowView::new(row), None))
            .collect()
    }

    /// The entity named `name` within study `namespace`, if any.
    #[instrument(skip(self), fields(entity = %S::ENTITY))]
    pub async fn find(&self, namespace: &str, name: &str) -> Result<Option<S::Record>> {
        let query = schema::lookup_query(&self.schema, namespace, name);
        let rows = self.run(&query).await?;
        rows.first()
            .map(|row| self.schema.to_record(&self.catalog, &RowView::new(row), Some(namespace)))
            .transpose()
    }

    #[instrument(skip(self), fields(entity = %S::ENTITY))]
    pub async fn count_by_field(&self, field: &str, filters: &FilterSet) -> Result<CountResult> {
        let Some(query) = schema::count_query(&self.schema, &self.catalog, field, filters)? else {
            return Ok(CountResult::empty());
        };
        let rows = self.run(&query).await?;
        let pairs = rows.iter().filter_map(|row| {
            let view = RowView::new(row);
            let Some(id) = view.id() else {
                warn!(entity = %S::ENTITY, "skipping row without an identifier");
                return None;
            };
            Some((id, self.schema.count_values(&self.catalog, field, &view)))
        });
        let single = self.schema.single_valued(field);
        self.engine.aggregate(field, pairs, &self.schema.emission(field), single)
    }

    #[instrument(skip(self), fields(entity = %S::ENTITY))]
    pub async fn summary(&self, filters: &FilterSet) -> Result<Summary> {
        let Some(query) = schema::summary_query(&self.schema, &self.catalog, filters)? else {
            return Ok(Summary::new(0));
        };
        let rows = self.run(&query).await?;
        let total = rows
            .first()
            .and_then(|row| row.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(Summary::new(total))
    }
}
