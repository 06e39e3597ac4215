//! Entity endpoints: listing, lookup, count-by-field and summary.

use axum::{
    extract::{Path, Query, State},
    http::{Method, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::info;

use ccdi_common::{EntityType, FederationError};
use ccdi_query::FilterSet;

use crate::error::ApiError;
use crate::state::SharedState;

// ── Request parsing ──────────────────────────────────────────────────────────

/// Raw query-string pairs, split into pagination and filters.
#[derive(Debug, Default, PartialEq)]
pub struct ListParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub filters: FilterSet,
}

impl ListParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, FederationError> {
        let mut page = None;
        let mut per_page = None;
        let mut rest = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match key.as_str() {
                "page" => page = Some(parse_positive("page", &value)?),
                "per_page" => per_page = Some(parse_positive("per_page", &value)?),
                _ => rest.push((key, value)),
            }
        }
        Ok(Self { page, per_page, filters: FilterSet::from_pairs(rest) })
    }
}

fn parse_positive(param: &str, value: &str) -> Result<u64, FederationError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| FederationError::invalid_parameter(param, format!("'{value}' is not a positive integer")))
}

fn entity(method: &Method, uri: &Uri, name: &str) -> Result<EntityType, ApiError> {
    EntityType::parse(name).ok_or_else(|| ApiError::InvalidRoute {
        method: method.to_string(),
        route: uri.path().to_string(),
    })
}

// ── Responses ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PageCounts {
    pub all: u64,
    pub current: usize,
}

#[derive(Debug, Serialize)]
pub struct PageSummary {
    pub counts: PageCounts,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub summary: PageSummary,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    fn new(all: u64, data: Vec<T>) -> Self {
        Self { summary: PageSummary { counts: PageCounts { all, current: data.len() } }, data }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /api/v1/{entity}
pub async fn list(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    Path(name): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let entity = entity(&method, &uri, &name)?;
    let params = ListParams::from_pairs(pairs)?;
    info!(%entity, filters = ?params.filters, page = ?params.page, per_page = ?params.per_page, "list request");

    let services = &state.services;
    let (page, per_page, filters) = (params.page, params.per_page, &params.filters);
    let response = match entity {
        EntityType::Subject => {
            let data = services.subject.list(filters, page, per_page).await?;
            let all = services.subject.summary(filters).await?.counts.total;
            Json(Page::new(all, data)).into_response()
        }
        EntityType::Sample => {
            let data = services.sample.list(filters, page, per_page).await?;
            let all = services.sample.summary(filters).await?.counts.total;
            Json(Page::new(all, data)).into_response()
        }
        EntityType::File => {
            let data = services.file.list(filters, page, per_page).await?;
            let all = services.file.summary(filters).await?.counts.total;
            Json(Page::new(all, data)).into_response()
        }
    };
    Ok(response)
}

/// GET /api/v1/{entity}/{organization}/{namespace}/{name}
pub async fn show(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    Path((name, organization, namespace, id)): Path<(String, String, String, String)>,
) -> Result<Response, ApiError> {
    let entity = entity(&method, &uri, &name)?;
    let services = &state.services;
    let response = match entity {
        EntityType::Subject => {
            Json(services.subject.get_by_identifier(&organization, &namespace, &id).await?)
                .into_response()
        }
        EntityType::Sample => {
            Json(services.sample.get_by_identifier(&organization, &namespace, &id).await?)
                .into_response()
        }
        EntityType::File => {
            Json(services.file.get_by_identifier(&organization, &namespace, &id).await?)
                .into_response()
        }
    };
    Ok(response)
}

/// GET /api/v1/{entity}/by/{field}/count
pub async fn count_by_field(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    Path((name, field)): Path<(String, String)>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let entity = entity(&method, &uri, &name)?;
    let filters = FilterSet::from_pairs(pairs);
    info!(%entity, %field, ?filters, "count request");
    let services = &state.services;
    let result = match entity {
        EntityType::Subject => services.subject.count_by_field(&field, &filters).await?,
        EntityType::Sample => services.sample.count_by_field(&field, &filters).await?,
        EntityType::File => services.file.count_by_field(&field, &filters).await?,
    };
    Ok(Json(result).into_response())
}

/// GET /api/v1/{entity}/summary
pub async fn summary(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    Path(name): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let entity = entity(&method, &uri, &name)?;
    let filters = FilterSet::from_pairs(pairs);
    let services = &state.services;
    let result = match entity {
        EntityType::Subject => services.subject.summary(&filters).await?,
        EntityType::Sample => services.sample.summary(&filters).await?,
        EntityType::File => services.file.summary(&filters).await?,
    };
    Ok(Json(result).into_response())
}

/// Any route not matched above.
pub async fn invalid_route(method: Method, uri: Uri) -> ApiError {
    ApiError::InvalidRoute { method: method.to_string(), route: uri.path().to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_pagination_is_split_from_filters() {
        let params =
            ListParams::from_pairs(pairs(&[("page", "2"), ("sex", "F"), ("per_page", "10")])).unwrap();
        assert_eq!(params.page, Some(2));
        assert_eq!(params.per_page, Some(10));
        assert_eq!(params.filters, FilterSet::from_pairs(pairs(&[("sex", "F")])));
    }

    #[test]
    fn test_non_numeric_page_rejected() {
        let err = ListParams::from_pairs(pairs(&[("page", "two")])).unwrap_err();
        assert!(matches!(err, FederationError::InvalidParameters { .. }));
        assert!(ListParams::from_pairs(pairs(&[("per_page", "-1")])).is_err());
    }
}
