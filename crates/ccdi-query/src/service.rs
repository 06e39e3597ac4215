//! Entity services: request validation, pagination and cached aggregates.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use ccdi_common::settings::{CacheSettings, PaginationSettings};
use ccdi_common::{FederationError, Result, Settings, ORGANIZATION};

use ccdi_db::GraphSession;

use crate::cache::{cache_key, CacheService};
use crate::catalog::Catalog;
use crate::file::FileSchema;
use crate::filters::FilterSet;
use crate::model::{CountResult, Summary};
use crate::repository::Repository;
use crate::sample::SampleSchema;
use crate::schema::EntitySchema;
use crate::subject::SubjectSchema;

/// Characters an identifier component may not contain.
const FORBIDDEN_IDENTIFIER_CHARS: [char; 4] = ['.', '/', '\\', ' '];

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub default_per_page: u64,
    pub max_per_page: u64,
    pub count_ttl: Duration,
    pub summary_ttl: Duration,
}

impl ServiceConfig {
    pub fn new(pagination: &PaginationSettings, cache: &CacheSettings) -> Self {
        Self {
            default_per_page: pagination.default_per_page,
            max_per_page: pagination.max_per_page,
            count_ttl: cache.count_ttl(),
            summary_ttl: cache.summary_ttl(),
        }
    }
}

impl From<&Settings> for ServiceConfig {
    fn from(settings: &Settings) -> Self {
        Self::new(&settings.pagination, &settings.cache)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

pub struct EntityService<S: EntitySchema> {
    repo: Repository<S>,
    cache: Arc<dyn CacheService>,
    config: ServiceConfig,
}

impl<S: EntitySchema> EntityService<S> {
    pub fn new(repo: Repository<S>, cache: Arc<dyn CacheService>, config: ServiceConfig) -> Self {
        Self { repo, cache, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// One page of entities. `page` is 1-based; `per_page` is capped at the
    /// configured maximum.
    #[instrument(skip(self), fields(entity = %S::ENTITY))]
    pub async fn list(
        &self,
        filters: &FilterSet,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> Result<Vec<S::Record>> {
        let page = page.unwrap_or(1);
        let per_page = per_page.unwrap_or(self.config.default_per_page);
        if page == 0 {
            return Err(FederationError::invalid_parameter("page", "must be at least 1"));
        }
        if per_page == 0 {
            return Err(FederationError::invalid_parameter("per_page", "must be at least 1"));
        }
        let limit = per_page.min(self.config.max_per_page);
        let offset = (page - 1).saturating_mul(limit);
        self.repo.list(filters, offset, limit).await
    }

    #[instrument(skip(self), fields(entity = %S::ENTITY))]
    pub async fn get_by_identifier(
        &self,
        organization: &str,
        namespace: &str,
        name: &str,
    ) -> Result<S::Record> {
        for (param, value) in [("organization", organization), ("namespace", namespace), ("name", name)] {
            validate_identifier_part(param, value)?;
        }
        let not_found = || FederationError::NotFound {
            entity: S::ENTITY,
            identifier: format!("{organization}/{namespace}/{name}"),
        };
        if organization != ORGANIZATION {
            return Err(not_found());
        }
        self.repo.find(namespace, name).await?.ok_or_else(not_found)
    }

    #[instrument(skip(self), fields(entity = %S::ENTITY))]
    pub async fn count_by_field(&self, field: &str, filters: &FilterSet) -> Result<CountResult> {
        let key = cache_key(S::ENTITY, "count", Some(field), filters);
        if let Some(hit) = self.cached::<CountResult>(&key).await {
            return Ok(hit);
        }
        let result = self.repo.count_by_field(field, filters).await?;
        self.store(&key, &result, self.config.count_ttl).await?;
        Ok(result)
    }

    #[instrument(skip(self), fields(entity = %S::ENTITY))]
    pub async fn summary(&self, filters: &FilterSet) -> Result<Summary> {
        let key = cache_key(S::ENTITY, "summary", None, filters);
        if let Some(hit) = self.cached::<Summary>(&key).await {
            return Ok(hit);
        }
        let result = self.repo.summary(filters).await?;
        self.store(&key, &result, self.config.summary_ttl).await?;
        Ok(result)
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.cache.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.cache.set(key, bytes, ttl).await;
        Ok(())
    }
}

pub type SubjectService = EntityService<SubjectSchema>;
pub type SampleService = EntityService<SampleSchema>;
pub type FileService = EntityService<FileSchema>;

/// One service per entity over a shared graph session, catalog and cache.
pub struct Services {
    pub subject: SubjectService,
    pub sample: SampleService,
    pub file: FileService,
}

impl Services {
    pub fn new(
        graph: Arc<dyn GraphSession>,
        catalog: Arc<Catalog>,
        cache: Arc<dyn CacheService>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            subject: EntityService::new(
                Repository::new(SubjectSchema, Arc::clone(&graph), Arc::clone(&catalog)),
                Arc::clone(&cache),
                config.clone(),
            ),
            sample: EntityService::new(
                Repository::new(SampleSchema, Arc::clone(&graph), Arc::clone(&catalog)),
                Arc::clone(&cache),
                config.clone(),
            ),
            file: EntityService::new(Repository::new(FileSchema, graph, catalog), cache, config),
        }
    }
}

fn validate_identifier_part(param: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(FederationError::invalid_parameter(param, "must not be empty"));
    }
    if value.contains(&FORBIDDEN_IDENTIFIER_CHARS[..]) {
        return Err(FederationError::invalid_parameter(
            param,
            format!("'{value}' contains a forbidden character"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier_part("name", "PAVJNP").is_ok());
        assert!(validate_identifier_part("name", "").is_err());
        assert!(validate_identifier_part("name", "a.b").is_err());
        assert!(validate_identifier_part("name", "a/b").is_err());
        assert!(validate_identifier_part("name", "a\\b").is_err());
        assert!(validate_identifier_part("name", "a b").is_err());
    }

    #[test]
    fn test_config_from_settings() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_per_page, 1000);
        assert_eq!(config.count_ttl, Duration::from_secs(300));
        assert_eq!(config.summary_ttl, Duration::from_secs(600));
    }
}
