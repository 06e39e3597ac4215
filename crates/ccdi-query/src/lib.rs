//! ccdi-query — Filter compilation, record mapping and aggregation for the
//! Subject, Sample and File entities.
//!
//! Requests flow `EntityService` → `Repository` → `EntitySchema` (compile)
//! → `GraphSession` (execute) → `EntitySchema` (map or count).

pub mod aggregate;
pub mod cache;
pub mod catalog;
pub mod cypher;
pub mod derive;
pub mod file;
pub mod filters;
pub mod model;
pub mod repository;
pub mod sample;
pub mod schema;
pub mod service;
pub mod subject;

pub use aggregate::{AggregationEngine, Emission};
pub use cache::{CacheService, MokaCache, NoCache};
pub use catalog::Catalog;
pub use file::FileSchema;
pub use filters::{FilterSet, FilterValue};
pub use model::{CountResult, File, Sample, Subject, Summary, ValueCount};
pub use repository::Repository;
pub use sample::SampleSchema;
pub use schema::EntitySchema;
pub use service::{
    EntityService, FileService, SampleService, ServiceConfig, Services, SubjectService,
};
pub use subject::SubjectSchema;
