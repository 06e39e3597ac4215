//! ccdi-common — Shared types, errors, vocabularies and configuration used
//! across all CCDI federation crates.

pub mod allowlist;
pub mod entity;
pub mod error;
pub mod mappings;
pub mod sentinel;
pub mod settings;
pub mod vocab;

pub use allowlist::FieldAllowlist;
pub use entity::{EntityType, ORGANIZATION};
pub use error::{FederationError, FieldUse, Result};
pub use mappings::{ReverseMapped, ValueMappingRegistry};
pub use settings::Settings;
pub use vocab::{Ethnicity, FileTypes, Race, VitalStatus};
