//! ccdi-web — HTTP surface of the CCDI federation node.
//!
//! Thin axum layer over `ccdi-query` services: query parameters become a
//! `FilterSet`, errors become the `{"errors": [...]}` envelope.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::{AppState, SharedState};
