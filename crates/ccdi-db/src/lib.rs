//! CCDI graph store layer
//!
//! A small seam between the query compilers and the Bolt driver: queries go
//! in as text plus parameters, rows come back as JSON maps.
//!
//! # Example
//!
//! ```rust,no_run
//! use ccdi_common::Settings;
//! use ccdi_db::{CypherQuery, GraphSession, MemgraphSession, RetryExecutor, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default();
//!     let session = MemgraphSession::connect(&settings.database).await?;
//!     let graph = RetryExecutor::new(session, RetryPolicy::from(&settings.query));
//!     let rows = graph.run(&CypherQuery::new("MATCH (st:study) RETURN st.study_id AS id")).await?;
//!     println!("{} studies", rows.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memgraph;
pub mod query;
pub mod retry;
pub mod session;

pub use error::{DbError, Result};
pub use memgraph::MemgraphSession;
pub use query::{CypherQuery, ParamValue, QueryParams};
pub use retry::{RetryExecutor, RetryPolicy};
pub use session::{GraphSession, Record};
