//! HTTP handlers for all routes.

pub mod entities;
pub mod health;
