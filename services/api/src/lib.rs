//! Deal and user management API
//!
//! A small multi-tenant backend managing users and deals. Callers
//! authenticate with a bearer token; every deal-scoped operation is gated
//! by an authorization predicate over the caller, the deal's creator, and
//! its participant set.

pub mod access;
pub mod config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repositories;
pub mod routes;
pub mod state;

pub use state::AppState;
