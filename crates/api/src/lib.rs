//! Taleforge API server library.
//!
//! Exposes config, state, error handling, the run engine, and routes so the
//! binary entrypoint and integration tests share one router.

pub mod auth;
pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
