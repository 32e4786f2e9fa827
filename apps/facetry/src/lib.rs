//! # facetry
//!
//! HTTP service around the Facetry dispatch registry.
//!
//! - [`api`]: axum router, handlers and middleware
//! - [`config`]: TOML configuration, environment overrides and startup wiring

pub mod api;
pub mod config;
