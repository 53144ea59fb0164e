//! Penguin species prediction service.
//!
//! Loads a trained XGBoost model and its schema metadata once at startup and
//! serves predictions over HTTP.

/// HTTP routes and request validation.
pub mod api;
/// Application directory helpers.
pub mod app_dirs;
/// Server configuration.
pub mod config;
pub(crate) mod http_client;
/// Logging setup.
pub mod logging;
/// Model artifacts: sources, loading and the tree ensemble.
pub mod model;
/// Feature schema: records, encoding and column reconciliation.
pub mod schema;
/// Prediction orchestration.
pub mod service;
