//! Local development routing proxy.
//!
//! Sits in front of a site's dev server and reproduces the hosting
//! platform's routing: redirect and rewrite rules, role-gated paths,
//! serverless function and addon paths, static fallbacks and response
//! header rules.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::DevConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
