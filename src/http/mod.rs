//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body buffering, X-Forwarded-For)
//!     → websocket.rs (upgrades only: straight to the app origin)
//!     → dispatch.rs (routing decision, upstream call, 404 fallbacks)
//!         → client.rs (hyper for http://, reqwest for https://)
//!     → response.rs (status override, header rules, generated pages)
//!     → Send to client
//!
//! static_origin.rs serves the publish dir as the app origin when no
//! framework dev server runs.
//! ```

pub mod client;
pub mod dispatch;
pub mod request;
pub mod response;
pub mod server;
pub mod static_origin;
pub mod websocket;

pub use client::{UpstreamClient, UpstreamError};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
