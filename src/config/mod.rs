//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! devproxy.toml + CLI flags
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DevConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On rule/header file change:
//!     watcher.rs detects change
//!     → ReloadEvent sent to the server task
//!     → routing::tables rebuilds the affected snapshot
//!     → atomic swap of Arc<RuleTable> / Arc<HeaderRules>
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the rule and header tables reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DevConfig, ListenerConfig, ObservabilityConfig, SecurityConfig, SiteConfig, TimeoutConfig,
    UpstreamConfig, WatchConfig,
};
pub use watcher::{ReloadEvent, TableWatcher};
