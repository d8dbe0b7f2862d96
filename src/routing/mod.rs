//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query, headers, cookies)
//!     → engine.rs short_circuit (functions / addons)
//!     → tables.rs snapshot → rules.rs first matching rule
//!     → engine.rs decision (role gate, redirect, shadowing, rewrite)
//!     → Return: Dispatch(Target) | Redirect | NotFound | InvalidToken
//!
//! Table Compilation (at startup and on file change):
//!     _redirects + inline rules → RuleTable
//!     project _headers + publish _headers → HeaderRules
//!     → published as immutable snapshots
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; a reload swaps whole snapshots
//! - No regex: literal, `:param` and trailing `*` segments only
//! - First matching rule wins (file order, then inline order)
//! - Per-request state lives in `RequestContext`, never in shared tables

pub mod addons;
pub mod context;
pub mod engine;
pub mod header_rules;
pub mod matcher;
pub mod rewrite;
pub mod rules;
pub mod static_resolver;
pub mod tables;
pub mod target;

pub use context::RequestContext;
pub use engine::{Decision, DecisionEngine, EngineSettings};
pub use header_rules::HeaderRules;
pub use rules::{Rule, RuleTable};
pub use tables::{TableSet, TableSources};
pub use target::{Target, TargetKind};
