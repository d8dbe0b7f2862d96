//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an upstream or a startup probe:
//!     → timeouts.rs (deadline around the whole call)
//!     → On expiry: TimeoutError → 504 (request) or exit 1 (startup)
//! ```
//!
//! # Design Decisions
//! - Every upstream call has a deadline
//! - No retries: a failed call fails only its own request; alternative-path
//!   re-dispatch is routing, not error recovery

pub mod timeouts;

pub use timeouts::{with_timeout, TimeoutError};
