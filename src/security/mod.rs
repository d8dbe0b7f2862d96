//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-For)
//!     → [rule matched with a JWT exception]
//!     → role_gate.rs (nf_jwt cookie → roles → authorized / not found / 400)
//!     → Pass to dispatch
//! ```
//!
//! # Design Decisions
//! - Gate failures always end in a definite response, never an error
//! - Token signatures are not verified (localhost trust boundary)

pub mod headers;
pub mod role_gate;

pub use role_gate::{GateOutcome, RoleGate, TokenError};
