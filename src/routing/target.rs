//! Resolved dispatch targets.

use std::fmt;

use axum::http::StatusCode;

/// Which kind of backend serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Local functions runtime.
    Function,
    /// Third-party addon backend.
    Addon,
    /// Absolute URL from a rule's `to`.
    External,
    /// Default origin, with a rewritten path.
    Internal,
    /// Default origin, with the request path unchanged.
    Static,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Function => "function",
            TargetKind::Addon => "addon",
            TargetKind::External => "external",
            TargetKind::Internal => "internal",
            TargetKind::Static => "static",
        }
    }

    /// Default-origin targets take part in alternative-path retries.
    pub fn is_default_origin(&self) -> bool {
        matches!(self, TargetKind::Internal | TargetKind::Static)
    }

    /// Remote targets are addressed by their own `Host`.
    pub fn rewrites_host(&self) -> bool {
        matches!(self, TargetKind::Addon | TargetKind::External)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request goes, and what status the final response should carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: TargetKind,
    /// Scheme + authority (and, for addons, a base path) without a trailing slash.
    pub origin: String,
    /// Path and query sent to the origin.
    pub path_and_query: String,
    /// Rule status replacing the upstream status on the final response.
    pub status: Option<StatusCode>,
}

impl Target {
    pub fn new(kind: TargetKind, origin: impl Into<String>, path_and_query: impl Into<String>) -> Self {
        Self {
            kind,
            origin: origin.into(),
            path_and_query: path_and_query.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: Option<StatusCode>) -> Self {
        self.status = status;
        self
    }

    /// Full upstream URL.
    pub fn url(&self) -> String {
        format!("{}{}", self.origin, self.path_and_query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_upstream_url() {
        let target = Target::new(TargetKind::Function, "http://localhost:34567", "/.netlify/functions/foo?x=1");
        assert_eq!(target.url(), "http://localhost:34567/.netlify/functions/foo?x=1");
        assert!(!target.kind.is_default_origin());
        assert!(TargetKind::Static.is_default_origin());
        assert!(TargetKind::External.rewrites_host());
    }
}
