//! Responses the proxy generates itself, and finishing of upstream ones.
//!
//! # Design Decisions
//! - A rule status replaces the upstream status; the body is kept
//! - Hop-by-hop headers never reach the client
//! - Header rules apply to every response; a proxied response keeps its own
//!   value when a rule names a header the backend already sent

use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::client::UpstreamError;
use crate::security::headers::strip_hop_by_hop;
use crate::security::role_gate::INVALID_TOKEN_BODY;

pub const NOT_FOUND_PAGE: &str = "404.html";

pub fn redirect(status: StatusCode, location: &str) -> Response {
    let Ok(value) = HeaderValue::from_str(location) else {
        tracing::warn!(location, "Redirect target is not a valid header value");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect target").into_response();
    };
    (
        status,
        [
            (header::LOCATION, value),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        format!("Redirecting to {location}"),
    )
        .into_response()
}

/// The site's `404.html`, or a plain body when it has none.
pub async fn not_found(publish_dir: &Path) -> Response {
    match tokio::fs::read(publish_dir.join(NOT_FOUND_PAGE)).await {
        Ok(page) => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            page,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

pub fn invalid_token() -> Response {
    (StatusCode::BAD_REQUEST, INVALID_TOKEN_BODY).into_response()
}

pub fn upstream_error(error: &UpstreamError) -> Response {
    let status = error.status();
    let body = if status == StatusCode::GATEWAY_TIMEOUT {
        "Upstream request timed out"
    } else {
        "Upstream request failed"
    };
    (status, body).into_response()
}

pub fn payload_too_large() -> Response {
    (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
}

/// Who produced a response, which decides whether rule headers may replace
/// headers already on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Relayed from a backend; its own headers take precedence.
    Upstream,
    /// Built by the proxy; rule headers replace ours.
    Generated,
}

/// Apply the rule status and header rules to a response bound for the client.
pub fn finish(
    mut response: Response<Body>,
    source: Source,
    status: Option<StatusCode>,
    rule_headers: HeaderMap,
) -> Response {
    if let Some(status) = status {
        *response.status_mut() = status;
    }
    let headers = response.headers_mut();
    strip_hop_by_hop(headers);
    for (name, value) in rule_headers {
        let Some(name) = name else { continue };
        match source {
            Source::Upstream => {
                headers.entry(name).or_insert(value);
            }
            Source::Generated => {
                headers.insert(name, value);
            }
        }
    }
    response
}
