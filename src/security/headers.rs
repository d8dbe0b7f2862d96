//! Header manipulation for forwarded requests and responses.
//!
//! # Responsibilities
//! - Set X-Forwarded-For to the connecting client
//! - Strip hop-by-hop headers in both directions
//! - Merge rule-declared proxy headers into the upstream request
//!
//! # Design Decisions
//! - Local dev: the socket peer is the only client address recorded
//! - Upgrade requests keep `Connection`/`Upgrade` (they are forwarded verbatim)

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Pre-rewrite pathname handed to the functions runtime.
pub const X_ORIGINAL_PATHNAME: HeaderName = HeaderName::from_static("x-netlify-original-pathname");

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(axum::http::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Record the client address for the upstream.
pub fn set_forwarded_for(headers: &mut HeaderMap, client: SocketAddr) {
    if let Ok(value) = HeaderValue::from_str(&client.ip().to_string()) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Merge a rule's proxy headers, replacing existing values.
pub fn apply_proxy_headers(headers: &mut HeaderMap, proxy_headers: &BTreeMap<String, String>) {
    for (name, value) in proxy_headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid proxy header on rule"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hop_by_hop_and_connection_listed() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive, x-private"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-private", HeaderValue::from_static("1"));
        headers.insert("accept", HeaderValue::from_static("text/html"));

        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("accept"));
    }

    #[test]
    fn forwards_client_ip() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("6.6.6.6"));
        set_forwarded_for(&mut headers, "127.0.0.1:5555".parse().unwrap());
        assert_eq!(headers[X_FORWARDED_FOR], "127.0.0.1");
    }

    #[test]
    fn merges_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("old"));
        let mut extra = BTreeMap::new();
        extra.insert("X-Api-Key".to_string(), "new".to_string());
        extra.insert("bad header".to_string(), "x".to_string());

        apply_proxy_headers(&mut headers, &extra);
        assert_eq!(headers["x-api-key"], "new");
        assert_eq!(headers.len(), 1);
    }
}
