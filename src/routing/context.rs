//! Per-request routing state.
//!
//! Created when a request arrives and dropped with its response. Owned by
//! exactly one handler future; never shared between requests.

use std::collections::VecDeque;

use axum::http::{HeaderMap, Uri};

use crate::routing::rules::Rule;

#[derive(Debug)]
pub struct RequestContext {
    pub request_id: String,
    pub original_uri: Uri,
    /// Headers forwarded upstream; rules may add to them.
    pub headers: HeaderMap,
    /// Current (possibly rewritten) path and query.
    path_and_query: String,
    /// Alternative static paths left to try on a 404.
    pub alternatives: VecDeque<String>,
    /// Rule still waiting to be applied if every static path 404s.
    pub active_rule: Option<Rule>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, uri: &Uri, headers: HeaderMap) -> Self {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        Self {
            request_id: request_id.into(),
            original_uri: uri.clone(),
            headers,
            path_and_query,
            alternatives: VecDeque::new(),
            active_rule: None,
        }
    }

    pub fn path_and_query(&self) -> &str {
        &self.path_and_query
    }

    pub fn pathname(&self) -> &str {
        split_query(&self.path_and_query).0
    }

    pub fn query(&self) -> Option<&str> {
        split_query(&self.path_and_query).1
    }

    pub fn set_path_and_query(&mut self, path_and_query: impl Into<String>) {
        self.path_and_query = path_and_query.into();
    }

    /// Replace the pathname, keeping the current query.
    pub fn set_pathname(&mut self, pathname: &str) {
        self.path_and_query = match self.query() {
            Some(query) => format!("{pathname}?{query}"),
            None => pathname.to_string(),
        };
    }

    /// Cookie header value, if any.
    pub fn cookie_header(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::COOKIE)
            .and_then(|v| v.to_str().ok())
    }
}

fn split_query(path_and_query: &str) -> (&str, Option<&str>) {
    match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    }
}
