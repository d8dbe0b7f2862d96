//! Destination computation for rewrites.

use url::form_urlencoded;
use url::Url;

use crate::routing::addons::INTERNAL_PREFIX;

/// Base for resolving relative rule targets; only path and query survive.
const RESOLVE_BASE: &str = "http://localhost/";

/// Path and query for a rewrite to `to`.
///
/// The request's query parameters are kept; parameters declared on `to`
/// replace same-named request parameters (first occurrence keeps its
/// position, later duplicates are dropped) or are appended.
pub fn destination(to: &str, request_query: Option<&str>) -> String {
    let Ok(dest) = Url::parse(RESOLVE_BASE).and_then(|base| base.join(to)) else {
        return to.to_string();
    };

    let mut params: Vec<(String, String)> = request_query
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    for (key, value) in dest.query_pairs().into_owned() {
        match params.iter().position(|(k, _)| *k == key) {
            Some(first) => {
                params[first].1 = value;
                let mut index = 0;
                params.retain(|(k, _)| {
                    let keep = index <= first || *k != key;
                    index += 1;
                    keep
                });
            }
            None => params.push((key, value)),
        }
    }

    if params.is_empty() {
        return dest.path().to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("{}?{}", dest.path(), query)
}

/// Path of an absolute target, with its scheme and host removed.
pub fn strip_origin(to: &str) -> String {
    let rest = to
        .strip_prefix("https://")
        .or_else(|| to.strip_prefix("http://"))
        .unwrap_or(to);
    match rest.find('/') {
        Some(slash) => rest[slash..].to_string(),
        None => "/".to_string(),
    }
}

/// `scheme://authority` of an absolute target.
pub fn origin_of(to: &str) -> Option<String> {
    let url = Url::parse(to).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Paths under the reserved internal prefix.
pub fn is_internal(path: &str) -> bool {
    path.starts_with(INTERNAL_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_request_query() {
        assert_eq!(
            destination("/.netlify/functions/foo", Some("x=1")),
            "/.netlify/functions/foo?x=1"
        );
        assert_eq!(destination("/index.html", None), "/index.html");
    }

    #[test]
    fn destination_params_win() {
        assert_eq!(
            destination("/search?page=2&lang=en", Some("page=1&q=rust&page=3")),
            "/search?page=2&q=rust&lang=en"
        );
    }

    #[test]
    fn normalizes_destination_path() {
        assert_eq!(destination("/a/../b c", None), "/b%20c");
    }

    #[test]
    fn external_targets() {
        assert_eq!(strip_origin("https://api.example.com/v1/items?x=1"), "/v1/items?x=1");
        assert_eq!(strip_origin("http://api.example.com"), "/");
        assert_eq!(origin_of("https://api.example.com/v1").as_deref(), Some("https://api.example.com"));
        assert_eq!(origin_of("http://127.0.0.1:9000/x").as_deref(), Some("http://127.0.0.1:9000"));
    }

    #[test]
    fn internal_paths() {
        assert!(is_internal("/.netlify/functions/foo"));
        assert!(!is_internal("/netlify/functions/foo"));
    }
}
