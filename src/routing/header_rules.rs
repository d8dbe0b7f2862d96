//! Response header rules keyed by path pattern.
//!
//! # Responsibilities
//! - Parse `_headers` files (path line, then indented `Name: value` lines)
//! - Merge several sources, later sources replacing earlier entries per path
//! - Resolve the header set for a final request path
//!
//! # Design Decisions
//! - Names and values are validated once at load; invalid pairs are dropped
//! - Lookup merges every matching entry; later entries override earlier ones
//! - No match is an empty set, never an error

use std::path::Path;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::routing::matcher::PathPattern;

#[derive(Debug, Clone)]
struct HeaderEntry {
    pattern: PathPattern,
    headers: Vec<(HeaderName, HeaderValue)>,
}

/// Immutable snapshot of all header rules.
#[derive(Debug, Clone, Default)]
pub struct HeaderRules {
    entries: Vec<HeaderEntry>,
}

impl HeaderRules {
    /// Load header files in merge order. Missing files contribute nothing.
    pub fn load(files: &[impl AsRef<Path>]) -> Self {
        let sources = files.iter().filter_map(|file| {
            let file = file.as_ref();
            match std::fs::read_to_string(file) {
                Ok(content) => Some(parse_headers(&content)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    tracing::warn!(path = ?file, error = %e, "Failed to read headers file");
                    None
                }
            }
        });
        Self::merge(sources)
    }

    /// Merge parsed sources. An entry for a path already present is replaced
    /// in place by the later source's entry.
    pub fn merge(sources: impl IntoIterator<Item = Vec<(String, Vec<(String, String)>)>>) -> Self {
        let mut merged: Vec<(String, Vec<(String, String)>)> = Vec::new();
        for source in sources {
            for (path, headers) in source {
                match merged.iter_mut().find(|(existing, _)| *existing == path) {
                    Some(slot) => slot.1 = headers,
                    None => merged.push((path, headers)),
                }
            }
        }

        let entries = merged
            .into_iter()
            .map(|(path, headers)| HeaderEntry {
                headers: headers
                    .into_iter()
                    .filter_map(|(name, value)| {
                        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                            (Ok(name), Ok(value)) => Some((name, value)),
                            _ => {
                                tracing::warn!(path = %path, header = %name, "Dropping invalid header rule");
                                None
                            }
                        }
                    })
                    .collect(),
                pattern: PathPattern::new(path),
            })
            .collect();

        Self { entries }
    }

    /// Header set for `path`; empty when nothing matches.
    pub fn headers_for(&self, path: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for entry in self.entries.iter().filter(|e| e.pattern.matches(path).is_some()) {
            for (name, value) in &entry.headers {
                headers.insert(name.clone(), value.clone());
            }
        }
        headers
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse one `_headers` file into `(path, [(name, value)])` blocks.
pub fn parse_headers(content: &str) -> Vec<(String, Vec<(String, String)>)> {
    let mut blocks: Vec<(String, Vec<(String, String)>)> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indented = line.starts_with(char::is_whitespace);
        if !indented {
            blocks.push((trimmed.to_string(), Vec::new()));
            continue;
        }

        let (Some((_, headers)), Some((name, value))) = (blocks.last_mut(), trimmed.split_once(':')) else {
            tracing::warn!(line = %trimmed, "Ignoring header line outside a path block");
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        match headers.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(name)) {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => headers.push((name.to_string(), value.to_string())),
        }
    }

    blocks
}
