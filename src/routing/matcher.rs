//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile `from` patterns (`/blog/:slug`, `/api/*`) once at table build
//! - Match request paths, capturing `:name` segments and the `*` splat
//! - Substitute captures into a rule target
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Trailing slashes are insignificant (`/old` and `/old/` are the same path)
//! - A trailing `*` may match nothing, so `/api/*` also matches `/api`
//! - No regex to guarantee O(n) matching

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled path pattern.
#[derive(Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
    splat: bool,
}

/// Values captured while matching, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    params: Vec<(String, String)>,
    splat: Option<String>,
}

impl Captures {
    pub fn get(&self, name: &str) -> Option<&str> {
        if name == "splat" {
            if let Some(splat) = &self.splat {
                return Some(splat);
            }
        }
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl PathPattern {
    /// Compile a pattern. Any `*` segment ends the pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let mut segments = Vec::new();
        let mut splat = false;

        for part in split_segments(&source) {
            if part == "*" {
                splat = true;
                break;
            }
            match part.strip_prefix(':') {
                Some(name) if !name.is_empty() => segments.push(Segment::Param(name.to_string())),
                _ => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Self {
            source,
            segments,
            splat,
        }
    }

    /// The pattern text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a request path (no query string).
    pub fn matches(&self, path: &str) -> Option<Captures> {
        let parts: Vec<&str> = split_segments(path).collect();
        if parts.len() < self.segments.len() || (!self.splat && parts.len() != self.segments.len()) {
            return None;
        }

        let mut captures = Captures::default();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => captures.params.push((name.clone(), (*part).to_string())),
            }
        }

        if self.splat {
            captures.splat = Some(parts[self.segments.len()..].join("/"));
        }
        Some(captures)
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Replace `:name` placeholders in `target` with captured values.
///
/// Unknown placeholders are left untouched; a `:` not followed by an
/// identifier (as in `https://` or `host:8080`) is never a placeholder.
pub fn substitute(target: &str, captures: &Captures) -> String {
    let mut out = String::with_capacity(target.len());
    let mut rest = target;

    while let Some(pos) = rest.find(':') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let ident_len = after
            .char_indices()
            .take_while(|(i, c)| c.is_ascii_alphabetic() || *c == '_' || (*i > 0 && c.is_ascii_digit()))
            .count();

        let name = &after[..ident_len];
        match (ident_len, captures.get(name)) {
            (1.., Some(value)) => out.push_str(value),
            _ => {
                out.push(':');
                out.push_str(name);
            }
        }
        rest = &after[ident_len..];
    }
    out.push_str(rest);
    out
}
