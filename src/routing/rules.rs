//! Rewrite/redirect rules and the ordered rule table.
//!
//! # Responsibilities
//! - Define the `Rule` record consumed by the decision engine
//! - Parse `_redirects` lines into rules
//! - Look up the first rule whose `from` pattern matches a path
//!
//! # Design Decisions
//! - Immutable after construction; reloads build a new table
//! - First match wins, in source order (`_redirects` before inline rules)
//! - Placeholders are substituted into `to` at lookup time, so callers
//!   only ever see concrete targets

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::routing::matcher::{substitute, PathPattern};

/// Exception key whose value is a comma-separated role list.
pub const JWT_EXCEPTION: &str = "JWT";

/// A rewrite or redirect directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rule {
    /// Path pattern.
    pub from: String,

    /// Internal path, origin path, or absolute external URL.
    #[serde(default)]
    pub to: String,

    /// 300..=400 redirects; anything else (or nothing) rewrites.
    #[serde(default)]
    pub status: Option<u16>,

    /// Apply even when a static file shadows the path.
    #[serde(default)]
    pub force: bool,

    /// Always answer with the 404 page.
    #[serde(default, rename = "force404")]
    pub force_404: bool,

    /// Condition name to value; only `JWT` is understood.
    #[serde(default)]
    pub exceptions: BTreeMap<String, String>,

    /// Headers merged into the upstream request.
    #[serde(default, rename = "headers", alias = "proxy_headers")]
    pub proxy_headers: BTreeMap<String, String>,
}

impl Rule {
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, Some(300..=400))
    }

    pub fn is_external(&self) -> bool {
        self.to.starts_with("http://") || self.to.starts_with("https://")
    }

    pub fn jwt_exception(&self) -> Option<&str> {
        self.exceptions.get(JWT_EXCEPTION).map(String::as_str)
    }

    /// Parse one `_redirects` line: `from to [status[!]] [Role=a,b]`.
    ///
    /// Returns `None` for blank lines and comments.
    pub fn parse_line(line: &str) -> Option<Result<Self, String>> {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            return None;
        }

        let mut fields = line.split_whitespace();
        let from = fields.next()?.to_string();
        let Some(to) = fields.next() else {
            return Some(Err(format!("missing target in `{line}`")));
        };

        let mut rule = Rule {
            from,
            to: to.to_string(),
            ..Rule::default()
        };

        for field in fields {
            if let Some((key, value)) = field.split_once('=') {
                if key.eq_ignore_ascii_case("role") {
                    rule.exceptions.insert(JWT_EXCEPTION.to_string(), value.to_string());
                }
                continue;
            }
            let (code, force) = match field.strip_suffix('!') {
                Some(code) => (code, true),
                None => (field, false),
            };
            match code.parse::<u16>() {
                Ok(status) => {
                    rule.status = Some(status);
                    rule.force = force;
                }
                Err(_) => return Some(Err(format!("invalid status `{field}` in `{line}`"))),
            }
        }

        Some(Ok(rule))
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    pattern: PathPattern,
    rule: Rule,
}

/// Ordered, immutable rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| CompiledRule {
                    pattern: PathPattern::new(rule.from.clone()),
                    rule,
                })
                .collect(),
        }
    }

    /// Build from a `_redirects` file followed by inline rules.
    ///
    /// A missing file is an empty source; bad lines are skipped.
    pub fn load(redirects_file: &Path, inline: &[Rule]) -> Self {
        let mut rules = match std::fs::read_to_string(redirects_file) {
            Ok(content) => parse_redirects(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = ?redirects_file, error = %e, "Failed to read redirects file");
                Vec::new()
            }
        };
        rules.extend(inline.iter().cloned());
        Self::new(rules)
    }

    /// First rule matching `path`, with placeholders substituted into `to`.
    pub fn match_path(&self, path: &str) -> Option<Rule> {
        self.rules.iter().find_map(|compiled| {
            compiled.pattern.matches(path).map(|captures| Rule {
                to: substitute(&compiled.rule.to, &captures),
                ..compiled.rule.clone()
            })
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Parse a whole `_redirects` file, logging and skipping malformed lines.
pub fn parse_redirects(content: &str) -> Vec<Rule> {
    content
        .lines()
        .enumerate()
        .filter_map(|(number, line)| match Rule::parse_line(line)? {
            Ok(rule) => Some(rule),
            Err(reason) => {
                tracing::warn!(line = number + 1, %reason, "Skipping redirect rule");
                None
            }
        })
        .collect()
}

/// Cut a `#` comment that starts the line or follows whitespace, so
/// fragments in targets survive.
fn strip_comment(line: &str) -> &str {
    let mut previous = None;
    for (index, c) in line.char_indices() {
        if c == '#' && previous.map_or(true, char::is_whitespace) {
            return &line[..index];
        }
        previous = Some(c);
    }
    line
}
