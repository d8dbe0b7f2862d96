//! Addon URL table.
//!
//! Maps `/.netlify/<slug>/<rest>` to `<base-url-for-slug>/<rest>`. Built once
//! per process run from configuration and never mutated.

use std::collections::BTreeMap;

use crate::routing::target::{Target, TargetKind};

/// Reserved prefix shared by functions and addons.
pub const INTERNAL_PREFIX: &str = "/.netlify/";

#[derive(Debug, Clone, Default)]
pub struct AddonTable {
    urls: BTreeMap<String, String>,
}

impl AddonTable {
    pub fn new(urls: &BTreeMap<String, String>) -> Self {
        Self {
            urls: urls
                .iter()
                .map(|(slug, base)| (slug.clone(), base.trim_end_matches('/').to_string()))
                .collect(),
        }
    }

    /// Resolve an addon target for a request path (query included).
    ///
    /// Requires at least `/.netlify/<slug>/`; the remainder, query and all,
    /// is appended to the addon's base URL.
    pub fn resolve(&self, path_and_query: &str) -> Option<Target> {
        let rest = path_and_query.strip_prefix(INTERNAL_PREFIX)?;
        let (slug, tail) = rest.split_at(rest.find('/')?);
        let base = self.urls.get(slug)?;
        Some(Target::new(TargetKind::Addon, base.clone(), tail))
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AddonTable {
        let mut urls = BTreeMap::new();
        urls.insert("search".to_string(), "https://search.example.com/v1/".to_string());
        AddonTable::new(&urls)
    }

    #[test]
    fn resolves_known_slug() {
        let target = table().resolve("/.netlify/search/query?q=rust").unwrap();
        assert_eq!(target.kind, TargetKind::Addon);
        assert_eq!(target.url(), "https://search.example.com/v1/query?q=rust");
    }

    #[test]
    fn ignores_unknown_or_incomplete_paths() {
        let table = table();
        assert!(table.resolve("/.netlify/other/query").is_none());
        assert!(table.resolve("/.netlify/search").is_none());
        assert!(table.resolve("/search/query").is_none());
    }
}
