//! Hot-swappable rule and header tables.
//!
//! Readers take a snapshot (`Arc`) per request and keep it for the whole
//! request; a reload publishes a new snapshot without blocking them.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::{load_config, ConfigError, DevConfig, ReloadEvent};
use crate::observability::metrics;
use crate::routing::header_rules::HeaderRules;
use crate::routing::rules::{Rule, RuleTable};

/// Where the tables are read from.
#[derive(Debug, Clone)]
pub struct TableSources {
    /// Config file holding inline `[[redirects]]`, re-read on reload.
    pub config_path: Option<PathBuf>,
    /// Inline rules used when there is no config file.
    pub inline: Vec<Rule>,
    pub redirects_file: PathBuf,
    pub header_files: Vec<PathBuf>,
}

impl TableSources {
    pub fn from_config(config: &DevConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            inline: config.redirects.clone(),
            redirects_file: config.site.redirects_path(),
            header_files: config.site.headers_paths(),
        }
    }

    /// Files to watch, and the table each one feeds.
    pub fn watch_targets(&self) -> Vec<(PathBuf, ReloadEvent)> {
        let mut targets = vec![(self.redirects_file.clone(), ReloadEvent::Rules)];
        if let Some(config_path) = &self.config_path {
            targets.push((config_path.clone(), ReloadEvent::Rules));
        }
        targets.extend(
            self.header_files
                .iter()
                .map(|file| (file.clone(), ReloadEvent::Headers)),
        );
        targets
    }

    fn inline_rules(&self) -> Result<Vec<Rule>, ConfigError> {
        match &self.config_path {
            Some(path) => load_config(path).map(|config| config.redirects),
            None => Ok(self.inline.clone()),
        }
    }
}

#[derive(Clone)]
pub struct TableSet {
    rules: Arc<ArcSwap<RuleTable>>,
    headers: Arc<ArcSwap<HeaderRules>>,
    sources: Arc<TableSources>,
}

impl TableSet {
    /// Build both tables from their sources.
    pub fn load(sources: TableSources) -> Self {
        let rules = RuleTable::load(&sources.redirects_file, &sources.inline);
        let headers = HeaderRules::load(sources.header_files.as_slice());
        tracing::info!(rules = rules.len(), header_rules = headers.len(), "Routing tables loaded");

        Self {
            rules: Arc::new(ArcSwap::from_pointee(rules)),
            headers: Arc::new(ArcSwap::from_pointee(headers)),
            sources: Arc::new(sources),
        }
    }

    pub fn rules(&self) -> Arc<RuleTable> {
        self.rules.load_full()
    }

    pub fn headers(&self) -> Arc<HeaderRules> {
        self.headers.load_full()
    }

    pub fn sources(&self) -> &TableSources {
        &self.sources
    }

    /// Rebuild the table `event` names. A config file that no longer parses
    /// leaves the current rule table in place.
    pub fn reload(&self, event: ReloadEvent) {
        match event {
            ReloadEvent::Rules => match self.sources.inline_rules() {
                Ok(inline) => {
                    let table = RuleTable::load(&self.sources.redirects_file, &inline);
                    tracing::info!(rules = table.len(), "Rule table reloaded");
                    self.rules.store(Arc::new(table));
                    metrics::record_reload("rules", true);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Keeping previous rule table");
                    metrics::record_reload("rules", false);
                }
            },
            ReloadEvent::Headers => {
                let headers = HeaderRules::load(self.sources.header_files.as_slice());
                tracing::info!(header_rules = headers.len(), "Header rules reloaded");
                self.headers.store(Arc::new(headers));
                metrics::record_reload("headers", true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sources(dir: &std::path::Path, config_path: Option<PathBuf>) -> TableSources {
        TableSources {
            config_path,
            inline: Vec::new(),
            redirects_file: dir.join("_redirects"),
            header_files: vec![dir.join("_headers")],
        }
    }

    #[test]
    fn reload_picks_up_edited_rules() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("_redirects"), "/old /new 301\n").unwrap();
        let tables = TableSet::load(sources(dir.path(), None));

        let before = tables.rules();
        assert_eq!(before.match_path("/old").unwrap().to, "/new");

        fs::write(dir.path().join("_redirects"), "/old /newer 302\n").unwrap();
        tables.reload(ReloadEvent::Rules);

        assert_eq!(tables.rules().match_path("/old").unwrap().to, "/newer");
        // Snapshots taken earlier are unaffected.
        assert_eq!(before.match_path("/old").unwrap().to, "/new");
    }

    #[test]
    fn inline_rules_follow_redirects_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("devproxy.toml");
        fs::write(dir.path().join("_redirects"), "/a /from-file 301\n").unwrap();
        fs::write(
            &config_path,
            "[[redirects]]\nfrom = \"/a\"\nto = \"/from-config\"\n\n[[redirects]]\nfrom = \"/b\"\nto = \"/c\"\n",
        )
        .unwrap();

        let tables = TableSet::load(sources(dir.path(), Some(config_path.clone())));
        tables.reload(ReloadEvent::Rules);

        let rules = tables.rules();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.match_path("/a").unwrap().to, "/from-file");
        assert_eq!(rules.match_path("/b").unwrap().to, "/c");
    }

    #[test]
    fn broken_config_keeps_previous_rules() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("devproxy.toml");
        fs::write(&config_path, "[[redirects]]\nfrom = \"/a\"\nto = \"/b\"\n").unwrap();
        let tables = TableSet::load(sources(dir.path(), Some(config_path.clone())));
        tables.reload(ReloadEvent::Rules);
        assert_eq!(tables.rules().len(), 1);

        fs::write(&config_path, "[[redirects]\nbroken").unwrap();
        tables.reload(ReloadEvent::Rules);
        assert_eq!(tables.rules().len(), 1);
    }

    #[test]
    fn reload_headers() {
        let dir = tempfile::tempdir().unwrap();
        let tables = TableSet::load(sources(dir.path(), None));
        assert!(tables.headers().is_empty());

        fs::write(dir.path().join("_headers"), "/*\n  X-Frame-Options: DENY\n").unwrap();
        tables.reload(ReloadEvent::Headers);
        assert_eq!(tables.headers().headers_for("/index.html")["x-frame-options"], "DENY");
    }

    #[test]
    fn watch_targets_cover_every_source() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("devproxy.toml");
        let targets = sources(dir.path(), Some(config_path)).watch_targets();
        let rules = targets.iter().filter(|(_, e)| *e == ReloadEvent::Rules).count();
        assert_eq!(rules, 2);
        assert_eq!(targets.len(), 3);
    }
}
