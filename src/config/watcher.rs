//! Rule and header file watcher for hot reload.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Which table a file change invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReloadEvent {
    Rules,
    Headers,
}

/// A watcher that monitors rule and header source files for changes.
pub struct TableWatcher {
    targets: Vec<(PathBuf, ReloadEvent)>,
    poll_interval: Duration,
    update_tx: mpsc::UnboundedSender<ReloadEvent>,
}

impl TableWatcher {
    /// Create a new TableWatcher.
    ///
    /// Returns the watcher and a receiver for reload events.
    pub fn new(
        targets: Vec<(PathBuf, ReloadEvent)>,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ReloadEvent>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let targets = targets
            .into_iter()
            .map(|(path, event)| (absolute(&path), event))
            .collect();

        (
            Self {
                targets,
                poll_interval,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    ///
    /// Parent directories are watched so files that do not exist yet are
    /// picked up when they are created.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let targets = self.targets.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for reload in affected_tables(&targets, &event) {
                        tracing::info!(table = ?reload, paths = ?event.paths, "Source file change detected");
                        let _ = tx.send(reload);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(self.poll_interval),
        )?;

        let dirs: BTreeSet<PathBuf> = self
            .targets
            .iter()
            .filter_map(|(path, _)| path.parent().map(Path::to_path_buf))
            .collect();
        for dir in &dirs {
            if dir.is_dir() {
                watcher.watch(dir, RecursiveMode::NonRecursive)?;
            } else {
                tracing::warn!(dir = ?dir, "Not watching missing directory");
            }
        }

        tracing::info!(files = self.targets.len(), dirs = dirs.len(), "Table watcher started");
        Ok(watcher)
    }
}

/// Tables touched by a filesystem event, deduplicated.
fn affected_tables(targets: &[(PathBuf, ReloadEvent)], event: &Event) -> BTreeSet<ReloadEvent> {
    if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
        return BTreeSet::new();
    }
    targets
        .iter()
        .filter(|(path, _)| event.paths.iter().any(|p| p == path))
        .map(|(_, reload)| *reload)
        .collect()
}

/// Canonicalize through the parent so not-yet-existing files still compare
/// equal to the absolute paths notify reports.
fn absolute(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|dir| dir.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind, ModifyKind};

    #[test]
    fn maps_events_to_tables() {
        let dir = tempfile::tempdir().unwrap();
        let redirects = dir.path().join("_redirects");
        let headers = dir.path().join("_headers");
        let (watcher, _rx) = TableWatcher::new(
            vec![
                (redirects.clone(), ReloadEvent::Rules),
                (headers.clone(), ReloadEvent::Headers),
            ],
            Duration::from_secs(1),
        );

        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(watcher.targets[1].0.clone());
        let tables = affected_tables(&watcher.targets, &event);
        assert_eq!(tables.into_iter().collect::<Vec<_>>(), vec![ReloadEvent::Headers]);

        let unrelated = Event::new(EventKind::Create(CreateKind::File))
            .add_path(dir.path().canonicalize().unwrap().join("index.html"));
        assert!(affected_tables(&watcher.targets, &unrelated).is_empty());
    }

    #[test]
    fn ignores_access_events() {
        let targets = vec![(PathBuf::from("/site/_headers"), ReloadEvent::Headers)];
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/site/_headers"));
        assert!(affected_tables(&targets, &event).is_empty());
    }
}
