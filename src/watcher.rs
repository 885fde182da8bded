use dashmap::DashMap;
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer, FileIdMap};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::is_excluded_directory;
use crate::indexer::Indexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ChangeKind {
    Modify,
    Create,
    Remove,
}

/// Watches registered directory roots and keeps the index in sync. One
/// debouncer per root, coalescing rapid edits into a single reindex per file
/// per debounce window. When a debounce window contains both a write and a
/// delete for the same path, delete wins: a file that ends a window gone is
/// removed, never left half-reindexed.
pub struct WatchManager {
    watchers: DashMap<String, WatcherHandle>,
    debounce_ms: u64,
}

struct WatcherHandle {
    _debouncer: Debouncer<notify::RecommendedWatcher, FileIdMap>,
}

impl WatchManager {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            watchers: DashMap::new(),
            debounce_ms,
        }
    }

    pub fn start_watching(&self, root: &str, indexer: Arc<Indexer>) -> Result<(), notify::Error> {
        if self.watchers.contains_key(root) {
            return Ok(());
        }

        let root_path = PathBuf::from(root);
        let rt_handle = tokio::runtime::Handle::try_current().ok();

        let mut debouncer = new_debouncer(
            Duration::from_millis(self.debounce_ms),
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let changes = coalesce_events(&events);
                    for (path, kind) in changes {
                        let indexer = indexer.clone();
                        let Some(handle) = &rt_handle else { continue };
                        handle.spawn(async move {
                            let outcome = match kind {
                                ChangeKind::Remove => indexer.remove_file(&path).await.map(|_| ()),
                                ChangeKind::Create => indexer.index_file(&path).await.map(|_| ()),
                                ChangeKind::Modify => indexer.reindex_file(&path).await.map(|_| ()),
                            };
                            if let Err(e) = outcome {
                                tracing::debug!("watch-triggered update skipped for {}: {}", path.display(), e);
                            }
                        });
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!("file watcher error: {:?}", e);
                    }
                }
            },
        )?;

        debouncer.watch(root_path.as_path(), RecursiveMode::Recursive)?;

        self.watchers.insert(root.to_string(), WatcherHandle { _debouncer: debouncer });
        info!("started watching {} (debounce: {}ms)", root, self.debounce_ms);
        Ok(())
    }

    pub fn stop_watching(&self, root: &str) {
        if self.watchers.remove(root).is_some() {
            info!("stopped watching {}", root);
        }
    }

    pub fn is_watching(&self, root: &str) -> bool {
        self.watchers.contains_key(root)
    }
}

/// Reduces a debounce batch to one `ChangeKind` per path, skipping
/// directories and build/output paths, with remove taking precedence over
/// create/modify for the same path within the same window.
fn coalesce_events(events: &[DebouncedEvent]) -> HashMap<PathBuf, ChangeKind> {
    let mut changes: HashMap<PathBuf, ChangeKind> = HashMap::new();

    for event in events {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Create,
            EventKind::Modify(_) => ChangeKind::Modify,
            EventKind::Remove(_) => ChangeKind::Remove,
            _ => continue,
        };

        for path in &event.paths {
            if path
                .components()
                .any(|c| c.as_os_str().to_str().is_some_and(is_excluded_directory))
            {
                continue;
            }
            changes
                .entry(path.clone())
                .and_modify(|existing| {
                    if kind == ChangeKind::Remove || *existing == ChangeKind::Remove {
                        *existing = ChangeKind::Remove;
                    } else {
                        *existing = kind;
                    }
                })
                .or_insert(kind);
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use notify::Event;

    fn debounced(kind: EventKind, path: &str) -> DebouncedEvent {
        DebouncedEvent {
            event: Event::new(kind).add_path(PathBuf::from(path)),
            time: std::time::Instant::now(),
        }
    }

    #[test]
    fn remove_wins_over_modify_in_same_window() {
        let events = vec![
            debounced(EventKind::Modify(ModifyKind::Any), "/tmp/a.txt"),
            debounced(EventKind::Remove(RemoveKind::Any), "/tmp/a.txt"),
        ];
        let changes = coalesce_events(&events);
        assert_eq!(changes.get(&PathBuf::from("/tmp/a.txt")), Some(&ChangeKind::Remove));
    }

    #[test]
    fn remove_wins_regardless_of_order() {
        let events = vec![
            debounced(EventKind::Remove(RemoveKind::Any), "/tmp/b.txt"),
            debounced(EventKind::Create(CreateKind::Any), "/tmp/b.txt"),
        ];
        let changes = coalesce_events(&events);
        assert_eq!(changes.get(&PathBuf::from("/tmp/b.txt")), Some(&ChangeKind::Remove));
    }

    #[test]
    fn excluded_directory_paths_are_skipped() {
        let events = vec![debounced(
            EventKind::Modify(ModifyKind::Any),
            "/tmp/project/node_modules/pkg/index.js",
        )];
        assert!(coalesce_events(&events).is_empty());
    }
}
