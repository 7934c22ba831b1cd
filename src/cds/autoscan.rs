//! The autoscan timer thread (spec.md §5): walks configured scan
//! directories on an interval, diffs against storage by re-running the
//! importer over the directory, and lets the result's `ChangedContainers`
//! flow through to the Subscription Bus the same way a one-shot scan
//! does. `INotify`-mode directories are not scheduled here — they're
//! handed to `WatcherIntegration`, which reacts to filesystem events
//! instead of polling.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cds::error::{CdsError, CdsResult};
use crate::cds::importer::Importer;
use crate::cds::object::CdsObject;
use crate::cds::storage::{AutoscanDirectory, AutoscanMode, StorageBackend};
use crate::config::{AutoscanConfig, AutoscanModeConfig};

/// Computes the dot-joined ancestor-id path (`"1.4.9"`) for `container_id`
/// by walking `parent_id` up to `FS_ROOT_ID`, the same format
/// `AutoscanDirectory::overlaps` and the storage engine's overlap check
/// expect.
async fn ancestor_path_for(storage: &Arc<dyn StorageBackend>, container_id: i64) -> CdsResult<String> {
    let mut chain = vec![container_id.to_string()];
    let mut current = container_id;
    while current != crate::cds::object::FS_ROOT_ID {
        let obj: CdsObject = storage.load_object(current).await?;
        if crate::cds::object::is_forbidden_mutation_target(obj.parent_id) && obj.parent_id != crate::cds::object::FS_ROOT_ID {
            break;
        }
        current = obj.parent_id;
        chain.push(current.to_string());
        if current == crate::cds::object::FS_ROOT_ID {
            break;
        }
    }
    chain.reverse();
    Ok(chain.join("."))
}

/// Registers every configured autoscan directory with the Storage Engine
/// (creating/attaching its container, rejecting overlaps per Q7), then
/// spawns one polling task per `Timed` entry. Returns the `Timed`
/// directories' absolute paths so the caller can exclude them from
/// whatever `INotify` watch set it builds separately, and the `INotify`
/// entries' paths so the caller can feed them to `WatcherIntegration`.
pub struct AutoscanScheduler {
    importer: Arc<Importer>,
    storage: Arc<dyn StorageBackend>,
}

impl AutoscanScheduler {
    pub fn new(importer: Arc<Importer>, storage: Arc<dyn StorageBackend>) -> Self {
        Self { importer, storage }
    }

    /// Registers `configs` and spawns the `Timed` polling tasks. Entries
    /// whose filesystem path doesn't exist are logged and skipped rather
    /// than failing startup. Returns the `INotify`-mode paths the caller
    /// should hand to the filesystem watcher.
    pub async fn start(&self, configs: &[AutoscanConfig]) -> Vec<PathBuf> {
        let mut inotify_paths = Vec::new();

        for config in configs {
            let path = PathBuf::from(&config.path);
            if !path.is_dir() {
                warn!(path = %path.display(), "configured autoscan directory does not exist, skipping");
                continue;
            }

            let object_id = match self.importer.container_for_directory(&path, &path).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to resolve autoscan container");
                    continue;
                }
            };
            let ancestor_path = match ancestor_path_for(&self.storage, object_id).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to compute autoscan ancestor path");
                    continue;
                }
            };

            let mode = match config.mode {
                AutoscanModeConfig::Timed => AutoscanMode::Timed,
                AutoscanModeConfig::INotify => AutoscanMode::INotify,
            };

            let dir = AutoscanDirectory {
                id: None,
                object_id: Some(object_id),
                location: config.path.clone(),
                mode,
                recursive: config.recursive,
                hidden_files: config.hidden_files,
                interval_secs: config.interval_secs,
                last_modified: 0,
                ancestor_path,
                persistent: true,
                touched: false,
            };

            match self.storage.add_autoscan_directory(dir).await {
                Ok(id) => info!(path = %config.path, ?mode, autoscan_id = id, "registered autoscan directory"),
                Err(CdsError::OverlappingAutoscan(msg)) => {
                    warn!(path = %config.path, reason = %msg, "autoscan directory overlaps an existing one, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(path = %config.path, error = %e, "failed to register autoscan directory");
                    continue;
                }
            }

            match config.mode {
                AutoscanModeConfig::Timed => {
                    self.spawn_poller(path, Duration::from_secs(config.interval_secs.max(1)));
                }
                AutoscanModeConfig::INotify => inotify_paths.push(PathBuf::from(&config.path)),
            }
        }

        inotify_paths
    }

    fn spawn_poller(&self, path: PathBuf, interval: Duration) {
        let importer = self.importer.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; initial_sync already covered t=0
            loop {
                ticker.tick().await;
                Self::run_once(&importer, &path).await;
            }
        });
    }

    async fn run_once(importer: &Arc<Importer>, path: &Path) {
        match importer.scan(path).await {
            Ok(changed) => {
                if !changed.upnp.is_empty() {
                    info!(path = %path.display(), containers_touched = changed.upnp.len(), "autoscan cycle complete");
                }
            }
            Err(e) => warn!(path = %path.display(), error = %e, "autoscan cycle failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cds::storage::sqlite::SqliteStorage;
    use crate::cds::subscription::{NotifySink, SubscriptionBus};
    use crate::platform::filesystem::{BaseFileSystemManager, FileSystemManager};
    use async_trait::async_trait;

    struct NullSink;
    #[async_trait]
    impl NotifySink for NullSink {
        async fn notify(&self, _: &str, _: &str, _: u32, _: i64, _: &str) {}
    }

    async fn scheduler() -> (AutoscanScheduler, Arc<dyn StorageBackend>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage =
            Arc::new(SqliteStorage::new(&dir.path().join("autoscan.db"), true).await.unwrap()) as Arc<dyn StorageBackend>;
        let subscriptions = Arc::new(SubscriptionBus::new(storage.clone(), Arc::new(NullSink)).await);
        let filesystem = Arc::new(BaseFileSystemManager::new(true)) as Arc<dyn FileSystemManager>;
        let importer = Arc::new(Importer::new(filesystem, storage.clone(), subscriptions));
        (AutoscanScheduler::new(importer, storage.clone()), storage, dir)
    }

    #[tokio::test]
    async fn registers_a_timed_directory_and_marks_its_container_persistent() {
        let (scheduler, storage, dir) = scheduler().await;
        let music = dir.path().join("Music");
        std::fs::create_dir_all(&music).unwrap();

        let configs = vec![AutoscanConfig {
            path: music.to_string_lossy().to_string(),
            mode: AutoscanModeConfig::Timed,
            recursive: true,
            hidden_files: false,
            interval_secs: 3600,
        }];
        let inotify_paths = scheduler.start(&configs).await;
        assert!(inotify_paths.is_empty());

        let list = storage.get_autoscan_list(AutoscanMode::Timed).await.unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0].persistent);
    }

    #[tokio::test]
    async fn inotify_directories_are_returned_for_the_watcher_instead_of_polled() {
        let (scheduler, _storage, dir) = scheduler().await;
        let video = dir.path().join("Video");
        std::fs::create_dir_all(&video).unwrap();

        let configs = vec![AutoscanConfig {
            path: video.to_string_lossy().to_string(),
            mode: AutoscanModeConfig::INotify,
            recursive: true,
            hidden_files: false,
            interval_secs: 3600,
        }];
        let inotify_paths = scheduler.start(&configs).await;
        assert_eq!(inotify_paths, vec![video]);
    }

    #[tokio::test]
    async fn overlapping_autoscan_directories_are_skipped_not_fatal() {
        let (scheduler, storage, dir) = scheduler().await;
        let root = dir.path().join("Media");
        let nested = root.join("Nested");
        std::fs::create_dir_all(&nested).unwrap();

        let configs = vec![
            AutoscanConfig {
                path: root.to_string_lossy().to_string(),
                mode: AutoscanModeConfig::Timed,
                recursive: true,
                hidden_files: false,
                interval_secs: 3600,
            },
            AutoscanConfig {
                path: nested.to_string_lossy().to_string(),
                mode: AutoscanModeConfig::Timed,
                recursive: false,
                hidden_files: false,
                interval_secs: 3600,
            },
        ];
        scheduler.start(&configs).await;

        let list = storage.get_autoscan_list(AutoscanMode::Timed).await.unwrap();
        assert_eq!(list.len(), 1, "the overlapping second directory must not be registered");
    }
}
