//! Bridges a `FileSystemWatcher`'s raw create/modify/delete/rename events
//! to the Storage Engine via the filesystem `Importer`. Events are
//! coalesced into a batch before being applied, so a burst of writes to
//! the same path (a download completing, an editor's save-then-rename)
//! collapses into a single import instead of one per filesystem event.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::cds::importer::Importer;
use crate::cds::storage::StorageBackend;
use crate::error::Result;
use crate::watcher::{FileSystemEvent, FileSystemWatcher};

/// One coalesced action per path, replacing whatever was previously
/// queued for it — a `Remove` after an `Add` for the same path collapses
/// to just the `Remove`, since only the latest event matters once the
/// batch interval fires.
#[derive(Debug, Clone)]
enum QueuedOperation {
    Add(PathBuf),
    Update(PathBuf),
    Remove(PathBuf),
    Move { from: PathBuf, to: PathBuf },
}

/// Wires a `FileSystemWatcher` to the Storage Engine through an
/// `Importer`. `monitored_roots` anchors each observed path back to the
/// configured directory it falls under, which the importer needs to
/// compute the right virtual container path.
pub struct WatcherIntegration<W: FileSystemWatcher> {
    importer: Arc<Importer>,
    watcher: Arc<W>,
    monitored_roots: Arc<RwLock<Vec<PathBuf>>>,
    processing_queue: Arc<RwLock<HashMap<PathBuf, QueuedOperation>>>,
    batch_interval: Duration,
    is_running: Arc<RwLock<bool>>,
}

impl<W: FileSystemWatcher + 'static> WatcherIntegration<W> {
    pub fn new(importer: Arc<Importer>, watcher: Arc<W>) -> Self {
        Self {
            importer,
            watcher,
            monitored_roots: Arc::new(RwLock::new(Vec::new())),
            processing_queue: Arc::new(RwLock::new(HashMap::new())),
            batch_interval: Duration::from_millis(1000),
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Starts watching `monitored_directories`, runs the initial
    /// reconciliation scan, then spawns the event-drain and batch-apply
    /// tasks.
    pub async fn start(&self, monitored_directories: &[PathBuf]) -> Result<()> {
        {
            let mut running = self.is_running.write().await;
            if *running {
                return Ok(());
            }
            *running = true;
        }

        *self.monitored_roots.write().await = monitored_directories.to_vec();

        self.initial_sync(monitored_directories).await;

        self.watcher.start_watching(monitored_directories).await?;
        let receiver = self.watcher.get_event_receiver();

        let queue = self.processing_queue.clone();
        let roots = self.monitored_roots.clone();
        let running = self.is_running.clone();
        tokio::spawn(Self::process_events(receiver, queue, roots, running));

        let queue = self.processing_queue.clone();
        let importer = self.importer.clone();
        let roots = self.monitored_roots.clone();
        let running = self.is_running.clone();
        let interval = self.batch_interval;
        tokio::spawn(Self::process_batches(queue, importer, roots, running, interval));

        info!("Watcher integration started for {} directories", monitored_directories.len());
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        *self.is_running.write().await = false;
        self.watcher.stop_watching().await?;
        Ok(())
    }

    /// Reconciles the configured directories against what storage already
    /// holds by simply re-running a full import scan: `Importer::scan`
    /// tolerates re-imports of already-known files (a duplicate insert is
    /// logged and skipped), so this is safe to run on every startup.
    async fn initial_sync(&self, directories: &[PathBuf]) {
        for directory in directories {
            match self.importer.scan(directory).await {
                Ok(changed) => {
                    debug!(
                        path = %directory.display(),
                        containers_touched = changed.upnp.len(),
                        "initial sync scan complete"
                    );
                }
                Err(e) => {
                    warn!(path = %directory.display(), error = %e, "initial sync scan failed");
                }
            }
        }
    }

    async fn process_events(
        mut receiver: mpsc::Receiver<FileSystemEvent>,
        queue: Arc<RwLock<HashMap<PathBuf, QueuedOperation>>>,
        roots: Arc<RwLock<Vec<PathBuf>>>,
        running: Arc<RwLock<bool>>,
    ) {
        while *running.read().await {
            match receiver.recv().await {
                Some(event) => {
                    let roots = roots.read().await;
                    Self::enqueue(&queue, &roots, event).await;
                }
                None => {
                    debug!("watcher event channel closed");
                    break;
                }
            }
        }
    }

    async fn enqueue(queue: &Arc<RwLock<HashMap<PathBuf, QueuedOperation>>>, roots: &[PathBuf], event: FileSystemEvent) {
        let mut queue = queue.write().await;
        match event {
            FileSystemEvent::Created(path) => {
                if Self::under_any_root(roots, &path) {
                    queue.insert(path.clone(), QueuedOperation::Add(path));
                }
            }
            FileSystemEvent::Modified(path) => {
                if Self::under_any_root(roots, &path) {
                    queue.insert(path.clone(), QueuedOperation::Update(path));
                }
            }
            FileSystemEvent::Deleted(path) => {
                queue.insert(path.clone(), QueuedOperation::Remove(path));
            }
            FileSystemEvent::Renamed { from, to } => {
                queue.insert(from.clone(), QueuedOperation::Move { from, to });
            }
        }
    }

    fn under_any_root(roots: &[PathBuf], path: &Path) -> bool {
        roots.iter().any(|root| path.starts_with(root))
    }

    fn root_for(roots: &[PathBuf], path: &Path) -> Option<PathBuf> {
        roots.iter().filter(|root| path.starts_with(root)).max_by_key(|root| root.as_os_str().len()).cloned()
    }

    async fn process_batches(
        queue: Arc<RwLock<HashMap<PathBuf, QueuedOperation>>>,
        importer: Arc<Importer>,
        roots: Arc<RwLock<Vec<PathBuf>>>,
        running: Arc<RwLock<bool>>,
        interval: Duration,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if !*running.read().await {
                break;
            }

            let batch: Vec<QueuedOperation> = {
                let mut queue = queue.write().await;
                queue.drain().map(|(_, op)| op).collect()
            };
            if batch.is_empty() {
                continue;
            }

            let roots = roots.read().await.clone();
            for op in batch {
                Self::apply(&importer, &roots, op).await;
            }
        }
    }

    async fn apply(importer: &Arc<Importer>, roots: &[PathBuf], op: QueuedOperation) {
        match op {
            QueuedOperation::Add(path) | QueuedOperation::Update(path) => {
                let Some(root) = Self::root_for(roots, &path) else {
                    debug!(path = %path.display(), "event for path outside any monitored root, ignoring");
                    return;
                };
                if path.is_dir() {
                    if let Err(e) = importer.scan(&path).await {
                        warn!(path = %path.display(), error = %e, "failed to scan newly created directory");
                    }
                    return;
                }
                if let Err(e) = importer.import_file(&root, &path).await {
                    warn!(path = %path.display(), error = %e, "failed to import added/updated file");
                }
            }
            QueuedOperation::Remove(path) => {
                if let Err(e) = importer.remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "failed to remove deleted file");
                }
            }
            QueuedOperation::Move { from, to } => {
                if let Err(e) = importer.remove_file(&from).await {
                    warn!(path = %from.display(), error = %e, "failed to remove moved-from path");
                }
                let Some(root) = Self::root_for(roots, &to) else {
                    debug!(path = %to.display(), "moved-to path outside any monitored root, ignoring");
                    return;
                };
                if let Err(e) = importer.import_file(&root, &to).await {
                    warn!(path = %to.display(), error = %e, "failed to import moved-to path");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cds::subscription::{NotifySink, SubscriptionBus};
    use crate::platform::filesystem::{BaseFileSystemManager, FileSystemManager};
    use crate::watcher::CrossPlatformWatcher;
    use async_trait::async_trait;

    struct NullSink;
    #[async_trait]
    impl NotifySink for NullSink {
        async fn notify(&self, _: &str, _: &str, _: u32, _: i64, _: &str) {}
    }

    async fn test_integration() -> (WatcherIntegration<CrossPlatformWatcher>, Arc<dyn StorageBackend>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            crate::cds::storage::sqlite::SqliteStorage::new(&dir.path().join("watch.db"), true).await.unwrap(),
        ) as Arc<dyn StorageBackend>;
        let subscriptions = Arc::new(SubscriptionBus::new(storage.clone(), Arc::new(NullSink)).await);
        let filesystem = Arc::new(BaseFileSystemManager::new(true)) as Arc<dyn FileSystemManager>;
        let importer = Arc::new(Importer::new(filesystem, storage.clone(), subscriptions));
        let watcher = Arc::new(CrossPlatformWatcher::new());
        (WatcherIntegration::new(importer, watcher), storage, dir)
    }

    #[tokio::test]
    async fn integration_can_be_constructed_and_stopped_when_never_started() {
        let (integration, _storage, _dir) = test_integration().await;
        assert!(integration.stop().await.is_ok());
    }

    #[tokio::test]
    async fn root_for_picks_the_most_specific_monitored_root() {
        let roots = vec![PathBuf::from("/media"), PathBuf::from("/media/music")];
        let found = WatcherIntegration::<CrossPlatformWatcher>::root_for(&roots, Path::new("/media/music/song.mp3"));
        assert_eq!(found, Some(PathBuf::from("/media/music")));
    }

    #[tokio::test]
    async fn initial_sync_imports_preexisting_files() {
        let (integration, storage, dir) = test_integration().await;
        let media_root = dir.path().join("media");
        std::fs::create_dir_all(&media_root).unwrap();
        std::fs::write(media_root.join("song.mp3"), b"fake").unwrap();

        integration.initial_sync(std::slice::from_ref(&media_root)).await;

        let found = storage
            .find_object_by_path(&media_root.join("song.mp3").to_string_lossy(), true)
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
