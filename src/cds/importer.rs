//! The filesystem importer: walks a configured media directory and
//! reconciles what it finds against the Content Directory tree through
//! the Storage Engine, the only component allowed to mutate it. Reused
//! by both a one-shot initial scan and the autoscan timer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::cds::object::{CdsObject, HandlerType, ResAttr, Resource, ResourcePurpose};
use crate::cds::storage::{ChangedContainers, StorageBackend};
use crate::cds::subscription::SubscriptionBus;
use crate::platform::filesystem::{get_mime_type_for_extension, FileSystemManager};

/// One importer per configured root; `root_path` is the media directory
/// it scans, `virtual_path` is the container path it lands objects under
/// (mirroring the source tree unless a scripting layout overrides it).
pub struct Importer {
    filesystem: Arc<dyn FileSystemManager>,
    storage: Arc<dyn StorageBackend>,
    subscriptions: Arc<SubscriptionBus>,
}

impl Importer {
    pub fn new(
        filesystem: Arc<dyn FileSystemManager>,
        storage: Arc<dyn StorageBackend>,
        subscriptions: Arc<SubscriptionBus>,
    ) -> Self {
        Self { filesystem, storage, subscriptions }
    }

    /// Scans `root_path` and imports everything found under it, creating
    /// one container per intermediate path component. The parent chain
    /// stays acyclic because `add_container_chain` only ever appends to
    /// an existing, validated ancestor.
    pub async fn scan(&self, root_path: &Path) -> crate::cds::error::CdsResult<ChangedContainers> {
        let mut changed = ChangedContainers::default();

        let files = match self.filesystem.scan_media_directory(root_path).await {
            Ok(files) => files,
            Err(e) => {
                warn!(path = %root_path.display(), error = %e, "autoscan directory scan failed");
                return Ok(changed);
            }
        };

        info!(path = %root_path.display(), count = files.len(), "importer scan found media files");

        for file in files {
            let relative = match file.path.strip_prefix(root_path) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            match self.import_one(&file.path, &relative, &file.mime_type, file.size).await {
                Ok(touched) => changed.merge(touched),
                Err(e) => warn!(path = %file.path.display(), error = %e, "failed to import media file"),
            }
        }

        Ok(changed)
    }

    /// Imports a single file discovered outside a full directory scan —
    /// the watcher's add/update path. `root_path` anchors the virtual
    /// container path the same way `scan` does for every file it finds.
    pub async fn import_file(&self, root_path: &Path, absolute_path: &Path) -> crate::cds::error::CdsResult<ChangedContainers> {
        let relative = absolute_path.strip_prefix(root_path).unwrap_or(absolute_path).to_path_buf();
        let mime_type = mime_for_path(&absolute_path.to_path_buf());
        let size = tokio::fs::metadata(absolute_path).await.map(|m| m.len()).unwrap_or(0);
        self.import_one(absolute_path, &relative, &mime_type, size).await
    }

    /// Resolves (creating if necessary) the container that should hold
    /// objects found under `directory`, anchored at `root`. Used by the
    /// autoscan scheduler to attach a persistent container to a
    /// configured autoscan directory before registering it.
    pub async fn container_for_directory(&self, root: &Path, directory: &Path) -> crate::cds::error::CdsResult<i64> {
        let relative = directory.strip_prefix(root).unwrap_or_else(|_| Path::new(""));
        if relative.as_os_str().is_empty() {
            return Ok(crate::cds::object::FS_ROOT_ID);
        }
        let virtual_path = component_strings(relative).join("/");
        let (leaf_id, _created) = self
            .storage
            .add_container_chain(&virtual_path, "object.container.storageFolder", None, &BTreeMap::new())
            .await?;
        Ok(leaf_id)
    }

    /// Removes whatever object corresponds to `absolute_path`, if any,
    /// and prunes any container left empty by the removal. The watcher's
    /// delete path; a no-op (empty `ChangedContainers`) when the path was
    /// never imported.
    pub async fn remove_file(&self, absolute_path: &Path) -> crate::cds::error::CdsResult<ChangedContainers> {
        let fullpath = absolute_path.to_string_lossy();
        let found = self.storage.find_object_by_path(&fullpath, true).await?;
        let Some(obj) = found else {
            return Ok(ChangedContainers::default());
        };

        let mut changed = self.storage.remove_object(obj.id, false).await?;
        let pruned = self.storage.purge_empty_containers(&changed).await?;
        changed.merge(pruned);
        self.subscriptions.publish(&changed).await;
        Ok(changed)
    }

    async fn import_one(
        &self,
        absolute_path: &Path,
        relative_path: &Path,
        mime_type: &str,
        size: u64,
    ) -> crate::cds::error::CdsResult<ChangedContainers> {
        let parent_dirs = relative_path.parent().map(component_strings).unwrap_or_default();
        let title = relative_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| absolute_path.display().to_string());

        let upnp_class = upnp_class_for_mime(mime_type);
        let virtual_path = if parent_dirs.is_empty() {
            String::new()
        } else {
            parent_dirs.join("/")
        };

        let (parent_id, _created) = if virtual_path.is_empty() {
            (crate::cds::object::FS_ROOT_ID, Vec::new())
        } else {
            self.storage
                .add_container_chain(&virtual_path, "object.container.storageFolder", None, &BTreeMap::new())
                .await?
        };

        let mut obj = CdsObject::new_pure_item(0, parent_id, title, absolute_path.to_string_lossy());
        obj.upnp_class = upnp_class.to_string();
        obj.mime_type = Some(mime_type.to_string());
        obj.add_resource(
            Resource::new(0, handler_type_for_mime(mime_type), ResourcePurpose::Primary)
                .with_attr(ResAttr::ProtocolInfo, format!("http-get:*:{mime_type}:*"))
                .with_attr(ResAttr::Size, size.to_string()),
        );

        let (_id, touched_container) = self.storage.add_object(&obj).await?;
        let mut changed = ChangedContainers::default();
        changed.upnp.insert(parent_id);
        if let Some(id) = touched_container {
            changed.upnp.insert(id);
        }
        self.subscriptions.publish(&changed).await;
        Ok(changed)
    }
}

fn component_strings(path: &Path) -> Vec<String> {
    path.components().filter_map(|c| c.as_os_str().to_str().map(str::to_string)).collect()
}

fn upnp_class_for_mime(mime_type: &str) -> &'static str {
    if mime_type.starts_with("video/") {
        "object.item.videoItem"
    } else if mime_type.starts_with("audio/") {
        "object.item.audioItem"
    } else if mime_type.starts_with("image/") {
        "object.item.imageItem"
    } else {
        "object.item"
    }
}

fn handler_type_for_mime(mime_type: &str) -> HandlerType {
    if mime_type.starts_with("audio/") {
        HandlerType::Id3
    } else if mime_type.starts_with("video/") {
        HandlerType::Mp4
    } else {
        HandlerType::Generic
    }
}

/// Resolves a MIME type for an arbitrary extension without going through
/// a full directory scan — used by the Scripting-Layout port when it
/// synthesizes a reference to a file outside the scanned set.
pub fn mime_for_path(path: &PathBuf) -> String {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    get_mime_type_for_extension(extension)
}
