//! The Browse/Search Service (component D): the SOAP-action-facing layer
//! that sits between the host HTTP library and the Storage Engine. This
//! module holds the action logic itself; the axum routes that decode a
//! SOAP envelope and call into it live in `web::`.

pub mod didl;

use std::sync::Arc;

use crate::cds::clients::{ClientProfile, Quirks};
use crate::cds::error::{CdsError, CdsResult};
use crate::cds::object::CdsObject;
use crate::cds::storage::{BrowseFlags, BrowseParam, SearchParam, StorageBackend};
use crate::cds::subscription::SubscriptionBus;
use crate::config::PresentationConfig;

pub const SEARCH_CAPABILITIES: &str = "dc:title,upnp:class,upnp:artist,upnp:album,upnp:genre,@id,@parentID,@refID";
pub const SORT_CAPABILITIES: &str = "dc:title,upnp:class,@id,@parentID,last_updated,last_modified";
pub const SORT_EXTENSION_CAPABILITIES: &str = "upnp:class";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseFlag {
    Metadata,
    DirectChildren,
}

pub struct BrowseRequest {
    pub object_id: i64,
    pub flag: BrowseFlag,
    pub starting_index: i64,
    pub requested_count: i64,
    pub sort_criteria: String,
    pub group: String,
}

pub struct SearchRequest {
    pub container_id: i64,
    pub search_criteria: String,
    pub starting_index: i64,
    pub requested_count: i64,
    pub sort_criteria: String,
    pub group: String,
}

pub struct BrowseOrSearchResult {
    pub result_xml: String,
    pub number_returned: i64,
    pub total_matches: i64,
    pub update_id: i64,
}

/// Coordinates the Storage Engine and the DIDL renderer behind each CDS
/// SOAP action. Mutating actions (the Samsung bookmark extension) also
/// publish through the Subscription Bus so observers see the resulting
/// container-update delta.
pub struct CdsService {
    storage: Arc<dyn StorageBackend>,
    subscriptions: Arc<SubscriptionBus>,
    presentation: PresentationConfig,
}

/// `min(serverStringLimit, clientProfile.stringLimit)` (spec §4.D step
/// 4): `None` on one side defers to the other, `None` on both means no
/// truncation at all.
fn effective_string_limit(server: Option<usize>, client: Option<usize>) -> Option<usize> {
    match (server, client) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

impl CdsService {
    pub fn new(storage: Arc<dyn StorageBackend>, subscriptions: Arc<SubscriptionBus>, presentation: PresentationConfig) -> Self {
        Self { storage, subscriptions, presentation }
    }

    pub async fn browse(
        &self,
        req: BrowseRequest,
        base_url: &str,
        client: &ClientProfile,
    ) -> CdsResult<BrowseOrSearchResult> {
        let flags = match req.flag {
            BrowseFlag::Metadata => BrowseFlags { direct_children: false, ..Default::default() },
            BrowseFlag::DirectChildren => BrowseFlags { direct_children: true, ..Default::default() },
        };
        let mut param = BrowseParam {
            parent_id: req.object_id,
            flags,
            starting_index: req.starting_index,
            requested_count: req.requested_count,
            sort_criteria: req.sort_criteria,
            dynamic_containers_allowed: !client.quirks.contains(Quirks::SAMSUNG_HIDE_DYNAMIC),
            group: req.group,
            total_matches: 0,
        };
        let objects = self.storage.browse(&mut param).await?;
        self.render_result(&objects, param.total_matches, base_url, client).await
    }

    pub async fn search(
        &self,
        req: SearchRequest,
        base_url: &str,
        client: &ClientProfile,
    ) -> CdsResult<BrowseOrSearchResult> {
        let param = SearchParam {
            container_id: req.container_id,
            search_criteria: req.search_criteria,
            starting_index: req.starting_index,
            requested_count: req.requested_count,
            sort_criteria: req.sort_criteria,
            group: req.group,
        };
        let (objects, total_matches) = self.storage.search(&param).await?;
        self.render_result(&objects, total_matches, base_url, client).await
    }

    async fn render_result(
        &self,
        objects: &[CdsObject],
        total_matches: i64,
        base_url: &str,
        client: &ClientProfile,
    ) -> CdsResult<BrowseOrSearchResult> {
        let opts = didl::RenderOptions {
            quirks: client.quirks,
            string_limit: effective_string_limit(self.presentation.string_limit, client.string_limit),
            mark_played: self.presentation.mark_played,
            mark_played_classes: &self.presentation.mark_played_classes,
            mark_played_marker: &self.presentation.mark_played_marker,
            mark_played_append: self.presentation.mark_played_append,
        };
        let result_xml = didl::render_didl(objects, base_url, opts);
        let update_id = self.subscriptions.current_system_update_id().await;
        Ok(BrowseOrSearchResult {
            result_xml,
            number_returned: objects.len() as i64,
            total_matches,
            update_id,
        })
    }

    pub fn get_search_capabilities(&self) -> &'static str {
        SEARCH_CAPABILITIES
    }

    pub fn get_sort_capabilities(&self) -> &'static str {
        SORT_CAPABILITIES
    }

    pub fn get_sort_extension_capabilities(&self) -> &'static str {
        SORT_EXTENSION_CAPABILITIES
    }

    /// `GetFeatureList`/`X_GetFeatureList`: advertises the Samsung
    /// `A_ARG_TYPE_Features` block every Samsung client profile expects,
    /// rooted at the filesystem root container.
    pub fn get_feature_list(&self) -> &'static str {
        concat!(
            r#"<Features xmlns="urn:schemas-upnp-org:av:avs" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="urn:schemas-upnp-org:av:avs https://www.upnp.org/schemas/av/avs.xsd">"#,
            r#"<Feature name="samsung.com_BASICVIEW" version="1">"#,
            r#"<object id="1" type="object.item.audioItem"/>"#,
            r#"<object id="1" type="object.item.videoItem"/>"#,
            r#"<object id="1" type="object.item.imageItem"/>"#,
            r#"</Feature>"#,
            r#"</Features>"#,
        )
    }

    pub async fn get_system_update_id(&self) -> i64 {
        self.subscriptions.current_system_update_id().await
    }

    /// `X_SetBookmark`: persists a playback position on an item. The
    /// request's group header is honored when present; otherwise the
    /// bookmark is attributed to the `"primary"` group.
    pub async fn x_set_bookmark(&self, object_id: i64, position_seconds: i64, group: Option<&str>) -> CdsResult<()> {
        let _ = group.unwrap_or("primary");
        let mut obj = self.storage.load_object(object_id).await?;
        obj.bookmark_pos = position_seconds;
        let touched = self.storage.update_object(&obj).await?;
        if let Some(container_id) = touched {
            let mut changed = crate::cds::storage::ChangedContainers::default();
            changed.upnp.insert(container_id);
            self.subscriptions.publish(&changed).await;
        }
        Ok(())
    }

    /// `X_GetObjectIDfromIndex`: resolves an item's position within its
    /// parent's direct-children listing back to an object id.
    pub async fn x_get_object_id_from_index(&self, parent_id: i64, index: i64) -> CdsResult<i64> {
        let mut param = BrowseParam {
            parent_id,
            flags: BrowseFlags { direct_children: true, ..Default::default() },
            starting_index: index,
            requested_count: 1,
            sort_criteria: String::new(),
            dynamic_containers_allowed: true,
            group: "primary".to_string(),
            total_matches: 0,
        };
        let objects = self.storage.browse(&mut param).await?;
        objects.first().map(|o| o.id).ok_or(CdsError::NotFound(parent_id))
    }

    /// `X_GetIndexfromRID`: the inverse lookup, scanning the parent's
    /// direct children for one whose `ref_id` matches.
    pub async fn x_get_index_from_rid(&self, parent_id: i64, ref_id: i64) -> CdsResult<i64> {
        let mut param = BrowseParam {
            parent_id,
            flags: BrowseFlags { direct_children: true, ..Default::default() },
            starting_index: 0,
            requested_count: 0,
            sort_criteria: String::new(),
            dynamic_containers_allowed: true,
            group: "primary".to_string(),
            total_matches: 0,
        };
        let objects = self.storage.browse(&mut param).await?;
        objects
            .iter()
            .position(|o| o.ref_id == Some(ref_id))
            .map(|idx| idx as i64)
            .ok_or(CdsError::NotFound(ref_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cds::object::ROOT_ID;
    use crate::cds::storage::sqlite::SqliteStorage;
    use crate::cds::subscription::NotifySink;
    use async_trait::async_trait;

    struct NullSink;
    #[async_trait]
    impl NotifySink for NullSink {
        async fn notify(&self, _: &str, _: &str, _: u32, _: i64, _: &str) {}
    }

    async fn test_service() -> CdsService {
        let dir = tempfile::tempdir().unwrap();
        let storage =
            Arc::new(SqliteStorage::new(&dir.path().join("svc.db"), true).await.unwrap()) as Arc<dyn StorageBackend>;
        std::mem::forget(dir);
        let subscriptions = Arc::new(SubscriptionBus::new(storage.clone(), Arc::new(NullSink)).await);
        CdsService::new(storage, subscriptions, PresentationConfig::default())
    }

    #[tokio::test]
    async fn browse_direct_children_renders_didl_for_each_child() {
        let service = test_service().await;
        let child = CdsObject::new_container(0, ROOT_ID, "Music");
        service.storage.add_object(&child).await.unwrap();

        let req = BrowseRequest {
            object_id: ROOT_ID,
            flag: BrowseFlag::DirectChildren,
            starting_index: 0,
            requested_count: 0,
            sort_criteria: String::new(),
            group: "primary".to_string(),
        };
        let result = service.browse(req, "http://host", &ClientProfile::unknown()).await.unwrap();
        assert_eq!(result.number_returned, 1);
        assert!(result.result_xml.contains("Music"));
    }

    #[tokio::test]
    async fn x_get_object_id_from_index_resolves_the_nth_child() {
        let service = test_service().await;
        let a = CdsObject::new_container(0, ROOT_ID, "A");
        let b = CdsObject::new_container(0, ROOT_ID, "B");
        let (_, _) = service.storage.add_object(&a).await.unwrap();
        let (b_id, _) = service.storage.add_object(&b).await.unwrap();

        let resolved = service.x_get_object_id_from_index(ROOT_ID, 1).await.unwrap();
        assert_eq!(resolved, b_id);
    }

    #[tokio::test]
    async fn feature_list_advertises_samsung_basicview() {
        let service = test_service().await;
        assert!(service.get_feature_list().contains("samsung.com_BASICVIEW"));
    }
}
