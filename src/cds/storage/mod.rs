//! The Storage Engine: the sole mutator of the object, metadata,
//! resource, and autoscan tables. `StorageBackend` is the dialect-agnostic
//! contract; `sqlite::SqliteStorage` is the only dialect with a full
//! worker-thread implementation in this crate — see DESIGN.md for why
//! Postgres/MySQL stop at the column-mapper layer.

pub mod column_mapper;
pub mod migration;
pub mod sqlite;

use async_trait::async_trait;
use std::collections::HashSet;

use crate::cds::error::CdsResult;
use crate::cds::object::CdsObject;

/// Recursion cap for `removeObject`'s transitive-closure walk — guards
/// against malformed parent/reference graphs.
pub const MAX_REMOVE_RECURSION: usize = 1_000;
/// Batch size for delete statements issued by `removeObjects`.
pub const MAX_REMOVE_SIZE: usize = 500;
/// `res_id` values start at 0 and stay densely packed after any write.
pub const RES_ID_DENSE_FROM: usize = 0;
/// SQL `LIMIT` cap used when `RequestedCount == 0` means "all".
pub const UNBOUNDED_LIMIT: i64 = 10_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoscanMode {
    Timed,
    INotify,
}

#[derive(Debug, Clone)]
pub struct AutoscanDirectory {
    pub id: Option<i64>,
    pub object_id: Option<i64>,
    pub location: String,
    pub mode: AutoscanMode,
    pub recursive: bool,
    pub hidden_files: bool,
    pub interval_secs: u64,
    pub last_modified: i64,
    /// Dot-separated ancestor-id path, used for O(1) overlap detection.
    pub ancestor_path: String,
    pub persistent: bool,
    pub touched: bool,
}

impl AutoscanDirectory {
    /// Property Q7 / invariant-style overlap rule: a recursive autoscan on
    /// X forbids any autoscan on a descendant of X and vice versa, and a
    /// second autoscan directly on X.
    pub fn overlaps(&self, other: &AutoscanDirectory) -> bool {
        if self.ancestor_path == other.ancestor_path {
            return true;
        }
        let self_is_ancestor = other.ancestor_path.starts_with(&format!("{}.", self.ancestor_path));
        let other_is_ancestor = self.ancestor_path.starts_with(&format!("{}.", other.ancestor_path));
        (self.recursive && self_is_ancestor) || (other.recursive && other_is_ancestor)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BrowseFlags {
    pub direct_children: bool,
    pub containers_only: bool,
    pub items_only: bool,
    pub hide_fs_root: bool,
    pub track_sort: bool,
    pub metadata: bool,
}

#[derive(Debug, Clone)]
pub struct BrowseParam {
    pub parent_id: i64,
    pub flags: BrowseFlags,
    pub starting_index: i64,
    pub requested_count: i64,
    pub sort_criteria: String,
    pub dynamic_containers_allowed: bool,
    pub group: String,
    /// Filled in by `browse()`; read back by the caller.
    pub total_matches: i64,
}

impl BrowseParam {
    pub fn direct_children(parent_id: i64) -> Self {
        Self {
            parent_id,
            flags: BrowseFlags { direct_children: true, ..Default::default() },
            starting_index: 0,
            requested_count: 0,
            sort_criteria: String::new(),
            dynamic_containers_allowed: true,
            group: "primary".to_string(),
            total_matches: 0,
        }
    }

    /// LIMIT value to splice into the SELECT: 0 means "all", capped at
    /// 10^10 for SQL LIMIT.
    pub fn sql_limit(&self) -> i64 {
        if self.requested_count <= 0 {
            UNBOUNDED_LIMIT
        } else {
            self.requested_count
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchParam {
    pub container_id: i64,
    pub search_criteria: String,
    pub starting_index: i64,
    pub requested_count: i64,
    pub sort_criteria: String,
    pub group: String,
}

/// Split result of a mutation: `upnp` drives subscription events, `ui`
/// drives admin-view refresh.
#[derive(Debug, Clone, Default)]
pub struct ChangedContainers {
    pub upnp: HashSet<i64>,
    pub ui: HashSet<i64>,
}

impl ChangedContainers {
    pub fn merge(&mut self, other: ChangedContainers) {
        self.upnp.extend(other.upnp);
        self.ui.extend(other.ui);
    }
}

#[derive(Debug, Clone)]
pub struct InternalSetting {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValueStatus {
    Unchanged,
    Changed,
    Manual,
    Removed,
    Killed,
}

#[derive(Debug, Clone)]
pub struct ConfigValue {
    pub item_xpath: String,
    pub key: String,
    pub value: String,
    pub status: ConfigValueStatus,
}

#[derive(Debug, Clone)]
pub struct ClientObservation {
    pub addr: String,
    pub port: u16,
    pub last_seen: i64,
    pub first_seen: i64,
    pub user_agent: Option<String>,
    pub headers: String,
    pub profile_name: Option<String>,
}

/// The dialect-agnostic Storage Engine contract.
///
/// Every write-path method upholds the object model's structural
/// invariants (acyclic parent chains, dense resource ids, monotonic
/// update ids, cascading deletes). Callers bracket multi-step mutations
/// with `begin_transaction`/`commit`/`rollback`; these are no-ops when
/// the backend has transactions disabled by config.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn begin_transaction(&self, name: &str) -> CdsResult<()>;
    async fn commit(&self) -> CdsResult<()>;
    async fn rollback(&self) -> CdsResult<()>;

    async fn add_object(&self, obj: &CdsObject) -> CdsResult<(i64, Option<i64>)>;
    async fn update_object(&self, obj: &CdsObject) -> CdsResult<Option<i64>>;
    async fn load_object(&self, id: i64) -> CdsResult<CdsObject>;

    async fn browse(&self, param: &mut BrowseParam) -> CdsResult<Vec<CdsObject>>;
    async fn search(&self, param: &SearchParam) -> CdsResult<(Vec<CdsObject>, i64)>;

    async fn add_container_chain(
        &self,
        virtual_path: &str,
        last_class: &str,
        last_ref_id: Option<i64>,
        last_metadata: &std::collections::BTreeMap<String, String>,
    ) -> CdsResult<(i64, Vec<i64>)>;

    async fn remove_object(&self, id: i64, cascade: bool) -> CdsResult<ChangedContainers>;
    async fn remove_objects(&self, ids: &[i64], cascade: bool) -> CdsResult<ChangedContainers>;
    async fn purge_empty_containers(&self, changed: &ChangedContainers) -> CdsResult<ChangedContainers>;

    async fn find_object_by_path(&self, fullpath: &str, was_regular_file: bool) -> CdsResult<Option<CdsObject>>;

    async fn get_autoscan_list(&self, mode: AutoscanMode) -> CdsResult<Vec<AutoscanDirectory>>;
    async fn add_autoscan_directory(&self, dir: AutoscanDirectory) -> CdsResult<i64>;
    async fn update_autoscan_directory(&self, dir: &AutoscanDirectory) -> CdsResult<()>;
    async fn remove_autoscan_directory(&self, id: i64) -> CdsResult<()>;
    async fn check_overlapping_autoscans(&self, candidate: &AutoscanDirectory) -> CdsResult<()>;

    /// Atomically increments `update_id` on each container and returns
    /// the `(id, new_value)` pairs (property R3: empty input → empty output).
    async fn increment_update_ids(&self, ids: &[i64]) -> CdsResult<Vec<(i64, i64)>>;

    async fn get_internal_setting(&self, key: &str) -> CdsResult<Option<String>>;
    async fn set_internal_setting(&self, key: &str, value: &str) -> CdsResult<()>;

    async fn save_config_value(&self, value: &ConfigValue) -> CdsResult<()>;
    async fn load_config_values(&self) -> CdsResult<Vec<ConfigValue>>;

    async fn save_client_observation(&self, obs: &ClientObservation) -> CdsResult<()>;
    async fn load_client_observations(&self) -> CdsResult<Vec<ClientObservation>>;
}
