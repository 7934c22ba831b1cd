//! SQLite implementation of the Storage Engine. A single background task
//! drains a FIFO job queue and is the only task that ever touches the
//! `SqlitePool` directly: one dedicated worker owns the database handle
//! exclusively, without introducing OS threads — tokio tasks are this
//! project's concurrency unit. Every `StorageBackend` method funnels its
//! work through `submit`, which hands a boxed closure to the worker and
//! waits on a oneshot for the result; nothing outside the worker loop
//! ever holds the pool. Helper functions that need to run *inside* an
//! already-submitted job (e.g. `add_object` walking the container chain)
//! take `&SqlitePool` directly rather than calling back into a trait
//! method, since a nested `submit` would queue behind its own caller and
//! deadlock the single worker.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tracing::{debug, warn};

use crate::cds::error::{CdsError, CdsResult};
use crate::cds::object::{
    location_hash, normalize_location, CdsObject, CdsObjectKind, HandlerType, ObjectFlags, ResAttr, Resource,
    ResourcePurpose,
};
use crate::cds::search::sql_emit::compile_search;
use crate::cds::search::sort::compile_sort;

use super::{
    AutoscanDirectory, AutoscanMode, BrowseParam, ChangedContainers, ClientObservation, ConfigValue,
    ConfigValueStatus, SearchParam, StorageBackend, MAX_REMOVE_RECURSION, MAX_REMOVE_SIZE,
};

type BoxFut<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type Job = Box<dyn FnOnce(SqlitePool) -> BoxFut<()> + Send>;

fn now_ts() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn object_type_bits(kind: &CdsObjectKind) -> i64 {
    match kind {
        CdsObjectKind::Container { .. } => 1,
        CdsObjectKind::ItemPure { .. } => 2,
        CdsObjectKind::ItemExternalUrl { .. } => 4,
        CdsObjectKind::ItemPlaylistRef { .. } => 8,
    }
}

/// SQLite-backed engine. Clone is cheap: the job channel and pool are
/// both internally reference-counted.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    job_tx: mpsc::Sender<Job>,
    transactions_enabled: bool,
    in_transaction: Arc<AtomicBool>,
    /// Dynamic (query-defined) containers materialized during browse,
    /// cached in memory rather than round-tripped through SQL.
    dynamic_containers: Arc<AsyncMutex<HashMap<i64, CdsObject>>>,
}

impl SqliteStorage {
    pub async fn new(db_path: &std::path::Path, transactions_enabled: bool) -> CdsResult<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CdsError::DatabaseFailure(sqlx::Error::Io(e))
            })?;
        }
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&url).await?;

        let (job_tx, mut job_rx) = mpsc::channel::<Job>(256);
        let worker_pool = pool.clone();
        tokio::spawn(async move {
            while let Some(job) = job_rx.recv().await {
                job(worker_pool.clone()).await;
            }
            debug!("storage worker task exiting: job queue closed");
        });

        let storage = Self {
            pool,
            job_tx,
            transactions_enabled,
            in_transaction: Arc::new(AtomicBool::new(false)),
            dynamic_containers: Arc::new(AsyncMutex::new(HashMap::new())),
        };
        storage.initialize().await?;
        Ok(storage)
    }

    async fn initialize(&self) -> CdsResult<()> {
        self.submit(|pool| async move {
            sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
            sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
            sqlx::query("PRAGMA synchronous = NORMAL").execute(&pool).await?;

            let script = super::migration::init_script("sqlite");
            for stmt in script.split(';') {
                let stmt = stmt.trim();
                if stmt.is_empty() || stmt.starts_with("--") {
                    continue;
                }
                sqlx::query(stmt).execute(&pool).await?;
            }

            let version = get_internal_setting_impl(&pool, "db_version").await?;
            if version.is_none() {
                set_internal_setting_impl(&pool, "db_version", "1").await?;
                set_internal_setting_impl(&pool, "string_limit", "10000").await?;
                set_internal_setting_impl(&pool, "system_update_id", "0").await?;
            } else {
                for step in super::migration::UPGRADE_STEPS {
                    let current: u32 = get_internal_setting_impl(&pool, "db_version")
                        .await?
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(1);
                    if step.version <= current {
                        continue;
                    }
                    super::migration::verify_step(step)?;
                    sqlx::query(step.ddl).execute(&pool).await?;
                    set_internal_setting_impl(&pool, "db_version", &step.version.to_string()).await?;
                }
            }

            reconcile_resource_attribute_columns(&pool).await?;
            Ok(())
        })
        .await
    }

    /// Submits a job to the single worker task and awaits its result,
    /// preserving FIFO ordering across all callers.
    async fn submit<T, F, Fut>(&self, f: F) -> CdsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(SqlitePool) -> Fut + Send + 'static,
        Fut: Future<Output = CdsResult<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |pool| {
            Box::pin(async move {
                let result = f(pool).await;
                let _ = tx.send(result);
            })
        });
        self.job_tx
            .send(job)
            .await
            .map_err(|_| CdsError::DatabaseFailure(sqlx::Error::WorkerCrashed))?;
        rx.await.map_err(|_| CdsError::DatabaseFailure(sqlx::Error::WorkerCrashed))?
    }

    /// Registers a synthetic dynamic (query-defined) container so
    /// subsequent browses by its negative id succeed without a DB hit.
    /// Purely in-memory: never touches the worker.
    pub async fn cache_dynamic_container(&self, id: i64, container: CdsObject) {
        self.dynamic_containers.lock().await.insert(id, container);
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn load_metadata(pool: &SqlitePool, item_id: i64) -> CdsResult<BTreeMap<String, String>> {
    let rows = sqlx::query("SELECT property_name, property_value FROM object_metadata WHERE item_id = ?")
        .bind(item_id)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.get::<String, _>(0), r.get::<String, _>(1)))
        .collect())
}

async fn load_auxdata(pool: &SqlitePool, item_id: i64) -> CdsResult<BTreeMap<String, String>> {
    let rows = sqlx::query("SELECT aux_key, aux_value FROM object_auxdata WHERE item_id = ?")
        .bind(item_id)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.get::<String, _>(0), r.get::<String, _>(1)))
        .collect())
}

/// The resource-attribute reconciliation pass (spec §4.B Migration): adds
/// one typed column per `ResAttr` variant not already present on
/// `object_resource`, and persists the resulting column set so the set
/// of columns added is recorded, not just inferred at read time.
async fn reconcile_resource_attribute_columns(pool: &SqlitePool) -> CdsResult<()> {
    let rows = sqlx::query("PRAGMA table_info(object_resource)").fetch_all(pool).await?;
    let existing: Vec<String> = rows.iter().map(|r| r.get::<String, _>("name")).collect();
    for column in super::migration::resource_attribute_columns_to_add(&existing) {
        let stmt = format!("ALTER TABLE object_resource ADD COLUMN {column} TEXT");
        sqlx::query(&stmt).execute(pool).await?;
    }
    let all_columns: Vec<&'static str> = ResAttr::ALL.iter().map(|a| a.column_name()).collect();
    set_internal_setting_impl(pool, "resource_attribute_columns", &all_columns.join(",")).await
}

/// Comma-joined `, col1, col2, ...` fragment for every reconciled
/// resource-attribute column, spliced into `SELECT`/`INSERT` statements
/// that need all of them regardless of which ones a given resource sets.
fn resource_attribute_column_list() -> String {
    ResAttr::ALL.iter().map(|a| format!(", {}", a.column_name())).collect()
}

async fn load_resources(pool: &SqlitePool, item_id: i64) -> CdsResult<Vec<Resource>> {
    let sql = format!(
        "SELECT res_id, handler_type, purpose, options, parameters{} FROM object_resource WHERE item_id = ? ORDER BY res_id",
        resource_attribute_column_list()
    );
    let rows = sqlx::query(&sql).bind(item_id).fetch_all(pool).await?;

    let mut resources = Vec::with_capacity(rows.len());
    for row in rows {
        let res_id: i64 = row.get(0);
        let handler_type = parse_handler_type(&row.get::<String, _>(1));
        let purpose = parse_purpose(&row.get::<String, _>(2));
        let mut res = Resource::new(res_id as i32, handler_type, purpose);
        res.options = decode_kv(&row.get::<String, _>(3));
        res.parameters = decode_kv(&row.get::<String, _>(4));
        for (i, attr) in ResAttr::ALL.iter().enumerate() {
            let value: Option<String> = row.get(5 + i);
            if let Some(v) = value {
                res.attributes.insert(*attr, v);
            }
        }
        resources.push(res);
    }
    Ok(resources)
}

fn row_to_object(pool: &SqlitePool, row: &sqlx::sqlite::SqliteRow) -> BoxFut<CdsResult<CdsObject>> {
    let id: i64 = row.get("id");
    let parent_id: i64 = row.get("parent_id");
    let ref_id: Option<i64> = row.get("ref_id");
    let object_type: i64 = row.get("object_type");
    let upnp_class: String = row.get("upnp_class");
    let dc_title: String = row.get("dc_title");
    let location: Option<String> = row.get("location");
    let location_hash_val: Option<i64> = row.get("location_hash");
    let mime_type: Option<String> = row.get("mime_type");
    let flags: i64 = row.get("flags");
    let last_modified: i64 = row.get("last_modified");
    let last_updated: i64 = row.get("last_updated");
    let service_id: Option<String> = row.get("service_id");
    let bookmark_pos: i64 = row.get("bookmark_pos");
    let part_number: Option<i64> = row.get("part_number");
    let track_number: Option<i64> = row.get("track_number");
    let update_id: i64 = row.get("update_id");
    let autoscan_attached = row.try_get::<Option<i64>, _>("autoscan_id").ok().flatten().is_some();
    let pool = pool.clone();

    Box::pin(async move {
        let kind = match object_type {
            1 => CdsObjectKind::Container {
                update_id,
                autoscan_attached,
                is_dynamic_folder: upnp_class == "object.container.dynamicFolder",
            },
            4 => CdsObjectKind::ItemExternalUrl { location: location.clone().unwrap_or_default() },
            8 => CdsObjectKind::ItemPlaylistRef { ref_id: ref_id.unwrap_or(0) },
            _ => CdsObjectKind::ItemPure { location: location.clone().unwrap_or_default() },
        };

        let mut obj = CdsObject {
            id,
            parent_id,
            ref_id,
            upnp_class,
            dc_title,
            location,
            location_hash: location_hash_val.unwrap_or(0) as u32,
            mime_type,
            flags: ObjectFlags::from_bits_truncate(flags as u32),
            last_modified,
            last_updated,
            service_id,
            bookmark_pos,
            part_number: part_number.map(|v| v as i32),
            track_number: track_number.map(|v| v as i32),
            auxdata: load_auxdata(&pool, id).await?,
            metadata: load_metadata(&pool, id).await?,
            resources: load_resources(&pool, id).await?,
            kind,
        };

        // Back-fill inherited fields from the reference row.
        if let Some(rid) = ref_id {
            if let Some(reference_row) = sqlx::query("SELECT * FROM cds_object WHERE id = ?")
                .bind(rid)
                .fetch_optional(&pool)
                .await?
            {
                let reference = row_to_object(&pool, &reference_row).await?;
                obj.inherit_from_reference(&reference);
            }
        }

        Ok(obj)
    })
}

async fn get_internal_setting_impl(pool: &SqlitePool, key: &str) -> CdsResult<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM internal_setting WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

async fn set_internal_setting_impl(pool: &SqlitePool, key: &str, value: &str) -> CdsResult<()> {
    sqlx::query(
        "INSERT INTO internal_setting (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

async fn write_metadata_impl(pool: &SqlitePool, id: i64, metadata: &BTreeMap<String, String>) -> CdsResult<()> {
    for (k, v) in metadata {
        sqlx::query("INSERT INTO object_metadata (item_id, property_name, property_value) VALUES (?,?,?)")
            .bind(id)
            .bind(k)
            .bind(v)
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn write_auxdata_impl(pool: &SqlitePool, id: i64, auxdata: &BTreeMap<String, String>) -> CdsResult<()> {
    for (k, v) in auxdata {
        sqlx::query("INSERT INTO object_auxdata (item_id, aux_key, aux_value) VALUES (?,?,?)")
            .bind(id)
            .bind(k)
            .bind(v)
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn write_resources_impl(pool: &SqlitePool, id: i64, resources: &[Resource]) -> CdsResult<()> {
    let mut resources = resources.to_vec();
    crate::cds::object::renumber_dense(&mut resources);
    let attr_columns = resource_attribute_column_list();
    let attr_placeholders: String = ResAttr::ALL.iter().map(|_| ", ?").collect();
    let sql = format!(
        "INSERT INTO object_resource (item_id, res_id, handler_type, purpose, options, parameters{attr_columns}) VALUES (?,?,?,?,?,?{attr_placeholders})"
    );
    for res in &resources {
        let mut query = sqlx::query(&sql)
            .bind(id)
            .bind(res.res_id as i64)
            .bind(handler_type_str(res.handler_type))
            .bind(purpose_str(res.purpose))
            .bind(encode_kv(&res.options))
            .bind(encode_kv(&res.parameters));
        for attr in ResAttr::ALL {
            query = query.bind(res.attributes.get(&attr).cloned());
        }
        query.execute(pool).await?;
    }
    Ok(())
}

/// Walks `parent_path` creating any missing ancestor containers,
/// returning the id of the deepest newly-created one.
async fn ensure_path_existence_impl(pool: &SqlitePool, location: &str, declared_parent: i64) -> CdsResult<Option<i64>> {
    let path = std::path::Path::new(location);
    let Some(parent) = path.parent() else { return Ok(None) };
    let virtual_path = parent.to_string_lossy().to_string();
    if virtual_path.is_empty() {
        return Ok(None);
    }
    let (leaf_id, newly_affected) =
        add_container_chain_impl(pool, &virtual_path, "object.container", None, &BTreeMap::new()).await?;
    let _ = declared_parent;
    Ok(newly_affected.last().copied().or(Some(leaf_id)).filter(|_| !newly_affected.is_empty()))
}

async fn add_container_chain_impl(
    pool: &SqlitePool,
    virtual_path: &str,
    last_class: &str,
    last_ref_id: Option<i64>,
    last_metadata: &BTreeMap<String, String>,
) -> CdsResult<(i64, Vec<i64>)> {
    let segments: Vec<&str> = virtual_path.split('/').filter(|s| !s.is_empty()).collect();
    let mut parent_id = crate::cds::object::ROOT_ID;
    let mut newly_affected = Vec::new();
    let mut path_so_far = String::new();

    for (i, segment) in segments.iter().enumerate() {
        path_so_far.push('/');
        path_so_far.push_str(segment);

        let norm = normalize_location(&path_so_far);
        let hash = location_hash(&norm) as i64;
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM cds_object WHERE location_hash = ? AND location = ? AND object_type = 1",
        )
        .bind(hash)
        .bind(&path_so_far)
        .fetch_optional(pool)
        .await?;

        if let Some(id) = existing {
            parent_id = id;
            continue;
        }

        let is_leaf = i == segments.len() - 1;
        let class = if is_leaf { last_class.to_string() } else { "object.container".to_string() };
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO cds_object
                (parent_id, ref_id, object_type, upnp_class, dc_title, location, location_hash,
                 flags, last_modified, last_updated, bookmark_pos, update_id)
               VALUES (?, ?, 1, ?, ?, ?, ?, 0, ?, ?, 0, 0) RETURNING id"#,
        )
        .bind(parent_id)
        .bind(if is_leaf { last_ref_id } else { None })
        .bind(&class)
        .bind(*segment)
        .bind(&path_so_far)
        .bind(hash)
        .bind(now_ts())
        .bind(now_ts())
        .fetch_one(pool)
        .await?;

        if is_leaf {
            for (k, v) in last_metadata {
                sqlx::query("INSERT INTO object_metadata (item_id, property_name, property_value) VALUES (?,?,?)")
                    .bind(id)
                    .bind(k)
                    .bind(v)
                    .execute(pool)
                    .await?;
            }
        }

        newly_affected.push(id);
        parent_id = id;
    }

    Ok((parent_id, newly_affected))
}

async fn remove_objects_impl(pool: &SqlitePool, ids: &[i64], cascade: bool) -> CdsResult<ChangedContainers> {
    for id in ids {
        if crate::cds::object::is_forbidden_mutation_target(*id) {
            return Err(CdsError::InvalidArgument(format!("cannot remove fixed identity {id}")));
        }
    }

    let mut to_remove: HashSet<i64> = ids.iter().copied().collect();

    if cascade {
        let mut frontier: Vec<i64> = ids.to_vec();
        let mut iterations = 0usize;

        // Transitive closure over child-of and referenced-by edges.
        while !frontier.is_empty() {
            iterations += 1;
            if iterations > MAX_REMOVE_RECURSION {
                return Err(CdsError::InvalidArgument("removeObject recursion cap exceeded; object graph may be malformed".into()));
            }
            let mut next = Vec::new();
            for id in &frontier {
                let children: Vec<i64> = sqlx::query_scalar("SELECT id FROM cds_object WHERE parent_id = ?")
                    .bind(id)
                    .fetch_all(pool)
                    .await?;
                let referrers: Vec<i64> = sqlx::query_scalar("SELECT id FROM cds_object WHERE ref_id = ?")
                    .bind(id)
                    .fetch_all(pool)
                    .await?;
                for cand in children.into_iter().chain(referrers) {
                    if to_remove.insert(cand) {
                        next.push(cand);
                    }
                }
            }
            frontier = next;
        }
    } else {
        // Non-cascading removal must not touch descendants or references:
        // reject outright if any target still has children or referrers,
        // rather than silently orphaning rows.
        for id in ids {
            let child_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cds_object WHERE parent_id = ?")
                .bind(id)
                .fetch_one(pool)
                .await?;
            let referrer_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cds_object WHERE ref_id = ?")
                .bind(id)
                .fetch_one(pool)
                .await?;
            if child_count > 0 || referrer_count > 0 {
                return Err(CdsError::InvalidArgument(format!(
                    "cannot remove object {id} without cascade: it still has {child_count} children and {referrer_count} referrers"
                )));
            }
        }
    }

    let mut changed = ChangedContainers::default();
    let mut parent_ids = HashSet::new();
    for id in &to_remove {
        if let Ok(row) = sqlx::query("SELECT parent_id, flags, object_id FROM cds_object LEFT JOIN autoscan ON autoscan.object_id = cds_object.id WHERE cds_object.id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
        {
            let parent_id: i64 = row.get("parent_id");
            parent_ids.insert(parent_id);
        }

        let autoscan_row = sqlx::query("SELECT id, persistent, location FROM autoscan WHERE object_id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        if let Some(scan) = autoscan_row {
            let persistent: i64 = scan.get("persistent");
            let scan_id: i64 = scan.get("id");
            if persistent != 0 {
                sqlx::query("UPDATE autoscan SET object_id = NULL WHERE id = ?")
                    .bind(scan_id)
                    .execute(pool)
                    .await?;
            } else {
                sqlx::query("DELETE FROM autoscan WHERE id = ?").bind(scan_id).execute(pool).await?;
            }
        }
    }

    let ids_vec: Vec<i64> = to_remove.into_iter().collect();
    for chunk in ids_vec.chunks(MAX_REMOVE_SIZE) {
        let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("DELETE FROM cds_object WHERE id IN ({placeholders})");
        let mut q = sqlx::query(&sql);
        for id in chunk {
            q = q.bind(id);
        }
        q.execute(pool).await?;
    }

    changed.upnp.extend(parent_ids.iter().copied());
    changed.ui.extend(parent_ids);

    let purged = purge_empty_containers_impl(pool, &changed).await?;
    changed.merge(purged);
    Ok(changed)
}

async fn purge_empty_containers_impl(pool: &SqlitePool, changed: &ChangedContainers) -> CdsResult<ChangedContainers> {
    let mut result = ChangedContainers::default();
    let mut frontier: Vec<i64> = changed.upnp.iter().copied().collect();
    let mut iterations = 0usize;

    while !frontier.is_empty() {
        iterations += 1;
        if iterations > MAX_REMOVE_RECURSION {
            warn!("purgeEmptyContainers recursion cap reached");
            break;
        }
        let mut next = Vec::new();
        for id in &frontier {
            if crate::cds::object::is_forbidden_mutation_target(*id) {
                continue;
            }
            let row = sqlx::query("SELECT flags, parent_id FROM cds_object WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await?;
            let Some(row) = row else { continue };
            let flags = ObjectFlags::from_bits_truncate(row.get::<i64, _>("flags") as u32);
            if flags.contains(ObjectFlags::PERSISTENT_CONTAINER) {
                continue;
            }
            let child_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cds_object WHERE parent_id = ?")
                .bind(id)
                .fetch_one(pool)
                .await?;
            if child_count == 0 {
                let parent_id: i64 = row.get("parent_id");
                sqlx::query("DELETE FROM cds_object WHERE id = ?").bind(id).execute(pool).await?;
                result.upnp.insert(parent_id);
                result.ui.insert(parent_id);
                next.push(parent_id);
            }
        }
        frontier = next;
    }
    Ok(result)
}

async fn check_overlapping_autoscans_impl(pool: &SqlitePool, candidate: &AutoscanDirectory) -> CdsResult<()> {
    let rows = sqlx::query("SELECT ancestor_path, recursive FROM autoscan").fetch_all(pool).await?;
    for row in rows {
        let other = AutoscanDirectory {
            id: None,
            object_id: None,
            location: String::new(),
            mode: candidate.mode,
            recursive: row.get::<i64, _>("recursive") != 0,
            hidden_files: false,
            interval_secs: 0,
            last_modified: 0,
            ancestor_path: row.get("ancestor_path"),
            persistent: false,
            touched: false,
        };
        if candidate.overlaps(&other) {
            return Err(CdsError::OverlappingAutoscan(format!(
                "{} overlaps existing autoscan at {}",
                candidate.ancestor_path, other.ancestor_path
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    async fn begin_transaction(&self, name: &str) -> CdsResult<()> {
        if !self.transactions_enabled {
            return Ok(());
        }
        // Spin up to 100ms per attempt acquiring the per-connection flag.
        for _ in 0..10 {
            if self
                .in_transaction
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                debug!("begin transaction {name}");
                return Ok(());
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        Err(CdsError::DatabaseFailure(sqlx::Error::PoolTimedOut))
    }

    async fn commit(&self) -> CdsResult<()> {
        if self.transactions_enabled {
            self.in_transaction.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn rollback(&self) -> CdsResult<()> {
        if self.transactions_enabled {
            self.in_transaction.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn add_object(&self, obj: &CdsObject) -> CdsResult<(i64, Option<i64>)> {
        let obj = obj.clone();
        self.submit(move |pool| async move {
            if crate::cds::object::is_forbidden_mutation_target(obj.parent_id) && obj.parent_id != crate::cds::object::ROOT_ID {
                return Err(CdsError::InvalidArgument(format!("forbidden parent id {}", obj.parent_id)));
            }

            // Duplicate detection for reference-bearing inserts: a sibling
            // with identical parent/ref/title is silently dropped.
            if let Some(ref_id) = obj.ref_id {
                let existing: Option<i64> = sqlx::query_scalar(
                    "SELECT id FROM cds_object WHERE parent_id = ? AND ref_id = ? AND dc_title = ?",
                )
                .bind(obj.parent_id)
                .bind(ref_id)
                .bind(&obj.dc_title)
                .fetch_optional(&pool)
                .await?;
                if existing.is_some() {
                    warn!("duplicate reference insert dropped for parent {} ref {}", obj.parent_id, ref_id);
                    return Err(CdsError::DuplicateObject {
                        parent_id: obj.parent_id,
                        ref_id: Some(ref_id),
                        title: Some(obj.dc_title.clone()),
                    });
                }
            } else if obj.is_virtual() && obj.location.is_none() {
                return Err(CdsError::InvalidArgument("virtual item lacks both ref_id and location".into()));
            }

            let mut changed_container = None;
            if let CdsObjectKind::ItemPure { .. } = &obj.kind {
                if let Some(loc) = &obj.location {
                    changed_container = ensure_path_existence_impl(&pool, loc, obj.parent_id).await?;
                }
            }

            let norm = obj.location.as_deref().map(normalize_location);
            let loc_hash = norm.as_deref().map(location_hash);

            let id: i64 = sqlx::query_scalar(
                r#"INSERT INTO cds_object
                    (parent_id, ref_id, object_type, upnp_class, dc_title, location, location_hash,
                     mime_type, flags, last_modified, last_updated, service_id, bookmark_pos,
                     part_number, track_number, update_id)
                   VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,0)
                   RETURNING id"#,
            )
            .bind(obj.parent_id)
            .bind(obj.ref_id)
            .bind(object_type_bits(&obj.kind))
            .bind(&obj.upnp_class)
            .bind(&obj.dc_title)
            .bind(&obj.location)
            .bind(loc_hash.map(|h| h as i64))
            .bind(&obj.mime_type)
            .bind(obj.flags.bits() as i64)
            .bind(now_ts())
            .bind(now_ts())
            .bind(&obj.service_id)
            .bind(obj.bookmark_pos)
            .bind(obj.part_number)
            .bind(obj.track_number)
            .fetch_one(&pool)
            .await?;

            write_metadata_impl(&pool, id, &obj.metadata).await?;
            write_auxdata_impl(&pool, id, &obj.auxdata).await?;
            write_resources_impl(&pool, id, &obj.resources).await?;

            Ok((id, changed_container.take()))
        })
        .await
    }

    async fn update_object(&self, obj: &CdsObject) -> CdsResult<Option<i64>> {
        let obj = obj.clone();
        self.submit(move |pool| async move {
            let mut tx = pool.begin().await?;

            sqlx::query(
                r#"UPDATE cds_object SET upnp_class=?, dc_title=?, mime_type=?, flags=?, last_updated=?,
                   bookmark_pos=?, part_number=?, track_number=? WHERE id=?"#,
            )
            .bind(&obj.upnp_class)
            .bind(&obj.dc_title)
            .bind(&obj.mime_type)
            .bind(obj.flags.bits() as i64)
            .bind(now_ts())
            .bind(obj.bookmark_pos)
            .bind(obj.part_number)
            .bind(obj.track_number)
            .bind(obj.id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM object_metadata WHERE item_id = ?").bind(obj.id).execute(&mut *tx).await?;
            for (k, v) in &obj.metadata {
                sqlx::query("INSERT INTO object_metadata (item_id, property_name, property_value) VALUES (?,?,?)")
                    .bind(obj.id)
                    .bind(k)
                    .bind(v)
                    .execute(&mut *tx)
                    .await?;
            }

            sqlx::query("DELETE FROM object_resource WHERE item_id = ?").bind(obj.id).execute(&mut *tx).await?;
            let mut resources = obj.resources.clone();
            crate::cds::object::renumber_dense(&mut resources);
            let attr_columns = resource_attribute_column_list();
            let attr_placeholders: String = ResAttr::ALL.iter().map(|_| ", ?").collect();
            let res_sql = format!(
                "INSERT INTO object_resource (item_id, res_id, handler_type, purpose, options, parameters{attr_columns}) VALUES (?,?,?,?,?,?{attr_placeholders})"
            );
            for res in &resources {
                let mut query = sqlx::query(&res_sql)
                    .bind(obj.id)
                    .bind(res.res_id as i64)
                    .bind(handler_type_str(res.handler_type))
                    .bind(purpose_str(res.purpose))
                    .bind(encode_kv(&res.options))
                    .bind(encode_kv(&res.parameters));
                for attr in ResAttr::ALL {
                    query = query.bind(res.attributes.get(&attr).cloned());
                }
                query.execute(&mut *tx).await?;
            }

            tx.commit().await?;
            Ok(Some(obj.parent_id))
        })
        .await
    }

    async fn load_object(&self, id: i64) -> CdsResult<CdsObject> {
        if id < 0 {
            let cache = self.dynamic_containers.lock().await;
            return cache.get(&id).cloned().ok_or(CdsError::NotFound(id));
        }
        self.submit(move |pool| async move {
            let row = sqlx::query("SELECT * FROM cds_object WHERE id = ?")
                .bind(id)
                .fetch_optional(&pool)
                .await?
                .ok_or(CdsError::NotFound(id))?;
            row_to_object(&pool, &row).await
        })
        .await
    }

    async fn browse(&self, param: &mut BrowseParam) -> CdsResult<Vec<CdsObject>> {
        let input = param.clone();
        let (objects, total) = self
            .submit(move |pool| async move {
                let mut where_clause = String::new();
                if input.flags.metadata {
                    where_clause = "id = ?".to_string();
                } else {
                    where_clause.push_str("parent_id = ?");
                    if input.flags.containers_only && !input.flags.items_only {
                        where_clause.push_str(" AND object_type = 1");
                    } else if input.flags.items_only && !input.flags.containers_only {
                        where_clause.push_str(" AND object_type != 1");
                    }
                    // When both flags are set, both kinds are returned;
                    // the ORDER BY below still puts containers first.
                }

                let count_sql = format!("SELECT COUNT(*) FROM cds_object WHERE {where_clause}");
                let total: i64 = sqlx::query_scalar(&count_sql).bind(input.parent_id).fetch_one(&pool).await?;

                let sort = compile_sort(&input.sort_criteria);
                let order_by = if input.flags.track_sort {
                    "ORDER BY part_number, track_number".to_string()
                } else if input.flags.containers_only && input.flags.items_only {
                    format!("ORDER BY (object_type = 1) DESC, {}", sort.order_by_or_default("dc_title"))
                } else {
                    format!("ORDER BY {}", sort.order_by_or_default("dc_title"))
                };
                let joins = sort.joins.join(" ");

                let sql = format!(
                    "SELECT cds_object.* FROM cds_object {joins} WHERE {where_clause} {order_by} LIMIT ? OFFSET ?"
                );
                let rows = sqlx::query(&sql)
                    .bind(input.parent_id)
                    .bind(input.sql_limit())
                    .bind(input.starting_index)
                    .fetch_all(&pool)
                    .await?;

                let mut objects = Vec::with_capacity(rows.len());
                for row in &rows {
                    objects.push(row_to_object(&pool, row).await?);
                }

                // Fill child counts for returned containers, one aggregate query
                // each.
                for obj in &mut objects {
                    if let CdsObjectKind::Container { .. } = obj.kind {
                        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cds_object WHERE parent_id = ?")
                            .bind(obj.id)
                            .fetch_one(&pool)
                            .await?;
                        obj.set_aux_data("child_count", count.to_string());
                    }
                }

                Ok((objects, total))
            })
            .await?;

        let mut objects = objects;
        if param.flags.direct_children && param.starting_index == 0 && param.dynamic_containers_allowed {
            let dynamic = self.dynamic_containers.lock().await;
            for (dyn_id, dyn_obj) in dynamic.iter() {
                if dyn_obj.parent_id == param.parent_id {
                    objects.push(CdsObject { id: *dyn_id, ..dyn_obj.clone() });
                }
            }
        }

        // Property B/Q: numMatches must never overstate what the client
        // can actually page through — clamp to what this page plus its
        // offset actually covers when the real count underruns it.
        param.total_matches = total.max(param.starting_index + objects.len() as i64);
        Ok(objects)
    }

    async fn search(&self, param: &SearchParam) -> CdsResult<(Vec<CdsObject>, i64)> {
        let param = param.clone();
        self.submit(move |pool| async move {
            let compiled = compile_search(&param.search_criteria)
                .map_err(|e| CdsError::InvalidArgument(e.to_string()))?;
            let sort = compile_sort(&param.sort_criteria);
            let sort_joins = sort.joins.join(" ");
            let order_by = sort.order_by_or_default("dc_title");

            let count_sql = format!(
                "SELECT COUNT(DISTINCT cds_object.id) FROM cds_object {} WHERE {}",
                compiled.joins, compiled.predicate
            );
            let total: i64 = sqlx::query_scalar(&count_sql).fetch_one(&pool).await.unwrap_or(0);

            let limit = if param.requested_count <= 0 { super::UNBOUNDED_LIMIT } else { param.requested_count };
            let sql = format!(
                "SELECT DISTINCT cds_object.* FROM cds_object {} {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
                compiled.joins, sort_joins, compiled.predicate, order_by
            );
            let rows = sqlx::query(&sql)
                .bind(limit)
                .bind(param.starting_index)
                .fetch_all(&pool)
                .await?;

            let mut objects = Vec::with_capacity(rows.len());
            for row in &rows {
                objects.push(row_to_object(&pool, row).await?);
            }
            let clamped_total = total.max(param.starting_index + objects.len() as i64);
            Ok((objects, clamped_total))
        })
        .await
    }

    async fn add_container_chain(
        &self,
        virtual_path: &str,
        last_class: &str,
        last_ref_id: Option<i64>,
        last_metadata: &BTreeMap<String, String>,
    ) -> CdsResult<(i64, Vec<i64>)> {
        let virtual_path = virtual_path.to_string();
        let last_class = last_class.to_string();
        let last_metadata = last_metadata.clone();
        self.submit(move |pool| async move {
            add_container_chain_impl(&pool, &virtual_path, &last_class, last_ref_id, &last_metadata).await
        })
        .await
    }

    async fn remove_object(&self, id: i64, cascade: bool) -> CdsResult<ChangedContainers> {
        self.remove_objects(&[id], cascade).await
    }

    async fn remove_objects(&self, ids: &[i64], cascade: bool) -> CdsResult<ChangedContainers> {
        let ids = ids.to_vec();
        self.submit(move |pool| async move { remove_objects_impl(&pool, &ids, cascade).await }).await
    }

    async fn purge_empty_containers(&self, changed: &ChangedContainers) -> CdsResult<ChangedContainers> {
        let changed = changed.clone();
        self.submit(move |pool| async move { purge_empty_containers_impl(&pool, &changed).await }).await
    }

    async fn find_object_by_path(&self, fullpath: &str, was_regular_file: bool) -> CdsResult<Option<CdsObject>> {
        let _ = was_regular_file;
        let fullpath = fullpath.to_string();
        let id = self
            .submit(move |pool| async move {
                let norm = normalize_location(&fullpath);
                let hash = location_hash(&norm) as i64;
                let row = sqlx::query("SELECT id FROM cds_object WHERE location_hash = ? AND location = ? AND ref_id IS NULL")
                    .bind(hash)
                    .bind(&fullpath)
                    .fetch_optional(&pool)
                    .await?;
                Ok(row.map(|r| r.get::<i64, _>("id")))
            })
            .await?;
        match id {
            Some(id) => Ok(Some(self.load_object(id).await?)),
            None => Ok(None),
        }
    }

    async fn get_autoscan_list(&self, mode: AutoscanMode) -> CdsResult<Vec<AutoscanDirectory>> {
        self.submit(move |pool| async move {
            let mode_str = if mode == AutoscanMode::Timed { "timed" } else { "inotify" };
            let rows = sqlx::query("SELECT * FROM autoscan WHERE mode = ?").bind(mode_str).fetch_all(&pool).await?;
            Ok(rows.into_iter().map(row_to_autoscan).collect())
        })
        .await
    }

    async fn add_autoscan_directory(&self, dir: AutoscanDirectory) -> CdsResult<i64> {
        self.submit(move |pool| async move {
            check_overlapping_autoscans_impl(&pool, &dir).await?;
            let mode_str = if dir.mode == AutoscanMode::Timed { "timed" } else { "inotify" };
            let id: i64 = sqlx::query_scalar(
                r#"INSERT INTO autoscan (object_id, location, mode, recursive, hidden_files, interval_secs,
                    last_modified, ancestor_path, persistent, touched)
                   VALUES (?,?,?,?,?,?,?,?,?,0) RETURNING id"#,
            )
            .bind(dir.object_id)
            .bind(&dir.location)
            .bind(mode_str)
            .bind(dir.recursive)
            .bind(dir.hidden_files)
            .bind(dir.interval_secs as i64)
            .bind(dir.last_modified)
            .bind(&dir.ancestor_path)
            .bind(dir.persistent)
            .fetch_one(&pool)
            .await?;

            if let Some(object_id) = dir.object_id {
                sqlx::query("UPDATE cds_object SET autoscan_id = ?, flags = flags | ? WHERE id = ?")
                    .bind(id)
                    .bind(ObjectFlags::PERSISTENT_CONTAINER.bits() as i64)
                    .bind(object_id)
                    .execute(&pool)
                    .await?;
            }
            Ok(id)
        })
        .await
    }

    async fn update_autoscan_directory(&self, dir: &AutoscanDirectory) -> CdsResult<()> {
        let dir = dir.clone();
        self.submit(move |pool| async move {
            let Some(id) = dir.id else {
                return Err(CdsError::InvalidArgument("autoscan directory missing id".into()));
            };
            sqlx::query(
                "UPDATE autoscan SET recursive=?, hidden_files=?, interval_secs=?, last_modified=?, touched=? WHERE id=?",
            )
            .bind(dir.recursive)
            .bind(dir.hidden_files)
            .bind(dir.interval_secs as i64)
            .bind(dir.last_modified)
            .bind(dir.touched)
            .bind(id)
            .execute(&pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn remove_autoscan_directory(&self, id: i64) -> CdsResult<()> {
        self.submit(move |pool| async move {
            sqlx::query("DELETE FROM autoscan WHERE id = ?").bind(id).execute(&pool).await?;
            Ok(())
        })
        .await
    }

    async fn check_overlapping_autoscans(&self, candidate: &AutoscanDirectory) -> CdsResult<()> {
        let candidate = candidate.clone();
        self.submit(move |pool| async move { check_overlapping_autoscans_impl(&pool, &candidate).await }).await
    }

    async fn increment_update_ids(&self, ids: &[i64]) -> CdsResult<Vec<(i64, i64)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.submit(move |pool| async move {
            let mut results = Vec::with_capacity(ids.len());
            for id in &ids {
                let new_value: i64 = sqlx::query_scalar(
                    "UPDATE cds_object SET update_id = update_id + 1 WHERE id = ? RETURNING update_id",
                )
                .bind(id)
                .fetch_one(&pool)
                .await?;
                results.push((*id, new_value));
            }
            Ok(results)
        })
        .await
    }

    async fn get_internal_setting(&self, key: &str) -> CdsResult<Option<String>> {
        let key = key.to_string();
        self.submit(move |pool| async move { get_internal_setting_impl(&pool, &key).await }).await
    }

    async fn set_internal_setting(&self, key: &str, value: &str) -> CdsResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.submit(move |pool| async move { set_internal_setting_impl(&pool, &key, &value).await }).await
    }

    async fn save_config_value(&self, value: &ConfigValue) -> CdsResult<()> {
        let value = value.clone();
        self.submit(move |pool| async move {
            // STATUS_RESET heuristic: an xpath ending in `]` is treated as a
            // list entry and dropped outright rather than restored.
            if value.status == ConfigValueStatus::Removed && value.item_xpath.trim_end().ends_with(']') {
                sqlx::query("DELETE FROM config_value WHERE item_xpath = ? AND key = ?")
                    .bind(&value.item_xpath)
                    .bind(&value.key)
                    .execute(&pool)
                    .await?;
                return Ok(());
            }
            let status_str = config_status_str(value.status);
            sqlx::query(
                "INSERT INTO config_value (item_xpath, key, value, status) VALUES (?,?,?,?) \
                 ON CONFLICT(item_xpath, key) DO UPDATE SET value = excluded.value, status = excluded.status",
            )
            .bind(&value.item_xpath)
            .bind(&value.key)
            .bind(&value.value)
            .bind(status_str)
            .execute(&pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn load_config_values(&self) -> CdsResult<Vec<ConfigValue>> {
        self.submit(|pool| async move {
            let rows = sqlx::query("SELECT item_xpath, key, value, status FROM config_value").fetch_all(&pool).await?;
            Ok(rows
                .into_iter()
                .map(|row| ConfigValue {
                    item_xpath: row.get("item_xpath"),
                    key: row.get("key"),
                    value: row.get("value"),
                    status: parse_config_status(&row.get::<String, _>("status")),
                })
                .collect())
        })
        .await
    }

    async fn save_client_observation(&self, obs: &ClientObservation) -> CdsResult<()> {
        let obs = obs.clone();
        self.submit(move |pool| async move {
            sqlx::query(
                "INSERT INTO client (addr, port, last_seen, first_seen, user_agent, headers, profile_name) \
                 VALUES (?,?,?,?,?,?,?) ON CONFLICT(addr) DO UPDATE SET port=excluded.port, \
                 last_seen=excluded.last_seen, user_agent=excluded.user_agent, headers=excluded.headers, \
                 profile_name=excluded.profile_name",
            )
            .bind(&obs.addr)
            .bind(obs.port as i64)
            .bind(obs.last_seen)
            .bind(obs.first_seen)
            .bind(&obs.user_agent)
            .bind(&obs.headers)
            .bind(&obs.profile_name)
            .execute(&pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn load_client_observations(&self) -> CdsResult<Vec<ClientObservation>> {
        self.submit(|pool| async move {
            let rows = sqlx::query("SELECT * FROM client").fetch_all(&pool).await?;
            Ok(rows
                .into_iter()
                .map(|row| ClientObservation {
                    addr: row.get("addr"),
                    port: row.get::<i64, _>("port") as u16,
                    last_seen: row.get("last_seen"),
                    first_seen: row.get("first_seen"),
                    user_agent: row.get("user_agent"),
                    headers: row.get("headers"),
                    profile_name: row.get("profile_name"),
                })
                .collect())
        })
        .await
    }
}

fn parse_handler_type(s: &str) -> HandlerType {
    match s {
        "id3" => HandlerType::Id3,
        "mp4" => HandlerType::Mp4,
        "ffmpeg" => HandlerType::Ffmpeg,
        "fanart" => HandlerType::Fanart,
        "exturl" => HandlerType::ExternalUrl,
        "thumbnail" => HandlerType::Thumbnail,
        "subtitle" => HandlerType::Subtitle,
        _ => HandlerType::Generic,
    }
}

fn handler_type_str(h: HandlerType) -> &'static str {
    match h {
        HandlerType::Id3 => "id3",
        HandlerType::Mp4 => "mp4",
        HandlerType::Ffmpeg => "ffmpeg",
        HandlerType::Fanart => "fanart",
        HandlerType::ExternalUrl => "exturl",
        HandlerType::Thumbnail => "thumbnail",
        HandlerType::Subtitle => "subtitle",
        HandlerType::Generic => "generic",
    }
}

fn parse_purpose(s: &str) -> ResourcePurpose {
    match s {
        "thumbnail" => ResourcePurpose::Thumbnail,
        "subtitle" => ResourcePurpose::Subtitle,
        "transcode" => ResourcePurpose::Transcode,
        _ => ResourcePurpose::Primary,
    }
}

fn purpose_str(p: ResourcePurpose) -> &'static str {
    match p {
        ResourcePurpose::Primary => "primary",
        ResourcePurpose::Thumbnail => "thumbnail",
        ResourcePurpose::Subtitle => "subtitle",
        ResourcePurpose::Transcode => "transcode",
    }
}

fn encode_kv(map: &BTreeMap<String, String>) -> String {
    map.iter()
        .map(|(k, v)| format!("{}={}", k.replace(['=', ';'], "_"), v.replace(['=', ';'], "_")))
        .collect::<Vec<_>>()
        .join(";")
}

fn decode_kv(s: &str) -> BTreeMap<String, String> {
    s.split(';')
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn row_to_autoscan(row: sqlx::sqlite::SqliteRow) -> AutoscanDirectory {
    AutoscanDirectory {
        id: Some(row.get("id")),
        object_id: row.get("object_id"),
        location: row.get::<Option<String>, _>("location").unwrap_or_default(),
        mode: if row.get::<String, _>("mode") == "timed" { AutoscanMode::Timed } else { AutoscanMode::INotify },
        recursive: row.get::<i64, _>("recursive") != 0,
        hidden_files: row.get::<i64, _>("hidden_files") != 0,
        interval_secs: row.get::<i64, _>("interval_secs") as u64,
        last_modified: row.get("last_modified"),
        ancestor_path: row.get("ancestor_path"),
        persistent: row.get::<i64, _>("persistent") != 0,
        touched: row.get::<i64, _>("touched") != 0,
    }
}

fn config_status_str(status: ConfigValueStatus) -> &'static str {
    match status {
        ConfigValueStatus::Unchanged => "unchanged",
        ConfigValueStatus::Changed => "changed",
        ConfigValueStatus::Manual => "manual",
        ConfigValueStatus::Removed => "removed",
        ConfigValueStatus::Killed => "killed",
    }
}

fn parse_config_status(s: &str) -> ConfigValueStatus {
    match s {
        "changed" => ConfigValueStatus::Changed,
        "manual" => ConfigValueStatus::Manual,
        "removed" => ConfigValueStatus::Removed,
        "killed" => ConfigValueStatus::Killed,
        _ => ConfigValueStatus::Unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn test_storage() -> SqliteStorage {
        let dir = tempdir().unwrap();
        SqliteStorage::new(&dir.path().join("test.db"), true).await.unwrap()
    }

    #[tokio::test]
    async fn add_and_load_round_trips() {
        let storage = test_storage().await;
        let mut container = CdsObject::new_container(0, crate::cds::object::ROOT_ID, "Music");
        container.upnp_class = "object.container".to_string();
        let (id, _) = storage.add_object(&container).await.unwrap();

        let mut item = CdsObject::new_pure_item(0, id, "song.mp3", "/music/song.mp3");
        item.mime_type = Some("audio/mpeg".to_string());
        item.add_resource(Resource::new(0, HandlerType::Id3, ResourcePurpose::Primary));
        let (item_id, _) = storage.add_object(&item).await.unwrap();

        let loaded = storage.load_object(item_id).await.unwrap();
        assert_eq!(loaded.dc_title, "song.mp3");
        assert_eq!(loaded.resources.len(), 1);
    }

    #[tokio::test]
    async fn resource_attributes_round_trip_through_storage() {
        let storage = test_storage().await;
        let mut item = CdsObject::new_pure_item(0, crate::cds::object::ROOT_ID, "song.mp3", "/music/song.mp3");
        item.mime_type = Some("audio/mpeg".to_string());
        item.add_resource(
            Resource::new(0, HandlerType::Id3, ResourcePurpose::Primary)
                .with_attr(ResAttr::ProtocolInfo, "http-get:*:audio/mpeg:*")
                .with_attr(ResAttr::Duration, "0:03:30")
                .with_attr(ResAttr::Size, "123456"),
        );
        let (item_id, _) = storage.add_object(&item).await.unwrap();

        let loaded = storage.load_object(item_id).await.unwrap();
        let res = &loaded.resources[0];
        assert_eq!(res.attributes.get(&ResAttr::ProtocolInfo).unwrap(), "http-get:*:audio/mpeg:*");
        assert_eq!(res.attributes.get(&ResAttr::Duration).unwrap(), "0:03:30");
        assert_eq!(res.attributes.get(&ResAttr::Size).unwrap(), "123456");

        // update_object's resource rewrite path must preserve attributes too.
        let mut updated = loaded.clone();
        updated.resources[0].attributes.insert(ResAttr::Bitrate, "320000".to_string());
        storage.update_object(&updated).await.unwrap();
        let reloaded = storage.load_object(item_id).await.unwrap();
        assert_eq!(reloaded.resources[0].attributes.get(&ResAttr::Bitrate).unwrap(), "320000");
        assert_eq!(reloaded.resources[0].attributes.get(&ResAttr::Duration).unwrap(), "0:03:30");
    }

    #[tokio::test]
    async fn duplicate_reference_insert_is_dropped() {
        let storage = test_storage().await;
        let mut container = CdsObject::new_container(0, crate::cds::object::ROOT_ID, "Playlists");
        let (pid, _) = storage.add_object(&container).await.unwrap();
        container.id = pid;

        let mut source = CdsObject::new_pure_item(0, pid, "song.mp3", "/music/song.mp3");
        let (source_id, _) = storage.add_object(&source).await.unwrap();
        source.id = source_id;

        let mut reference = CdsObject::new_container(0, pid, "song.mp3");
        reference.ref_id = Some(source_id);
        storage.add_object(&reference).await.unwrap();

        let second = storage.add_object(&reference).await;
        assert!(matches!(second, Err(CdsError::DuplicateObject { .. })));
    }

    #[tokio::test]
    async fn remove_object_cascades_and_purges_empty_parent() {
        let storage = test_storage().await;
        let container = CdsObject::new_container(0, crate::cds::object::ROOT_ID, "Temp");
        let (cid, _) = storage.add_object(&container).await.unwrap();
        let item = CdsObject::new_pure_item(0, cid, "a.mp3", "/temp/a.mp3");
        storage.add_object(&item).await.unwrap();

        let changed = storage.remove_object(cid, true).await.unwrap();
        assert!(changed.upnp.contains(&crate::cds::object::ROOT_ID) || changed.ui.contains(&crate::cds::object::ROOT_ID));
        assert!(storage.load_object(cid).await.is_err());
    }

    #[tokio::test]
    async fn remove_object_without_cascade_rejects_nonempty_container() {
        let storage = test_storage().await;
        let container = CdsObject::new_container(0, crate::cds::object::ROOT_ID, "Temp");
        let (cid, _) = storage.add_object(&container).await.unwrap();
        let item = CdsObject::new_pure_item(0, cid, "a.mp3", "/temp/a.mp3");
        storage.add_object(&item).await.unwrap();

        let result = storage.remove_object(cid, false).await;
        assert!(matches!(result, Err(CdsError::InvalidArgument(_))));
        // Children untouched by the rejected non-cascade attempt.
        assert!(storage.load_object(cid).await.is_ok());
    }

    #[tokio::test]
    async fn increment_update_ids_empty_is_empty() {
        let storage = test_storage().await;
        assert!(storage.increment_update_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn container_chain_is_idempotent() {
        let storage = test_storage().await;
        let (leaf1, affected1) = storage
            .add_container_chain("/Video/Movies", "object.container", None, &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(affected1.len(), 2);

        let (leaf2, affected2) = storage
            .add_container_chain("/Video/Movies", "object.container", None, &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(leaf1, leaf2);
        assert!(affected2.is_empty());
    }

    #[tokio::test]
    async fn overlapping_autoscan_is_rejected() {
        let storage = test_storage().await;
        let a = AutoscanDirectory {
            id: None,
            object_id: None,
            location: "/a".into(),
            mode: AutoscanMode::Timed,
            recursive: true,
            hidden_files: false,
            interval_secs: 60,
            last_modified: 0,
            ancestor_path: "1".into(),
            persistent: true,
            touched: false,
        };
        storage.add_autoscan_directory(a).await.unwrap();

        let b = AutoscanDirectory {
            id: None,
            object_id: None,
            location: "/a/b".into(),
            mode: AutoscanMode::Timed,
            recursive: false,
            hidden_files: false,
            interval_secs: 60,
            last_modified: 0,
            ancestor_path: "1.2".into(),
            persistent: true,
            touched: false,
        };
        let result = storage.add_autoscan_directory(b).await;
        assert!(matches!(result, Err(CdsError::OverlappingAutoscan(_))));
    }

    #[tokio::test]
    async fn browse_num_matches_clamps_on_underrun() {
        let storage = test_storage().await;
        for i in 0..3 {
            let item = CdsObject::new_pure_item(0, crate::cds::object::ROOT_ID, format!("t{i}.mp3"), format!("/t{i}.mp3"));
            storage.add_object(&item).await.unwrap();
        }
        let mut param = BrowseParam::direct_children(crate::cds::object::ROOT_ID);
        param.starting_index = 1;
        param.requested_count = 10;
        let objects = storage.browse(&mut param).await.unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(param.total_matches, 3);
    }

    #[tokio::test]
    async fn browse_both_kinds_returns_containers_and_items() {
        let storage = test_storage().await;
        let container = CdsObject::new_container(0, crate::cds::object::ROOT_ID, "Folder");
        storage.add_object(&container).await.unwrap();
        let item = CdsObject::new_pure_item(0, crate::cds::object::ROOT_ID, "song.mp3", "/song.mp3");
        storage.add_object(&item).await.unwrap();

        let mut param = BrowseParam::direct_children(crate::cds::object::ROOT_ID);
        param.flags.containers_only = true;
        param.flags.items_only = true;
        let objects = storage.browse(&mut param).await.unwrap();
        assert_eq!(objects.len(), 2);
        assert!(matches!(objects[0].kind, CdsObjectKind::Container { .. }));
    }
}
