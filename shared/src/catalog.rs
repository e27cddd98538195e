//! Catalog (C2) — durable record of every Image and Task. Source of truth
//! for status. Spec §3 and §4.2.
//!
//! Two implementations: `ArangoCatalog` (production, grounded in the
//! teacher's `db/arangodb` AQL style — bind-var queries against a document
//! store used exactly like the teacher uses it, as the durable relational
//! backing this core needs) and `InMemoryCatalog` (tests, grounded in the
//! teacher's `db/inmemory::InMemoryDb` — an `Arc<Mutex<HashMap<..>>>` store
//! behind the same trait).

use std::collections::HashMap;
use std::sync::Arc;

use arangors::{Connection, Database, client::reqwest::ReqwestClient, document::Document};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Image, ImageStatus, Task, truncate_error_log};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("image not found")]
    ImageNotFound,
    #[error("task not found")]
    TaskNotFound,
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("catalog backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub struct ImagePage {
    pub images: Vec<Image>,
    pub total: u64,
    pub has_more: bool,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn create_image(&self, image: Image) -> Result<(), CatalogError>;
    async fn get_image(&self, image_id: Uuid) -> Result<Option<Image>, CatalogError>;

    /// Like `get_image`, but also returns soft-deleted rows. Used only
    /// where a caller has to act idempotently on an already-deleted image
    /// (spec §8 idempotence law: "`delete(id)` called twice ... the second
    /// call is a no-op") — everywhere else, soft-deleted rows stay
    /// invisible per spec §3.
    async fn get_image_even_if_deleted(&self, image_id: Uuid) -> Result<Option<Image>, CatalogError>;

    /// Newest first, excludes soft-deleted rows. `page` is 1-based.
    async fn list_images_by_owner(
        &self,
        owner_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ImagePage, CatalogError>;

    /// Count of non-deleted images for `owner_id` created at or after
    /// `since` — the quota computation of spec §4.1.
    async fn count_images_since(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, CatalogError>;

    /// Guarded `pending -> processing`, minting `watermark_id` as part of
    /// the same write (spec §3: "assigned at worker start, stable across
    /// retries of the same attempt").
    async fn set_processing(
        &self,
        image_id: Uuid,
        watermark_id: &str,
    ) -> Result<(), CatalogError>;

    /// Guarded `processing -> completed`.
    async fn set_completed(
        &self,
        image_id: Uuid,
        protected_key: &str,
        provenance_manifest: Value,
    ) -> Result<(), CatalogError>;

    /// Guarded `processing -> failed`.
    async fn set_failed(&self, image_id: Uuid, error_log: &str) -> Result<(), CatalogError>;

    /// Guarded `failed -> pending`, for operator/user-initiated retry.
    async fn set_pending_for_retry(&self, image_id: Uuid) -> Result<(), CatalogError>;

    /// Soft delete. Legal from any non-deleted status (see
    /// `ImageStatus::legal_predecessors` and DESIGN.md).
    async fn soft_delete(&self, image_id: Uuid) -> Result<(), CatalogError>;

    /// Atomically increments and returns the new count. Only legal when
    /// `status = completed` (spec §4.1 `track_download`).
    async fn increment_download_count(&self, image_id: Uuid) -> Result<u64, CatalogError>;

    async fn insert_task(&self, task: Task) -> Result<(), CatalogError>;
    async fn complete_task(&self, task_id: Uuid) -> Result<(), CatalogError>;
    async fn fail_task(&self, task_id: Uuid, error_log: &str) -> Result<(), CatalogError>;
    async fn latest_task_for_image(&self, image_id: Uuid) -> Result<Option<Task>, CatalogError>;
}

// ---------------------------------------------------------------------------
// ArangoDB-backed implementation
// ---------------------------------------------------------------------------

const IMAGES_COLLECTION: &str = "images";
const TASKS_COLLECTION: &str = "tasks";

pub struct ArangoCatalog {
    db: Database<ReqwestClient>,
}

impl ArangoCatalog {
    pub async fn connect(
        url: &str,
        user: &str,
        password: &str,
        db_name: &str,
    ) -> anyhow::Result<Self> {
        let conn = Connection::establish_basic_auth(url, user, password).await?;
        let db = conn.db(db_name).await?;
        for collection in [IMAGES_COLLECTION, TASKS_COLLECTION] {
            if db.collection(collection).await.is_err() {
                let _ = db.create_collection(collection).await;
            }
        }
        Ok(Self { db })
    }

    async fn aql<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        vars: HashMap<&str, Value>,
    ) -> anyhow::Result<Vec<T>> {
        let result = self.db.aql_bind_vars::<T>(query, vars).await?;
        Ok(result)
    }
}

#[async_trait]
impl Catalog for ArangoCatalog {
    async fn create_image(&self, image: Image) -> Result<(), CatalogError> {
        let key = image.image_id.to_string();
        let mut doc = serde_json::to_value(&image).map_err(|e| anyhow::anyhow!(e))?;
        doc["_key"] = Value::String(key);
        self.db
            .collection(IMAGES_COLLECTION)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?
            .create_document(Document::new(doc), Default::default())
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(())
    }

    async fn get_image(&self, image_id: Uuid) -> Result<Option<Image>, CatalogError> {
        let query = "FOR doc IN @@col FILTER doc._key == @key AND doc.status != @deleted RETURN doc";
        let vars = HashMap::from([
            ("@col", Value::String(IMAGES_COLLECTION.to_string())),
            ("key", Value::String(image_id.to_string())),
            ("deleted", Value::String(ImageStatus::Deleted.as_str().to_string())),
        ]);
        let mut docs: Vec<Image> = self.aql(query, vars).await?;
        Ok(docs.pop())
    }

    async fn get_image_even_if_deleted(&self, image_id: Uuid) -> Result<Option<Image>, CatalogError> {
        let query = "FOR doc IN @@col FILTER doc._key == @key RETURN doc";
        let vars = HashMap::from([
            ("@col", Value::String(IMAGES_COLLECTION.to_string())),
            ("key", Value::String(image_id.to_string())),
        ]);
        let mut docs: Vec<Image> = self.aql(query, vars).await?;
        Ok(docs.pop())
    }

    async fn list_images_by_owner(
        &self,
        owner_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ImagePage, CatalogError> {
        let skip = (page.saturating_sub(1)) as i64 * page_size as i64;
        let query = r#"
            LET matching = (
                FOR doc IN @@col
                    FILTER doc.owner_id == @owner AND doc.status != @deleted
                    RETURN doc
            )
            LET page = (
                FOR doc IN matching
                    SORT doc.created_at DESC
                    LIMIT @skip, @limit
                    RETURN doc
            )
            RETURN { page: page, total: LENGTH(matching) }
        "#;
        let vars = HashMap::from([
            ("@col", Value::String(IMAGES_COLLECTION.to_string())),
            ("owner", Value::String(owner_id.to_string())),
            ("deleted", Value::String(ImageStatus::Deleted.as_str().to_string())),
            ("skip", Value::from(skip)),
            ("limit", Value::from(page_size as i64)),
        ]);

        #[derive(serde::Deserialize)]
        struct Row {
            page: Vec<Image>,
            total: u64,
        }
        let mut rows: Vec<Row> = self.aql(query, vars).await?;
        let row = rows.pop().unwrap_or(Row { page: vec![], total: 0 });
        let has_more = (skip as u64) + (row.page.len() as u64) < row.total;
        Ok(ImagePage {
            images: row.page,
            total: row.total,
            has_more,
        })
    }

    async fn count_images_since(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, CatalogError> {
        let query = r#"
            FOR doc IN @@col
                FILTER doc.owner_id == @owner
                    AND doc.status != @deleted
                    AND doc.created_at >= @since
                COLLECT WITH COUNT INTO total
                RETURN total
        "#;
        let vars = HashMap::from([
            ("@col", Value::String(IMAGES_COLLECTION.to_string())),
            ("owner", Value::String(owner_id.to_string())),
            ("deleted", Value::String(ImageStatus::Deleted.as_str().to_string())),
            ("since", Value::String(since.to_rfc3339())),
        ]);
        let mut counts: Vec<u64> = self.aql(query, vars).await?;
        Ok(counts.pop().unwrap_or(0))
    }

    async fn set_processing(
        &self,
        image_id: Uuid,
        watermark_id: &str,
    ) -> Result<(), CatalogError> {
        guarded_update(
            &self.db,
            image_id,
            &[ImageStatus::Pending],
            ImageStatus::Processing,
            serde_json::json!({ "watermark_id": watermark_id }),
        )
        .await
    }

    async fn set_completed(
        &self,
        image_id: Uuid,
        protected_key: &str,
        provenance_manifest: Value,
    ) -> Result<(), CatalogError> {
        guarded_update(
            &self.db,
            image_id,
            &[ImageStatus::Processing],
            ImageStatus::Completed,
            serde_json::json!({
                "protected_key": protected_key,
                "provenance_manifest": provenance_manifest,
            }),
        )
        .await
    }

    async fn set_failed(&self, image_id: Uuid, error_log: &str) -> Result<(), CatalogError> {
        guarded_update(
            &self.db,
            image_id,
            &[ImageStatus::Processing],
            ImageStatus::Failed,
            serde_json::json!({ "last_error": truncate_error_log(error_log) }),
        )
        .await
    }

    async fn set_pending_for_retry(&self, image_id: Uuid) -> Result<(), CatalogError> {
        guarded_update(
            &self.db,
            image_id,
            &[ImageStatus::Failed],
            ImageStatus::Pending,
            serde_json::json!({}),
        )
        .await
    }

    async fn soft_delete(&self, image_id: Uuid) -> Result<(), CatalogError> {
        guarded_update(
            &self.db,
            image_id,
            ImageStatus::Deleted.legal_predecessors(),
            ImageStatus::Deleted,
            serde_json::json!({}),
        )
        .await
    }

    async fn increment_download_count(&self, image_id: Uuid) -> Result<u64, CatalogError> {
        let query = r#"
            FOR doc IN @@col
                FILTER doc._key == @key AND doc.status == @completed
                UPDATE doc WITH { download_count: doc.download_count + 1 } IN @@col
                RETURN NEW
        "#;
        let vars = HashMap::from([
            ("@col", Value::String(IMAGES_COLLECTION.to_string())),
            ("key", Value::String(image_id.to_string())),
            ("completed", Value::String(ImageStatus::Completed.as_str().to_string())),
        ]);
        let mut updated: Vec<Image> = self.aql(query, vars).await?;
        match updated.pop() {
            Some(image) => Ok(image.download_count),
            None => Err(CatalogError::InvalidTransition {
                from: "non-completed".to_string(),
                to: "download".to_string(),
            }),
        }
    }

    async fn insert_task(&self, task: Task) -> Result<(), CatalogError> {
        let key = task.task_id.to_string();
        let mut doc = serde_json::to_value(&task).map_err(|e| anyhow::anyhow!(e))?;
        doc["_key"] = Value::String(key);
        self.db
            .collection(TASKS_COLLECTION)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?
            .create_document(Document::new(doc), Default::default())
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(())
    }

    async fn complete_task(&self, task_id: Uuid) -> Result<(), CatalogError> {
        let query = r#"
            FOR doc IN @@col
                FILTER doc._key == @key
                UPDATE doc WITH { completed_at: @now } IN @@col
                RETURN NEW
        "#;
        let vars = HashMap::from([
            ("@col", Value::String(TASKS_COLLECTION.to_string())),
            ("key", Value::String(task_id.to_string())),
            ("now", Value::String(Utc::now().to_rfc3339())),
        ]);
        let updated: Vec<Value> = self.aql(query, vars).await?;
        if updated.is_empty() {
            return Err(CatalogError::TaskNotFound);
        }
        Ok(())
    }

    async fn fail_task(&self, task_id: Uuid, error_log: &str) -> Result<(), CatalogError> {
        let query = r#"
            FOR doc IN @@col
                FILTER doc._key == @key
                UPDATE doc WITH { completed_at: @now, error_log: @log } IN @@col
                RETURN NEW
        "#;
        let vars = HashMap::from([
            ("@col", Value::String(TASKS_COLLECTION.to_string())),
            ("key", Value::String(task_id.to_string())),
            ("now", Value::String(Utc::now().to_rfc3339())),
            ("log", Value::String(truncate_error_log(error_log))),
        ]);
        let updated: Vec<Value> = self.aql(query, vars).await?;
        if updated.is_empty() {
            return Err(CatalogError::TaskNotFound);
        }
        Ok(())
    }

    async fn latest_task_for_image(&self, image_id: Uuid) -> Result<Option<Task>, CatalogError> {
        let query = r#"
            FOR doc IN @@col
                FILTER doc.image_id == @image_id
                SORT doc.started_at DESC
                LIMIT 1
                RETURN doc
        "#;
        let vars = HashMap::from([
            ("@col", Value::String(TASKS_COLLECTION.to_string())),
            ("image_id", Value::String(image_id.to_string())),
        ]);
        let mut docs: Vec<Task> = self.aql(query, vars).await?;
        Ok(docs.pop())
    }
}

/// Shared guarded-update helper: `FILTER status IN legal THEN UPDATE`, the
/// conditional-update pattern spec §4.2 prescribes ("a zero-row-affected
/// result maps to `InvalidTransition`").
async fn guarded_update(
    db: &Database<ReqwestClient>,
    image_id: Uuid,
    legal_from: &[ImageStatus],
    to: ImageStatus,
    mut patch: Value,
) -> Result<(), CatalogError> {
    let legal: Vec<Value> = legal_from
        .iter()
        .map(|s| Value::String(s.as_str().to_string()))
        .collect();
    if let Some(obj) = patch.as_object_mut() {
        obj.insert("status".to_string(), Value::String(to.as_str().to_string()));
        obj.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));
    }
    let query = r#"
        FOR doc IN @@col
            FILTER doc._key == @key AND doc.status IN @legal
            UPDATE doc WITH @patch IN @@col
            RETURN NEW
    "#;
    let vars = HashMap::from([
        ("@col", Value::String(IMAGES_COLLECTION.to_string())),
        ("key", Value::String(image_id.to_string())),
        ("legal", Value::Array(legal)),
        ("patch", patch),
    ]);
    let updated: Vec<Value> = db
        .aql_bind_vars::<Value>(query, vars)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    if updated.is_empty() {
        return Err(CatalogError::InvalidTransition {
            from: format!("{legal_from:?}"),
            to: to.as_str().to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory implementation (tests, local dev)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryCatalog {
    images: Mutex<HashMap<Uuid, Image>>,
    tasks: Mutex<HashMap<Uuid, Task>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn create_image(&self, image: Image) -> Result<(), CatalogError> {
        self.images.lock().await.insert(image.image_id, image);
        Ok(())
    }

    async fn get_image(&self, image_id: Uuid) -> Result<Option<Image>, CatalogError> {
        let images = self.images.lock().await;
        Ok(images
            .get(&image_id)
            .filter(|i| i.status != ImageStatus::Deleted)
            .cloned())
    }

    async fn get_image_even_if_deleted(&self, image_id: Uuid) -> Result<Option<Image>, CatalogError> {
        let images = self.images.lock().await;
        Ok(images.get(&image_id).cloned())
    }

    async fn list_images_by_owner(
        &self,
        owner_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ImagePage, CatalogError> {
        let images = self.images.lock().await;
        let mut matching: Vec<Image> = images
            .values()
            .filter(|i| i.owner_id == owner_id && i.status != ImageStatus::Deleted)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as u64;
        let skip = (page.saturating_sub(1)) as usize * page_size as usize;
        let page_items: Vec<Image> = matching.into_iter().skip(skip).take(page_size as usize).collect();
        let has_more = (skip as u64) + (page_items.len() as u64) < total;
        Ok(ImagePage {
            images: page_items,
            total,
            has_more,
        })
    }

    async fn count_images_since(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, CatalogError> {
        let images = self.images.lock().await;
        Ok(images
            .values()
            .filter(|i| {
                i.owner_id == owner_id && i.status != ImageStatus::Deleted && i.created_at >= since
            })
            .count() as u64)
    }

    async fn set_processing(
        &self,
        image_id: Uuid,
        watermark_id: &str,
    ) -> Result<(), CatalogError> {
        let mut images = self.images.lock().await;
        let image = images.get_mut(&image_id).ok_or(CatalogError::ImageNotFound)?;
        if !ImageStatus::Processing.can_transition_from(image.status) {
            return Err(CatalogError::InvalidTransition {
                from: image.status.as_str().to_string(),
                to: ImageStatus::Processing.as_str().to_string(),
            });
        }
        image.status = ImageStatus::Processing;
        image.watermark_id = Some(watermark_id.to_string());
        image.updated_at = Utc::now();
        Ok(())
    }

    async fn set_completed(
        &self,
        image_id: Uuid,
        protected_key: &str,
        provenance_manifest: Value,
    ) -> Result<(), CatalogError> {
        let mut images = self.images.lock().await;
        let image = images.get_mut(&image_id).ok_or(CatalogError::ImageNotFound)?;
        if !ImageStatus::Completed.can_transition_from(image.status) {
            return Err(CatalogError::InvalidTransition {
                from: image.status.as_str().to_string(),
                to: ImageStatus::Completed.as_str().to_string(),
            });
        }
        image.status = ImageStatus::Completed;
        image.protected_key = Some(protected_key.to_string());
        image.provenance_manifest = Some(provenance_manifest);
        image.updated_at = Utc::now();
        Ok(())
    }

    async fn set_failed(&self, image_id: Uuid, _error_log: &str) -> Result<(), CatalogError> {
        let mut images = self.images.lock().await;
        let image = images.get_mut(&image_id).ok_or(CatalogError::ImageNotFound)?;
        if !ImageStatus::Failed.can_transition_from(image.status) {
            return Err(CatalogError::InvalidTransition {
                from: image.status.as_str().to_string(),
                to: ImageStatus::Failed.as_str().to_string(),
            });
        }
        image.status = ImageStatus::Failed;
        image.updated_at = Utc::now();
        Ok(())
    }

    async fn set_pending_for_retry(&self, image_id: Uuid) -> Result<(), CatalogError> {
        let mut images = self.images.lock().await;
        let image = images.get_mut(&image_id).ok_or(CatalogError::ImageNotFound)?;
        if !ImageStatus::Pending.can_transition_from(image.status) {
            return Err(CatalogError::InvalidTransition {
                from: image.status.as_str().to_string(),
                to: ImageStatus::Pending.as_str().to_string(),
            });
        }
        image.status = ImageStatus::Pending;
        image.updated_at = Utc::now();
        Ok(())
    }

    async fn soft_delete(&self, image_id: Uuid) -> Result<(), CatalogError> {
        let mut images = self.images.lock().await;
        let image = images.get_mut(&image_id).ok_or(CatalogError::ImageNotFound)?;
        if !ImageStatus::Deleted.can_transition_from(image.status) {
            return Err(CatalogError::InvalidTransition {
                from: image.status.as_str().to_string(),
                to: ImageStatus::Deleted.as_str().to_string(),
            });
        }
        image.status = ImageStatus::Deleted;
        image.updated_at = Utc::now();
        Ok(())
    }

    async fn increment_download_count(&self, image_id: Uuid) -> Result<u64, CatalogError> {
        let mut images = self.images.lock().await;
        let image = images.get_mut(&image_id).ok_or(CatalogError::ImageNotFound)?;
        if image.status != ImageStatus::Completed {
            return Err(CatalogError::InvalidTransition {
                from: image.status.as_str().to_string(),
                to: "download".to_string(),
            });
        }
        image.download_count += 1;
        Ok(image.download_count)
    }

    async fn insert_task(&self, task: Task) -> Result<(), CatalogError> {
        self.tasks.lock().await.insert(task.task_id, task);
        Ok(())
    }

    async fn complete_task(&self, task_id: Uuid) -> Result<(), CatalogError> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks.get_mut(&task_id).ok_or(CatalogError::TaskNotFound)?;
        task.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail_task(&self, task_id: Uuid, error_log: &str) -> Result<(), CatalogError> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks.get_mut(&task_id).ok_or(CatalogError::TaskNotFound)?;
        task.completed_at = Some(Utc::now());
        task.error_log = Some(truncate_error_log(error_log));
        Ok(())
    }

    async fn latest_task_for_image(&self, image_id: Uuid) -> Result<Option<Task>, CatalogError> {
        let tasks = self.tasks.lock().await;
        Ok(tasks
            .values()
            .filter(|t| t.image_id == image_id)
            .max_by_key(|t| t.started_at)
            .cloned())
    }
}

/// Shared alias used throughout both binaries.
pub type SharedCatalog = Arc<dyn Catalog>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> Image {
        Image::new_pending(Uuid::now_v7(), "owner-1".to_string(), "raw/owner-1/a.png".to_string())
    }

    #[tokio::test]
    async fn guarded_transitions_follow_the_legal_graph() {
        let catalog = InMemoryCatalog::new();
        let image = sample_image();
        let id = image.image_id;
        catalog.create_image(image).await.unwrap();

        catalog.set_processing(id, "0123456789abcdef0123456789abcdef").await.unwrap();
        let fetched = catalog.get_image(id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ImageStatus::Processing);
        assert_eq!(fetched.watermark_id.as_deref(), Some("0123456789abcdef0123456789abcdef"));

        // Skipping straight to completed from pending (already processing here) works...
        catalog
            .set_completed(id, "protected/x.png", serde_json::json!({"ok": true}))
            .await
            .unwrap();

        // ...but a second completion attempt must be rejected.
        let err = catalog
            .set_completed(id, "protected/x.png", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn download_count_requires_completed_status() {
        let catalog = InMemoryCatalog::new();
        let image = sample_image();
        let id = image.image_id;
        catalog.create_image(image).await.unwrap();

        let err = catalog.increment_download_count(id).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidTransition { .. }));

        catalog.set_processing(id, "abcdefabcdefabcdefabcdefabcdefab").await.unwrap();
        catalog
            .set_completed(id, "protected/x.png", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(catalog.increment_download_count(id).await.unwrap(), 1);
        assert_eq!(catalog.increment_download_count(id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn soft_delete_is_idempotent_as_a_terminal_state() {
        let catalog = InMemoryCatalog::new();
        let image = sample_image();
        let id = image.image_id;
        catalog.create_image(image).await.unwrap();

        catalog.soft_delete(id).await.unwrap();
        assert!(catalog.get_image(id).await.unwrap().is_none());

        let err = catalog.soft_delete(id).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn pagination_clamping_semantics() {
        let catalog = InMemoryCatalog::new();
        for _ in 0..7 {
            catalog.create_image(sample_image()).await.unwrap();
        }
        let page = catalog.list_images_by_owner("owner-1", 1, 5).await.unwrap();
        assert_eq!(page.images.len(), 5);
        assert_eq!(page.total, 7);
        assert!(page.has_more);

        let page2 = catalog.list_images_by_owner("owner-1", 2, 5).await.unwrap();
        assert_eq!(page2.images.len(), 2);
        assert!(!page2.has_more);
    }
}
