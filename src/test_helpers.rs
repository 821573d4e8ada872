//! In-memory stand-ins for the remote services, shared by unit tests.
//!
//! Both use `Mutex` (not `RefCell`) so they are `Sync` and can sit behind
//! the `Arc<dyn ObjectStore>` / `Arc<dyn Cdn>` the parallel pipeline shares
//! across workers.
//!
//! ```text
//! let store = Arc::new(MemoryStore::new());
//! store.insert("index.html", b"old", Some("\"abc\""));
//! // ... publish ...
//! assert_eq!(store.put_count(), 1);
//! ```

use crate::backend::object_storage::content_hash;
use crate::storage::{
    Cdn, Distribution, InvalidationStatus, ObjectHead, ObjectStore, PutObject, StorageError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// =========================================================================
// Object store
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub etag: Option<String>,
    pub public_read: bool,
    pub cache_control: Option<String>,
    pub expires: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Head(String),
    Put(String),
    ConfigureWebsite { index: String, error: String },
}

/// Bucket that keeps objects in a map and ETags them with a quoted MD5,
/// like S3 does for single-part uploads.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    operations: Mutex<Vec<StoreOp>>,
    fail_heads: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object as if uploaded by an earlier run.
    pub fn insert(&self, key: &str, body: &[u8], etag: Option<&str>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                content_type: "text/html".to_string(),
                etag: etag.map(str::to_string),
                public_read: true,
                cache_control: None,
                expires: None,
            },
        );
    }

    /// Make every subsequent `head` call fail.
    pub fn fail_heads(&self) {
        *self.fail_heads.lock().unwrap() = true;
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().unwrap().clone()
    }

    pub fn put_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| matches!(op, StoreOp::Put(_)))
            .count()
    }
}

impl ObjectStore for MemoryStore {
    fn head(&self, key: &str) -> Result<Option<ObjectHead>, StorageError> {
        self.operations
            .lock()
            .unwrap()
            .push(StoreOp::Head(key.to_string()));
        if *self.fail_heads.lock().unwrap() {
            return Err(StorageError::remote("HeadObject", "access denied"));
        }
        Ok(self.objects.lock().unwrap().get(key).map(|o| ObjectHead {
            etag: o.etag.clone(),
        }))
    }

    fn put(&self, object: &PutObject<'_>) -> Result<(), StorageError> {
        self.operations
            .lock()
            .unwrap()
            .push(StoreOp::Put(object.key.to_string()));
        self.objects.lock().unwrap().insert(
            object.key.to_string(),
            StoredObject {
                body: object.body.to_vec(),
                content_type: object.content_type.to_string(),
                etag: Some(format!("\"{}\"", content_hash(object.body))),
                public_read: object.public_read,
                cache_control: object.cache_control.clone(),
                expires: object.expires.clone(),
            },
        );
        Ok(())
    }

    fn configure_website(
        &self,
        index_document: &str,
        error_document: &str,
    ) -> Result<(), StorageError> {
        self.operations
            .lock()
            .unwrap()
            .push(StoreOp::ConfigureWebsite {
                index: index_document.to_string(),
                error: error_document.to_string(),
            });
        Ok(())
    }

    fn website_endpoint(&self) -> String {
        "bucket.s3-website.test".to_string()
    }
}

// =========================================================================
// CDN
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdnOp {
    Distribution,
    CreateInvalidation(Vec<String>),
    Status,
}

/// CDN that answers status queries from a script.
///
/// `distribution: None` makes the lookup fail. Once the script runs out,
/// every further status query reports `Completed`. Batch ids are `I1`,
/// `I2`, ... in submission order.
pub struct ScriptedCdn {
    distribution: Option<Distribution>,
    statuses: Mutex<VecDeque<InvalidationStatus>>,
    operations: Mutex<Vec<CdnOp>>,
}

impl ScriptedCdn {
    pub fn new(distribution: Option<Distribution>, statuses: Vec<InvalidationStatus>) -> Self {
        Self {
            distribution,
            statuses: Mutex::new(statuses.into()),
            operations: Mutex::new(Vec::new()),
        }
    }

    pub fn operations(&self) -> Vec<CdnOp> {
        self.operations.lock().unwrap().clone()
    }
}

impl Cdn for ScriptedCdn {
    fn distribution(&self, distribution_id: &str) -> Result<Distribution, StorageError> {
        self.operations.lock().unwrap().push(CdnOp::Distribution);
        self.distribution
            .clone()
            .ok_or_else(|| StorageError::remote("GetDistribution", format!("{distribution_id} not found")))
    }

    fn create_invalidation(
        &self,
        _distribution_id: &str,
        paths: &[String],
    ) -> Result<String, StorageError> {
        let mut ops = self.operations.lock().unwrap();
        ops.push(CdnOp::CreateInvalidation(paths.to_vec()));
        let batch = ops
            .iter()
            .filter(|op| matches!(op, CdnOp::CreateInvalidation(_)))
            .count();
        Ok(format!("I{batch}"))
    }

    fn invalidation_status(
        &self,
        _distribution_id: &str,
        _batch_id: &str,
    ) -> Result<InvalidationStatus, StorageError> {
        self.operations.lock().unwrap().push(CdnOp::Status);
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(InvalidationStatus::Completed))
    }
}
