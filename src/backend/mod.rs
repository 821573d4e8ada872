//! Publish targets.
//!
//! Every target implements [`Backend`], a three-phase capability:
//!
//! ```text
//! initialize(ledger)           once, before any path is published
//! publish(responder, path)     once per path, possibly on a worker thread
//! absorb(records, ledger)      once per producer batch, after the workers join
//! finalize(ledger)             once, after every batch has been absorbed
//! ```
//!
//! `publish` takes `&self` and returns a record instead of mutating the
//! backend, so it can run on many workers at once. Anything that must be
//! accumulated across paths (the CDN invalidation list, App Engine route
//! fragments) goes through `absorb`, which the pipeline only calls on its
//! own thread with records in input order.
//!
//! | Backend | Writes to | Finalize |
//! |---|---|---|
//! | [`DiskBackend`] | `deploy_dir/` | nothing |
//! | [`ObjectStorageBackend`] | S3-compatible bucket | CDN invalidation + polling |
//! | [`AppEngineBackend`] | `deploy_dir/deploy/` + `app.yaml` | route table |

pub mod app_engine;
pub mod disk;
pub mod object_storage;

pub use app_engine::AppEngineBackend;
pub use disk::DiskBackend;
pub use object_storage::{InvalidationPoller, ObjectStorageBackend, ObjectStorageSettings};

use crate::event::Events;
use crate::path::SitePath;
use crate::producer::ProducerError;
use crate::responder::{Responder, ResponderError, Response};
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("GET {path} returned status {status}")]
    Fetch { path: String, status: u16 },
    #[error("GET {path} failed: {source}")]
    Responder {
        path: String,
        source: ResponderError,
    },
    #[error("Responder setup failed: {0}")]
    ResponderSetup(ResponderError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Path producer failed: {0}")]
    Producer(#[from] ProducerError),
    #[error("Worker pool failed to start: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// One published path as recorded in the run-wide ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPath {
    pub path: SitePath,
    /// Output key or relative file the path was stored under.
    pub location: String,
}

/// Run-wide record of what was published, owned by the pipeline.
///
/// Reset by `initialize`, appended to by `absorb` after each producer batch
/// has joined, read by `finalize`. Never touched from worker threads.
#[derive(Debug, Default)]
pub struct PublishLedger {
    entries: Vec<PublishedPath>,
}

impl PublishLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = PublishedPath>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[PublishedPath] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// URL paths to purge from a CDN: each published path followed by its
    /// storage key as a URL, deduplicated, first occurrence wins.
    pub fn invalidation_paths(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut paths = Vec::new();
        for entry in &self.entries {
            for candidate in [entry.path.to_string(), format!("/{}", entry.location)] {
                if seen.insert(candidate.clone()) {
                    paths.push(candidate);
                }
            }
        }
        paths
    }
}

/// A publish target. See the [module docs](self) for the lifecycle.
pub trait Backend: Sync {
    /// Per-path result handed back to `absorb`.
    type Record: Send;

    /// Short name used in progress output (`disk`, `s3`, `app-engine`).
    fn name(&self) -> &'static str;

    fn initialize(
        &mut self,
        ledger: &mut PublishLedger,
        events: &Events,
    ) -> Result<(), PublishError>;

    /// Render one path and persist it.
    fn publish(
        &self,
        responder: &mut dyn Responder,
        path: &SitePath,
        events: &Events,
    ) -> Result<Self::Record, PublishError>;

    /// Fold one producer's records (in path order) into backend or run state.
    fn absorb(
        &mut self,
        records: Vec<Self::Record>,
        ledger: &mut PublishLedger,
    ) -> Result<(), PublishError> {
        let _ = (records, ledger);
        Ok(())
    }

    /// Returns where the published site can be reached, if known.
    fn finalize(
        &mut self,
        ledger: &PublishLedger,
        events: &Events,
    ) -> Result<Option<String>, PublishError>;
}

/// Fetch a path, failing the run on anything but a 2xx response.
pub(crate) fn fetch(
    responder: &mut dyn Responder,
    path: &SitePath,
) -> Result<Response, PublishError> {
    let response = responder
        .get(path)
        .map_err(|source| PublishError::Responder {
            path: path.to_string(),
            source,
        })?;
    if !response.is_success() {
        return Err(PublishError::Fetch {
            path: path.to_string(),
            status: response.status,
        });
    }
    Ok(response)
}
