//! S3-style bucket target with CDN invalidation.
//!
//! # Uploads
//!
//! Each path is stored under its [object key](crate::path::object_key):
//! the path minus its leading `/`, with `index.html` appended to directory
//! paths regardless of content-type (the bucket's website configuration
//! maps directory requests to `index.html`).
//!
//! Re-publishing unchanged content must not re-upload it. Before uploading,
//! the backend looks up the existing object and compares its ETag with the
//! MD5 of the new body, which is what S3 reports as the ETag of a
//! single-part upload:
//!
//! | Remote object | ETag vs MD5 | Action |
//! |---|---|---|
//! | absent (or lookup failed) | n/a | upload, `Creating` |
//! | present, no ETag | n/a | upload, `Updating` |
//! | present | differs | upload, `Updating` |
//! | present | equal | `Skipping` |
//!
//! Uploads are `public-read` and carry the response's `Content-Type`. With
//! a non-zero `cache_time`, they also get `Cache-Control: max-age=N,
//! must-revalidate` and an `Expires` 1.5×N seconds out.
//!
//! # Invalidation
//!
//! After every batch is absorbed, `finalize` submits one invalidation for
//! all published paths and keys, as long as a distribution is configured
//! and it has fewer than [`MAX_IN_FLIGHT_INVALIDATIONS`] batches already in
//! progress. The [`InvalidationPoller`] then blocks until the CDN reports
//! something other than `InProgress`.
//!
//! Invalidation only speeds up propagation; the objects are already
//! published. Failures anywhere in this phase are logged and reported as a
//! skipped invalidation, never as a failed run.

use super::{Backend, PublishError, PublishLedger, PublishedPath, fetch};
use crate::event::{Events, PublishAction, PublishEvent};
use crate::path::{SitePath, object_key};
use crate::responder::Responder;
use crate::storage::{Cdn, InvalidationStatus, ObjectStore, PutObject, StorageError};
use md5::{Digest, Md5};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// CloudFront refuses new batches beyond this many in flight.
pub const MAX_IN_FLIGHT_INVALIDATIONS: u32 = 3;

/// Settings for the object-storage target.
#[derive(Debug, Clone)]
pub struct ObjectStorageSettings {
    pub index_document: String,
    pub error_document: String,
    /// Browser cache lifetime in seconds; 0 disables cache headers.
    pub cache_time: u64,
    pub distribution_id: Option<String>,
    pub poll_interval: Duration,
    /// Stop waiting for an invalidation after this long. `None` waits
    /// until the CDN reports a terminal status.
    pub max_poll: Option<Duration>,
}

impl Default for ObjectStorageSettings {
    fn default() -> Self {
        Self {
            index_document: "index.html".to_string(),
            error_document: "500.html".to_string(),
            cache_time: 0,
            distribution_id: None,
            poll_interval: Duration::from_secs(5),
            max_poll: None,
        }
    }
}

/// Outcome of publishing one path to the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub path: SitePath,
    pub key: String,
    /// Hex MD5 of the body.
    pub content_hash: String,
    pub remote_etag: Option<String>,
    pub action: PublishAction,
}

/// Hex MD5 digest of a body, comparable with an S3 ETag.
pub fn content_hash(body: &[u8]) -> String {
    format!("{:x}", Md5::digest(body))
}

/// Whether a remote ETag denotes the same content as `hash`.
///
/// ETags come back quoted (`"abc..."`); quotes of either kind are stripped
/// before comparing. A missing ETag never matches.
pub fn etag_matches(etag: Option<&str>, hash: &str) -> bool {
    etag.map(|e| e.trim_matches(|c| c == '"' || c == '\''))
        .is_some_and(|e| e.eq_ignore_ascii_case(hash))
}

/// Waits for an invalidation batch to leave `InProgress`.
#[derive(Debug, Clone)]
pub struct InvalidationPoller {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
}

impl InvalidationPoller {
    /// Query immediately, then every `interval` while the batch is
    /// `InProgress`. Returns the last status seen.
    pub fn wait(
        &self,
        cdn: &dyn Cdn,
        distribution_id: &str,
        batch_id: &str,
        events: &Events,
    ) -> Result<InvalidationStatus, StorageError> {
        let started = Instant::now();
        let mut status = cdn.invalidation_status(distribution_id, batch_id)?;
        events.emit(PublishEvent::InvalidationPolled {
            batch_id: batch_id.to_string(),
            status: status.clone(),
        });

        while status == InvalidationStatus::InProgress {
            if let Some(max_wait) = self.max_wait
                && started.elapsed() >= max_wait
            {
                warn!(batch_id, ?max_wait, "gave up waiting for invalidation");
                break;
            }
            std::thread::sleep(self.interval);
            status = cdn.invalidation_status(distribution_id, batch_id)?;
            events.emit(PublishEvent::InvalidationPolled {
                batch_id: batch_id.to_string(),
                status: status.clone(),
            });
        }
        Ok(status)
    }
}

pub struct ObjectStorageBackend {
    store: Arc<dyn ObjectStore>,
    cdn: Option<Arc<dyn Cdn>>,
    settings: ObjectStorageSettings,
}

impl ObjectStorageBackend {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cdn: Option<Arc<dyn Cdn>>,
        settings: ObjectStorageSettings,
    ) -> Self {
        Self {
            store,
            cdn,
            settings,
        }
    }

    fn website_url(&self) -> String {
        format!("http://{}", self.store.website_endpoint())
    }

    fn cache_headers(&self) -> (Option<String>, Option<String>) {
        let cache_time = self.settings.cache_time;
        if cache_time == 0 {
            return (None, None);
        }
        let lifetime_ms = i64::try_from(cache_time.saturating_mul(1500)).unwrap_or(i64::MAX);
        let expires = chrono::Utc::now() + chrono::Duration::milliseconds(lifetime_ms);
        (
            Some(format!("max-age={cache_time}, must-revalidate")),
            Some(expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
        )
    }

    /// Submit and wait for the invalidation. `Ok(None)` when skipped.
    fn invalidate(
        &self,
        ledger: &PublishLedger,
        events: &Events,
    ) -> Result<Option<String>, StorageError> {
        let skip = |reason: &str| {
            info!(reason, "skipping CDN invalidation");
            events.emit(PublishEvent::InvalidationSkipped {
                reason: reason.to_string(),
            });
        };

        let (Some(distribution_id), Some(cdn)) = (&self.settings.distribution_id, &self.cdn)
        else {
            skip("no distribution configured");
            return Ok(None);
        };

        let distribution = match cdn.distribution(distribution_id) {
            Ok(d) => d,
            Err(err) => {
                warn!(distribution_id, error = %err, "distribution lookup failed");
                skip("distribution not found");
                return Ok(None);
            }
        };

        let in_flight = distribution.in_progress_invalidation_batches;
        if in_flight >= MAX_IN_FLIGHT_INVALIDATIONS {
            skip(&format!("{in_flight} invalidation batches already in progress"));
            return Ok(Some(distribution.site_url()));
        }

        let paths = ledger.invalidation_paths();
        if paths.is_empty() {
            skip("nothing was published");
            return Ok(Some(distribution.site_url()));
        }

        let batch_id = cdn.create_invalidation(distribution_id, &paths)?;
        info!(batch_id, paths = paths.len(), "invalidation submitted");
        events.emit(PublishEvent::InvalidationSubmitted {
            batch_id: batch_id.clone(),
            path_count: paths.len(),
        });

        let poller = InvalidationPoller {
            interval: self.settings.poll_interval,
            max_wait: self.settings.max_poll,
        };
        let status = poller.wait(cdn.as_ref(), distribution_id, &batch_id, events)?;
        info!(batch_id, %status, "invalidation finished polling");

        Ok(Some(distribution.site_url()))
    }
}

impl Backend for ObjectStorageBackend {
    type Record = UploadRecord;

    fn name(&self) -> &'static str {
        "s3"
    }

    fn initialize(
        &mut self,
        ledger: &mut PublishLedger,
        events: &Events,
    ) -> Result<(), PublishError> {
        ledger.reset();
        self.store
            .configure_website(&self.settings.index_document, &self.settings.error_document)?;
        events.emit(PublishEvent::Initialized {
            target: self.name(),
        });
        Ok(())
    }

    fn publish(
        &self,
        responder: &mut dyn Responder,
        path: &SitePath,
        events: &Events,
    ) -> Result<UploadRecord, PublishError> {
        let response = fetch(responder, path)?;
        let key = object_key(path);
        let hash = content_hash(&response.body);

        let head = self.store.head(&key).unwrap_or_else(|err| {
            warn!(key, error = %err, "object lookup failed, treating as absent");
            None
        });
        let remote_etag = head.as_ref().and_then(|h| h.etag.clone());

        let action = match &head {
            None => PublishAction::Creating,
            Some(_) if etag_matches(remote_etag.as_deref(), &hash) => PublishAction::Skipping,
            Some(_) => PublishAction::Updating,
        };

        if action != PublishAction::Skipping {
            let (cache_control, expires) = self.cache_headers();
            self.store.put(&PutObject {
                key: &key,
                body: &response.body,
                content_type: &response.content_type,
                public_read: true,
                cache_control,
                expires,
            })?;
        }

        events.emit(PublishEvent::PathPublished {
            path: path.to_string(),
            location: format!("http://{}{}", self.store.website_endpoint(), path),
            action,
        });

        Ok(UploadRecord {
            path: path.clone(),
            key,
            content_hash: hash,
            remote_etag,
            action,
        })
    }

    fn absorb(
        &mut self,
        records: Vec<UploadRecord>,
        ledger: &mut PublishLedger,
    ) -> Result<(), PublishError> {
        let published: Vec<PublishedPath> = records
            .into_iter()
            .map(|r| PublishedPath {
                path: r.path,
                location: r.key,
            })
            .collect();
        ledger.extend(published);
        Ok(())
    }

    fn finalize(
        &mut self,
        ledger: &PublishLedger,
        events: &Events,
    ) -> Result<Option<String>, PublishError> {
        let url = match self.invalidate(ledger, events) {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "CDN invalidation failed");
                events.emit(PublishEvent::InvalidationSkipped {
                    reason: err.to_string(),
                });
                None
            }
        };
        let url = url.unwrap_or_else(|| self.website_url());
        events.emit(PublishEvent::Finalized {
            target: self.name(),
            location: Some(url.clone()),
            hint: None,
        });
        Ok(Some(url))
    }
}
