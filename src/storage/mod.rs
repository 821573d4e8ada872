//! Object storage and CDN clients used by the S3 target.
//!
//! The object-storage backend talks to its bucket and distribution only
//! through the [`ObjectStore`] and [`Cdn`] traits, so the publish logic
//! (content-hash skipping, invalidation batching, polling) is independent of
//! any particular SDK. The real S3/CloudFront implementation lives in
//! [`aws`] behind the `aws` cargo feature.
//!
//! Both traits are `Send + Sync`: a single client is shared by every worker
//! when uploads run in parallel.

#[cfg(feature = "aws")]
pub mod aws;

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{operation} failed: {message}")]
    Remote {
        operation: &'static str,
        message: String,
    },
    #[error("Storage client setup failed: {0}")]
    Setup(String),
}

impl StorageError {
    pub fn remote(operation: &'static str, err: impl fmt::Display) -> Self {
        Self::Remote {
            operation,
            message: err.to_string(),
        }
    }
}

/// Metadata of an existing remote object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    /// ETag as returned by the store, quotes and all.
    pub etag: Option<String>,
}

/// A single upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject<'a> {
    pub key: &'a str,
    pub body: &'a [u8],
    pub content_type: &'a str,
    /// Grant anonymous read (`public-read` canned ACL).
    pub public_read: bool,
    pub cache_control: Option<String>,
    /// HTTP-date for the `Expires` header.
    pub expires: Option<String>,
}

/// A bucket configured for static website hosting.
pub trait ObjectStore: Send + Sync {
    /// Look up an object. `Ok(None)` when no object exists at `key`.
    fn head(&self, key: &str) -> Result<Option<ObjectHead>, StorageError>;

    /// Create or overwrite an object.
    fn put(&self, object: &PutObject<'_>) -> Result<(), StorageError>;

    /// Set the index and error documents served by the website endpoint.
    fn configure_website(
        &self,
        index_document: &str,
        error_document: &str,
    ) -> Result<(), StorageError>;

    /// Host name of the bucket's website endpoint.
    fn website_endpoint(&self) -> String;
}

/// A CDN distribution in front of the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub id: String,
    pub domain_name: String,
    pub aliases: Vec<String>,
    pub in_progress_invalidation_batches: u32,
}

impl Distribution {
    /// Public URL of the site: first alias (CNAME) if any, else the
    /// distribution's own domain.
    pub fn site_url(&self) -> String {
        let host = self.aliases.first().unwrap_or(&self.domain_name);
        format!("http://{host}")
    }
}

/// Status of a submitted invalidation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationStatus {
    Pending,
    InProgress,
    Completed,
    /// Anything the CDN reports that isn't one of the above.
    Other(String),
}

impl InvalidationStatus {
    /// Parse the status string returned by the CDN API.
    pub fn from_api(status: &str) -> Self {
        match status {
            "Pending" => Self::Pending,
            "InProgress" => Self::InProgress,
            "Completed" => Self::Completed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for InvalidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::InProgress => f.write_str("InProgress"),
            Self::Completed => f.write_str("Completed"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Cache invalidation on a CDN.
pub trait Cdn: Send + Sync {
    fn distribution(&self, distribution_id: &str) -> Result<Distribution, StorageError>;

    /// Submit an invalidation for `paths`, returning the batch id.
    fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
    ) -> Result<String, StorageError>;

    fn invalidation_status(
        &self,
        distribution_id: &str,
        batch_id: &str,
    ) -> Result<InvalidationStatus, StorageError>;
}
