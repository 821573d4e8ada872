//! S3 and CloudFront implementations of the storage traits.
//!
//! The SDK is async; the publish pipeline is not. Every client here owns a
//! handle to one private multi-threaded tokio runtime and blocks on it per
//! call. `Runtime::block_on` takes `&self`, so rayon workers can share a
//! client and issue requests concurrently.
//!
//! Credentials and region come from the standard AWS environment chain
//! (`AWS_ACCESS_KEY_ID`, profiles, instance metadata, ...). The region can
//! be overridden from config.

use super::{
    Cdn, Distribution, InvalidationStatus, ObjectHead, ObjectStore, PutObject, StorageError,
};
use aws_config::BehaviorVersion;
use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, DateTime, DateTimeFormat};
use aws_sdk_s3::types::{ErrorDocument, IndexDocument, ObjectCannedAcl, WebsiteConfiguration};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Loaded AWS configuration plus the runtime that drives it.
pub struct AwsContext {
    runtime: Arc<Runtime>,
    config: aws_config::SdkConfig,
}

impl AwsContext {
    pub fn load(region: Option<&str>) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| StorageError::Setup(e.to_string()))?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = runtime.block_on(loader.load());

        Ok(Self {
            runtime: Arc::new(runtime),
            config,
        })
    }

    pub fn bucket(&self, name: &str) -> S3Bucket {
        let region = self
            .config
            .region()
            .map(|r| r.as_ref().to_string())
            .unwrap_or_else(|| "us-east-1".to_string());
        S3Bucket {
            runtime: Arc::clone(&self.runtime),
            client: aws_sdk_s3::Client::new(&self.config),
            bucket: name.to_string(),
            region,
        }
    }

    pub fn cloudfront(&self) -> CloudFront {
        CloudFront {
            runtime: Arc::clone(&self.runtime),
            client: aws_sdk_cloudfront::Client::new(&self.config),
        }
    }
}

pub struct S3Bucket {
    runtime: Arc<Runtime>,
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
}

impl ObjectStore for S3Bucket {
    fn head(&self, key: &str) -> Result<Option<ObjectHead>, StorageError> {
        let result = self.runtime.block_on(
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send(),
        );
        match result {
            Ok(out) => Ok(Some(ObjectHead {
                etag: out.e_tag().map(str::to_string),
            })),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_not_found()) =>
            {
                Ok(None)
            }
            Err(err) => Err(StorageError::remote(
                "HeadObject",
                DisplayErrorContext(err),
            )),
        }
    }

    fn put(&self, object: &PutObject<'_>) -> Result<(), StorageError> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(object.key)
            .body(ByteStream::from(object.body.to_vec()))
            .content_type(object.content_type);
        if object.public_read {
            req = req.acl(ObjectCannedAcl::PublicRead);
        }
        if let Some(cache_control) = &object.cache_control {
            req = req.cache_control(cache_control);
        }
        if let Some(expires) = &object.expires {
            let at = DateTime::from_str(expires, DateTimeFormat::HttpDate)
                .map_err(|e| StorageError::remote("PutObject", e))?;
            req = req.expires(at);
        }
        self.runtime
            .block_on(req.send())
            .map_err(|e| StorageError::remote("PutObject", DisplayErrorContext(e)))?;
        Ok(())
    }

    fn configure_website(
        &self,
        index_document: &str,
        error_document: &str,
    ) -> Result<(), StorageError> {
        let index = IndexDocument::builder()
            .suffix(index_document)
            .build()
            .map_err(|e| StorageError::remote("PutBucketWebsite", e))?;
        let error = ErrorDocument::builder()
            .key(error_document)
            .build()
            .map_err(|e| StorageError::remote("PutBucketWebsite", e))?;
        let website = WebsiteConfiguration::builder()
            .index_document(index)
            .error_document(error)
            .build();
        self.runtime
            .block_on(
                self.client
                    .put_bucket_website()
                    .bucket(&self.bucket)
                    .website_configuration(website)
                    .send(),
            )
            .map_err(|e| StorageError::remote("PutBucketWebsite", DisplayErrorContext(e)))?;
        Ok(())
    }

    fn website_endpoint(&self) -> String {
        format!("{}.s3-website-{}.amazonaws.com", self.bucket, self.region)
    }
}

pub struct CloudFront {
    runtime: Arc<Runtime>,
    client: aws_sdk_cloudfront::Client,
}

impl Cdn for CloudFront {
    fn distribution(&self, distribution_id: &str) -> Result<Distribution, StorageError> {
        let out = self
            .runtime
            .block_on(self.client.get_distribution().id(distribution_id).send())
            .map_err(|e| StorageError::remote("GetDistribution", DisplayErrorContext(e)))?;
        let dist = out
            .distribution()
            .ok_or_else(|| StorageError::remote("GetDistribution", "no distribution in response"))?;
        let aliases = dist
            .distribution_config()
            .and_then(|c| c.aliases())
            .map(|a| a.items().to_vec())
            .unwrap_or_default();
        Ok(Distribution {
            id: dist.id().to_string(),
            domain_name: dist.domain_name().to_string(),
            aliases,
            in_progress_invalidation_batches: u32::try_from(
                dist.in_progress_invalidation_batches(),
            )
            .unwrap_or(0),
        })
    }

    fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
    ) -> Result<String, StorageError> {
        let items = Paths::builder()
            .quantity(i32::try_from(paths.len()).unwrap_or(i32::MAX))
            .set_items(Some(paths.to_vec()))
            .build()
            .map_err(|e| StorageError::remote("CreateInvalidation", e))?;
        let batch = InvalidationBatch::builder()
            .paths(items)
            .caller_reference(format!(
                "sitepress-{}",
                chrono::Utc::now().timestamp_millis()
            ))
            .build()
            .map_err(|e| StorageError::remote("CreateInvalidation", e))?;
        let out = self
            .runtime
            .block_on(
                self.client
                    .create_invalidation()
                    .distribution_id(distribution_id)
                    .invalidation_batch(batch)
                    .send(),
            )
            .map_err(|e| StorageError::remote("CreateInvalidation", DisplayErrorContext(e)))?;
        out.invalidation()
            .map(|inv| inv.id().to_string())
            .ok_or_else(|| StorageError::remote("CreateInvalidation", "no invalidation in response"))
    }

    fn invalidation_status(
        &self,
        distribution_id: &str,
        batch_id: &str,
    ) -> Result<InvalidationStatus, StorageError> {
        let out = self
            .runtime
            .block_on(
                self.client
                    .get_invalidation()
                    .distribution_id(distribution_id)
                    .id(batch_id)
                    .send(),
            )
            .map_err(|e| StorageError::remote("GetInvalidation", DisplayErrorContext(e)))?;
        out.invalidation()
            .map(|inv| InvalidationStatus::from_api(inv.status()))
            .ok_or_else(|| StorageError::remote("GetInvalidation", "no invalidation in response"))
    }
}
