//! Publisher configuration.
//!
//! Loaded from `sitepress.toml` (or the file given with `--config`). Every
//! key is optional: the user file is merged over the stock defaults, so it
//! only needs the values it changes. Unknown keys are rejected to catch
//! typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! target = "disk"                  # disk | s3 | app-engine
//! deploy_dir = "deploy"            # output dir for disk and app-engine
//! base_url = "http://127.0.0.1:8000"  # running app the pages are fetched from
//!
//! [publish]
//! multithread = false
//! # workers = 10                   # default: CPU cores for disk, 10 otherwise
//!
//! [s3]
//! bucket = "www.example.com"
//! region = ""                      # empty = environment default
//! index_document = "index.html"
//! error_document = "500.html"
//! cache_time = 0                   # seconds, 0 = no cache headers
//! distribution_id = ""             # empty = no CDN invalidation
//! poll_interval_secs = 5
//! # max_poll_secs = 600
//!
//! [app_engine]
//! app_id = "my-app"
//! runtime = "python"
//!
//! [[producers]]
//! name = "pages"
//! paths = ["/", "/about/"]
//! # paths_file = "paths.txt"
//! ```
//!
//! Producers publish in the order they are listed.

use crate::backend::ObjectStorageSettings;
use crate::path::SitePath;
use crate::producer::{PathList, Registry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Where the site gets published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    Disk,
    S3,
    AppEngine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    pub target: Target,
    /// Output directory for the disk and App Engine targets.
    pub deploy_dir: String,
    /// Base URL of the running application pages are fetched from.
    pub base_url: String,
    pub publish: ParallelismConfig,
    pub s3: S3Config,
    pub app_engine: AppEngineConfig,
    pub producers: Vec<ProducerConfig>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            target: Target::Disk,
            deploy_dir: "deploy".to_string(),
            base_url: "http://127.0.0.1:8000".to_string(),
            publish: ParallelismConfig::default(),
            s3: S3Config::default(),
            app_engine: AppEngineConfig::default(),
            producers: Vec::new(),
        }
    }
}

impl PublishConfig {
    /// Validate values, including the keys the selected target requires.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.publish.workers == Some(0) {
            return Err(ConfigError::Validation(
                "publish.workers must be at least 1".into(),
            ));
        }
        match self.target {
            Target::Disk => {}
            Target::S3 => {
                if self.s3.bucket.is_empty() {
                    return Err(ConfigError::Validation(
                        "s3.bucket is required for the s3 target".into(),
                    ));
                }
                if self.s3.poll_interval_secs == 0 {
                    return Err(ConfigError::Validation(
                        "s3.poll_interval_secs must be non-zero".into(),
                    ));
                }
            }
            Target::AppEngine => {
                if self.app_engine.app_id.is_empty() {
                    return Err(ConfigError::Validation(
                        "app_engine.app_id is required for the app-engine target".into(),
                    ));
                }
            }
        }
        for producer in &self.producers {
            if producer.name.is_empty() {
                return Err(ConfigError::Validation(
                    "producers.name must not be empty".into(),
                ));
            }
            for raw in &producer.paths {
                SitePath::parse(raw).map_err(|e| {
                    ConfigError::Validation(format!("producer '{}': {e}", producer.name))
                })?;
            }
        }
        Ok(())
    }

    /// Build the producer registry. Relative `paths_file`s resolve against
    /// `base_dir` (the config file's directory).
    pub fn registry(&self, base_dir: &Path) -> Registry {
        let mut registry = Registry::new();
        for producer in &self.producers {
            let mut list = PathList::new(producer.name.clone(), producer.paths.clone());
            if let Some(file) = &producer.paths_file {
                list = list.with_file(base_dir.join(file));
            }
            registry.register(list);
        }
        registry
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParallelismConfig {
    /// Publish paths on a worker pool instead of one at a time.
    pub multithread: bool,
    /// Pool size. When absent, CPU cores for disk and 10 for remote targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

/// Remote targets are network-bound, so they get a fixed pool regardless
/// of core count.
pub const REMOTE_DEFAULT_WORKERS: usize = 10;

/// Resolve how many paths publish concurrently.
///
/// - `multithread = false` → 1
/// - `workers = Some(n)` → n
/// - otherwise CPU cores for disk, [`REMOTE_DEFAULT_WORKERS`] for S3 and App Engine
pub fn effective_workers(config: &PublishConfig) -> usize {
    if !config.publish.multithread {
        return 1;
    }
    config.publish.workers.unwrap_or_else(|| match config.target {
        Target::Disk => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        Target::S3 | Target::AppEngine => REMOTE_DEFAULT_WORKERS,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct S3Config {
    pub bucket: String,
    /// Empty = region from the environment.
    pub region: String,
    pub index_document: String,
    pub error_document: String,
    /// Seconds browsers may cache uploads; 0 sends no cache headers.
    pub cache_time: u64,
    /// CloudFront distribution to invalidate. Empty = none.
    pub distribution_id: String,
    pub poll_interval_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_poll_secs: Option<u64>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: String::new(),
            index_document: "index.html".to_string(),
            error_document: "500.html".to_string(),
            cache_time: 0,
            distribution_id: String::new(),
            poll_interval_secs: 5,
            max_poll_secs: None,
        }
    }
}

impl S3Config {
    pub fn settings(&self) -> ObjectStorageSettings {
        ObjectStorageSettings {
            index_document: self.index_document.clone(),
            error_document: self.error_document.clone(),
            cache_time: self.cache_time,
            distribution_id: (!self.distribution_id.is_empty())
                .then(|| self.distribution_id.clone()),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_poll: self.max_poll_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppEngineConfig {
    pub app_id: String,
    pub runtime: String,
}

impl Default for AppEngineConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            runtime: "python".to_string(),
        }
    }
}

/// One `[[producers]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProducerConfig {
    pub name: String,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths_file: Option<PathBuf>,
}

/// The stock defaults as a TOML table, the base layer user files merge onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PublishConfig::default())?)
}

/// Layer a user file over the stock defaults.
///
/// `[section]` tables combine, so a file setting only `s3.bucket` keeps
/// every other `s3` default. Scalars and arrays (`producers`) are taken
/// from `overlay` whole.
pub fn merge_toml(mut base: toml::Value, overlay: toml::Value) -> toml::Value {
    overlay_into(&mut base, overlay);
    base
}

fn overlay_into(slot: &mut toml::Value, overlay: toml::Value) {
    match (slot, overlay) {
        (toml::Value::Table(table), toml::Value::Table(entries)) => {
            for (key, value) in entries {
                match table.get_mut(&key) {
                    Some(existing) => overlay_into(existing, value),
                    None => {
                        table.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Merge an optional overlay onto the defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PublishConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PublishConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<PublishConfig, ConfigError> {
    if !path.exists() {
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Fully commented stock `sitepress.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# Sitepress Configuration
# =======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Where to publish: "disk", "s3" or "app-engine".
target = "disk"

# Output directory for the disk and app-engine targets.
deploy_dir = "deploy"

# The running application every path is fetched from.
base_url = "http://127.0.0.1:8000"

# ---------------------------------------------------------------------------
# Parallelism
# ---------------------------------------------------------------------------
[publish]
# Fetch and store several paths at once.
multithread = false

# Worker count when multithread is on.
# Omit to use the number of CPU cores (disk) or 10 (s3, app-engine).
# workers = 10

# ---------------------------------------------------------------------------
# S3 + CloudFront (target = "s3")
# ---------------------------------------------------------------------------
[s3]
# Bucket to upload to. Required for the s3 target.
bucket = ""

# Leave empty to take the region from the AWS environment.
region = ""

# Website hosting documents configured on the bucket.
index_document = "index.html"
error_document = "500.html"

# Browser cache lifetime in seconds. 0 sends no Cache-Control/Expires.
cache_time = 0

# CloudFront distribution to invalidate after upload. Empty = none.
distribution_id = ""

# Seconds between invalidation status checks.
poll_interval_secs = 5

# Stop waiting for the invalidation after this many seconds.
# Omit to wait until CloudFront reports it finished.
# max_poll_secs = 600

# ---------------------------------------------------------------------------
# Google App Engine (target = "app-engine")
# ---------------------------------------------------------------------------
[app_engine]
# Application id written to app.yaml. Required for the app-engine target.
app_id = ""
runtime = "python"

# ---------------------------------------------------------------------------
# Path producers, published in the order listed
# ---------------------------------------------------------------------------
# [[producers]]
# name = "pages"
# paths = ["/", "/about/"]
# paths_file = "paths.txt"    # one path per line, '#' starts a comment
"##
}
