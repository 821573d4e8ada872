//! Path producers: the sources of paths to publish.
//!
//! A producer yields an ordered list of [`SitePath`]s. The publisher never
//! discovers producers on its own; the caller hands a [`Registry`] to the
//! pipeline, and the pipeline publishes each producer's paths as one batch,
//! in registry order.
//!
//! Producers are wrapped in [`Memoized`] so `get_paths` runs at most once per
//! producer, however many times the pipeline (or the `paths` command) asks.

use crate::path::{PathError, SitePath};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("producer '{producer}': {source}")]
    InvalidPath {
        producer: String,
        source: PathError,
    },
}

/// Something that knows which paths to publish.
pub trait PathProducer {
    /// Label used in progress output.
    fn name(&self) -> &str;

    /// Compute the ordered list of paths.
    fn get_paths(&self) -> Result<Vec<SitePath>, ProducerError>;
}

/// Caches a producer's paths for the producer's lifetime.
pub struct Memoized<P> {
    inner: P,
    paths: OnceLock<Vec<SitePath>>,
}

impl<P: PathProducer> Memoized<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            paths: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// The producer's paths, computed on first access.
    pub fn paths(&self) -> Result<&[SitePath], ProducerError> {
        if let Some(paths) = self.paths.get() {
            return Ok(paths);
        }
        let computed = self.inner.get_paths()?;
        Ok(self.paths.get_or_init(|| computed))
    }
}

/// A producer backed by a literal list and/or a file of paths.
///
/// The file holds one path per line; blank lines and `#` comments are
/// skipped. Inline paths come first, then the file's, each in order.
#[derive(Debug, Clone)]
pub struct PathList {
    name: String,
    paths: Vec<String>,
    file: Option<PathBuf>,
}

impl PathList {
    pub fn new(name: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            name: name.into(),
            paths,
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    fn read_file(file: &Path) -> Result<Vec<String>, ProducerError> {
        let content = std::fs::read_to_string(file).map_err(|source| ProducerError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect())
    }
}

impl PathProducer for PathList {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_paths(&self) -> Result<Vec<SitePath>, ProducerError> {
        let mut raw = self.paths.clone();
        if let Some(file) = &self.file {
            raw.extend(Self::read_file(file)?);
        }
        raw.iter()
            .map(|p| {
                SitePath::parse(p).map_err(|source| ProducerError::InvalidPath {
                    producer: self.name.clone(),
                    source,
                })
            })
            .collect()
    }
}

/// The ordered set of producers for one run.
#[derive(Default)]
pub struct Registry {
    producers: Vec<Memoized<Box<dyn PathProducer>>>,
}

impl PathProducer for Box<dyn PathProducer> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_paths(&self) -> Result<Vec<SitePath>, ProducerError> {
        (**self).get_paths()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, producer: impl PathProducer + 'static) {
        let boxed: Box<dyn PathProducer> = Box::new(producer);
        self.producers.push(Memoized::new(boxed));
    }

    pub fn producers(&self) -> &[Memoized<Box<dyn PathProducer>>] {
        &self.producers
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}
