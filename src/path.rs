//! Site paths and the output locations derived from them.
//!
//! A [`SitePath`] is the URL path a producer asks to publish, always starting
//! with `/`. There are two classes:
//!
//! - **Directory paths** end with `/` (`/`, `/blog/`). They have no filename
//!   of their own, so an index file is appended when writing them out.
//! - **File paths** (`/robots.txt`, `/feed`) are written under exactly their
//!   own name.
//!
//! The mapping from path to output location differs per target:
//!
//! ```text
//! path          content-type        disk / app engine    object key
//! /             text/html           index.html           index.html
//! /api/         application/json    api/index.json       api/index.html
//! /feed         application/rss+xml feed                 feed
//! ```
//!
//! Disk and App Engine pick the index extension from the response
//! content-type; object storage always uses `index.html`, which is what the
//! bucket's website configuration serves for directory requests.

use crate::mime;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("path must start with '/': {0:?}")]
    MissingLeadingSlash(String),
    #[error("path must not contain whitespace: {0:?}")]
    Whitespace(String),
    #[error("path must not contain '..' segments: {0:?}")]
    ParentSegment(String),
    #[error("path must not contain empty segments ('//'): {0:?}")]
    EmptySegment(String),
}

/// A URL path to render and publish.
///
/// Paths are taken as they appear on the wire: reserved characters,
/// whitespace included, must already be percent-encoded (`/my%20page/`).
/// Raw whitespace, `..` segments and empty segments are rejected, so every
/// path maps to a location under the output root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SitePath(String);

impl SitePath {
    /// Parse a path, rejecting anything that doesn't start with `/` or
    /// could resolve outside the output root.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if !raw.starts_with('/') {
            return Err(PathError::MissingLeadingSlash(raw.to_string()));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(PathError::Whitespace(raw.to_string()));
        }
        if raw.split('/').any(|segment| segment == "..") {
            return Err(PathError::ParentSegment(raw.to_string()));
        }
        if raw.contains("//") {
            return Err(PathError::EmptySegment(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for paths ending in `/`, which need an index filename.
    pub fn is_directory(&self) -> bool {
        self.0.ends_with('/')
    }

    /// The path with its leading `/` removed.
    pub fn relative(&self) -> &str {
        &self.0[1..]
    }

    /// Extension of the last path segment, without the dot.
    ///
    /// Directory paths and segments without a dot have none. A leading dot
    /// (`/.well-known`) does not count as an extension.
    pub fn extension(&self) -> Option<&str> {
        if self.is_directory() {
            return None;
        }
        let segment = self.0.rsplit('/').next().unwrap_or_default();
        match segment.rfind('.') {
            Some(0) | None => None,
            Some(i) => Some(&segment[i + 1..]),
        }
    }
}

impl fmt::Display for SitePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relative output location for the disk and App Engine targets.
///
/// Directory paths get `index` plus the extension resolved from the
/// response content-type.
pub fn disk_location(path: &SitePath, content_type: &str) -> String {
    if path.is_directory() {
        format!(
            "{}index{}",
            path.relative(),
            mime::resolve_extension(content_type)
        )
    } else {
        path.relative().to_string()
    }
}

/// Object-storage key for a path. Directory paths always get `index.html`.
pub fn object_key(path: &SitePath) -> String {
    if path.is_directory() {
        format!("{}index.html", path.relative())
    } else {
        path.relative().to_string()
    }
}
