//! Local filesystem target.
//!
//! Writes each response body verbatim under the deploy directory:
//!
//! ```text
//! /              → deploy/index.html
//! /api/          → deploy/api/index.json     (application/json)
//! /robots.txt    → deploy/robots.txt
//! ```
//!
//! Existing files are overwritten. Nothing is deleted, so files for paths
//! that are no longer produced stay behind.

use super::{Backend, PublishError, PublishLedger, fetch};
use crate::event::{Events, PublishAction, PublishEvent};
use crate::path::{SitePath, disk_location};
use crate::responder::Responder;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// A path written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: SitePath,
    pub file: PathBuf,
}

pub struct DiskBackend {
    deploy_dir: PathBuf,
}

impl DiskBackend {
    pub fn new(deploy_dir: impl Into<PathBuf>) -> Self {
        Self {
            deploy_dir: deploy_dir.into(),
        }
    }
}

/// Write `body` to `root/relative`, creating parent directories.
///
/// `relative` must be made of plain segments only; anything that would
/// land outside `root` is refused with `InvalidInput`.
pub(crate) fn write_output(root: &Path, relative: &str, body: &[u8]) -> std::io::Result<PathBuf> {
    let relative_path = Path::new(relative);
    if !relative_path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("output location escapes deploy dir: {relative:?}"),
        ));
    }
    let out = root.join(relative_path);
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&out, body)?;
    Ok(out)
}

impl Backend for DiskBackend {
    type Record = WrittenFile;

    fn name(&self) -> &'static str {
        "disk"
    }

    fn initialize(
        &mut self,
        _ledger: &mut PublishLedger,
        events: &Events,
    ) -> Result<(), PublishError> {
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
    ) -> Result<WrittenFile, PublishError> {
        let response = fetch(responder, path)?;
        let relative = disk_location(path, &response.content_type);
        let file = write_output(&self.deploy_dir, &relative, &response.body)?;

        tracing::debug!(%path, file = %file.display(), bytes = response.body.len(), "wrote");
        events.emit(PublishEvent::PathPublished {
            path: path.to_string(),
            location: file.display().to_string(),
            action: PublishAction::Written,
        });

        Ok(WrittenFile {
            path: path.clone(),
            file,
        })
    }

    fn finalize(
        &mut self,
        _ledger: &PublishLedger,
        events: &Events,
    ) -> Result<Option<String>, PublishError> {
        let location = self.deploy_dir.display().to_string();
        events.emit(PublishEvent::Finalized {
            target: self.name(),
            location: Some(location.clone()),
            hint: None,
        });
        Ok(Some(location))
    }
}
