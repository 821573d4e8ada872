//! Progress events emitted while publishing.
//!
//! The pipeline and backends never print. They send [`PublishEvent`]s to an
//! optional channel; the CLI drains it on a printer thread and formats each
//! event with [`crate::output::format_publish_event`]. Library callers that
//! don't care pass [`Events::none`].

use crate::storage::InvalidationStatus;
use std::fmt;
use std::sync::mpsc::Sender;

/// What happened to one published path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAction {
    /// Written to the local filesystem.
    Written,
    /// Uploaded; no object existed at the key.
    Creating,
    /// Uploaded over an object with different content.
    Updating,
    /// Remote object already has identical content.
    Skipping,
}

impl fmt::Display for PublishAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Written => "Writing",
            Self::Creating => "Creating",
            Self::Updating => "Updating",
            Self::Skipping => "Skipping",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishEvent {
    Initialized {
        target: &'static str,
    },
    ProducerStarted {
        name: String,
        path_count: usize,
        workers: usize,
    },
    PathPublished {
        path: String,
        /// File path or URL the content ended up at.
        location: String,
        action: PublishAction,
    },
    InvalidationSubmitted {
        batch_id: String,
        path_count: usize,
    },
    InvalidationPolled {
        batch_id: String,
        status: InvalidationStatus,
    },
    InvalidationSkipped {
        reason: String,
    },
    Finalized {
        target: &'static str,
        /// Where the published site can be found, if the target knows.
        location: Option<String>,
        /// Follow-up command for the user, if any.
        hint: Option<String>,
    },
}

/// Optional sender for progress events.
#[derive(Clone, Default)]
pub struct Events(Option<Sender<PublishEvent>>);

impl Events {
    pub fn new(tx: Sender<PublishEvent>) -> Self {
        Self(Some(tx))
    }

    pub fn none() -> Self {
        Self(None)
    }

    /// Send an event. A disconnected receiver is ignored.
    pub fn emit(&self, event: PublishEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}
