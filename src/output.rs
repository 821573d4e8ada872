//! CLI output formatting.
//!
//! Formatting is pure: each function returns display lines, and only the
//! `print_*` wrappers and the printer thread in `main` write to stdout.
//!
//! # Output Format
//!
//! ## Publish
//!
//! ```text
//! ==> Publishing to s3
//! pages (3 paths, 10 workers)
//!     Creating http://www.example.com.s3-website-us-east-1.amazonaws.com/
//!     Skipping http://www.example.com.s3-website-us-east-1.amazonaws.com/about/
//!     Updating http://www.example.com.s3-website-us-east-1.amazonaws.com/feed
//! Invalidating 6 paths (batch I2J0I21PCUYOIK)
//!     InProgress
//!     Completed
//! ==> Published to http://www.example.com
//! ```
//!
//! App Engine adds the deploy command after the final line:
//!
//! ```text
//! ==> Published to /home/me/site/deploy
//! Deploy with:
//!     appcfg.py update /home/me/site/deploy
//! ```
//!
//! ## Paths
//!
//! ```text
//! pages (2 paths)
//!     / → index.html
//!     /feed → feed
//! 2 paths
//! ```

use crate::config::Target;
use crate::event::PublishEvent;
use crate::path::{SitePath, disk_location, object_key};

/// Format a single publish progress event as display lines.
pub fn format_publish_event(event: &PublishEvent) -> Vec<String> {
    match event {
        PublishEvent::Initialized { target } => vec![format!("==> Publishing to {target}")],
        PublishEvent::ProducerStarted {
            name,
            path_count,
            workers,
        } => {
            if *workers > 1 {
                vec![format!("{name} ({}, {workers} workers)", paths(*path_count))]
            } else {
                vec![format!("{name} ({})", paths(*path_count))]
            }
        }
        PublishEvent::PathPublished {
            location, action, ..
        } => vec![format!("    {action} {location}")],
        PublishEvent::InvalidationSubmitted {
            batch_id,
            path_count,
        } => vec![format!(
            "Invalidating {} (batch {batch_id})",
            paths(*path_count)
        )],
        PublishEvent::InvalidationPolled { status, .. } => vec![format!("    {status}")],
        PublishEvent::InvalidationSkipped { reason } => {
            vec![format!("Skipping invalidation: {reason}")]
        }
        PublishEvent::Finalized { location, hint, .. } => {
            let mut lines = vec![match location {
                Some(location) => format!("==> Published to {location}"),
                None => "==> Published".to_string(),
            }];
            if let Some(hint) = hint {
                lines.push("Deploy with:".to_string());
                lines.push(format!("    {hint}"));
            }
            lines
        }
    }
}

fn paths(n: usize) -> String {
    if n == 1 {
        "1 path".to_string()
    } else {
        format!("{n} paths")
    }
}

/// Where a path will be stored, as far as can be told without fetching it.
///
/// Directory paths on disk and App Engine get their extension from the
/// response content-type; HTML is assumed here.
pub fn planned_location(path: &SitePath, target: Target) -> String {
    match target {
        Target::Disk => disk_location(path, "text/html"),
        Target::S3 => object_key(path),
        Target::AppEngine => format!(
            "{}/{}",
            crate::backend::app_engine::STATIC_DIR,
            disk_location(path, "text/html")
        ),
    }
}

/// Format every producer's paths with their planned output location.
pub fn format_paths_output(producers: &[(&str, &[SitePath])], target: Target) -> Vec<String> {
    let mut lines = Vec::new();
    let mut total = 0;
    for (name, producer_paths) in producers {
        lines.push(format!("{name} ({})", paths(producer_paths.len())));
        for path in *producer_paths {
            lines.push(format!(
                "    {path} \u{2192} {}",
                planned_location(path, target)
            ));
        }
        total += producer_paths.len();
    }
    lines.push(paths(total));
    lines
}

pub fn print_paths_output(producers: &[(&str, &[SitePath])], target: Target) {
    for line in format_paths_output(producers, target) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
