//! # Sitepress
//!
//! Publishes a dynamic site as static files. A list of URL paths is fetched
//! from the running application, and each response is stored on one of three
//! targets: a local directory, an S3 bucket behind CloudFront, or a Google
//! App Engine static deployment.
//!
//! # Architecture: Three-Phase Publish
//!
//! Every target implements [`backend::Backend`], and [`pipeline::publish`]
//! drives it through the same lifecycle:
//!
//! ```text
//! 1. Initialize   once        prepare the target (dirs, app.yaml header, bucket website config)
//! 2. Publish      per path    fetch the path, store the body, return a record
//!    Absorb       per batch   fold the records into the run ledger, in path order
//! 3. Finalize     once        finish the target (handler table, CDN invalidation)
//! ```
//!
//! Publishing may run on a worker pool. Everything that accumulates across
//! paths happens in `absorb`, on the orchestrating thread, after the pool for
//! that batch has joined. Workers never share mutable state.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`path`] | `SitePath` and the path → file / object-key mapping |
//! | [`mime`] | Content-type → file extension resolution |
//! | [`responder`] | The `Responder` seam: path → `(status, content-type, body)` |
//! | [`producer`] | Path producers, memoization, and the producer registry |
//! | [`executor`] | Ordered sequential / bounded-parallel execution of per-path work |
//! | [`backend`] | The `Backend` trait, run ledger, and the disk / S3 / App Engine targets |
//! | [`storage`] | `ObjectStore` and `Cdn` traits; AWS clients behind the `aws` feature |
//! | [`pipeline`] | Runs a backend over every producer in the registry |
//! | [`event`] | Progress events sent from the pipeline to the CLI |
//! | [`config`] | `sitepress.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content-Hash Skipping
//!
//! The S3 target compares the MD5 of each body with the existing object's
//! ETag and skips identical uploads. Re-publishing an unchanged site issues
//! lookups only, and the invalidation still covers every path.
//!
//! ## Output Layout Differs Per Target
//!
//! Directory paths (`/blog/`) are written as `index` plus an extension taken
//! from the response content-type on disk and App Engine (`blog/index.json`
//! for JSON), but always as `blog/index.html` in a bucket, because that is
//! the document the bucket's website endpoint serves.
//!
//! ## Fail Fast
//!
//! A non-2xx response for any path aborts the run before `finalize`. There
//! is no retry and no rollback: files and objects already written stay.

pub mod backend;
pub mod config;
pub mod event;
pub mod executor;
pub mod mime;
pub mod output;
pub mod path;
pub mod pipeline;
pub mod producer;
pub mod responder;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;
