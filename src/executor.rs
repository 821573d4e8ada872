//! Runs one unit of work per path, sequentially or on a bounded pool.
//!
//! ## Ordering
//!
//! Results always come back in input order, whatever order the workers
//! finish in. The App Engine descriptor and the CDN invalidation list are
//! both built from these results, so a reordering would change published
//! output, not just log lines. rayon's indexed `par_iter().collect()`
//! provides this directly.
//!
//! ## Failure
//!
//! The first error wins. Sequentially, nothing after the failing item runs.
//! In parallel, rayon stops handing out new items once an error is
//! collected; items already running finish, and their results are dropped.
//!
//! ## Per-unit context
//!
//! Each unit gets a `&mut` context (in practice, a responder) created by
//! `make_context`. The sequential path creates one and reuses it for every
//! item. The parallel path creates a fresh one per item, so no worker ever
//! shares mutable state with a sibling and the context type needn't be
//! `Send` or `Sync`.

use rayon::prelude::*;

/// Run `unit` over `items`, in parallel when `parallelism > 1`.
pub fn run_units<T, C, R, E, M, F>(
    items: &[T],
    parallelism: usize,
    make_context: M,
    unit: F,
) -> Result<Vec<R>, E>
where
    T: Sync,
    R: Send,
    E: Send + From<rayon::ThreadPoolBuildError>,
    M: Fn() -> Result<C, E> + Sync,
    F: Fn(&mut C, &T) -> Result<R, E> + Sync,
{
    if parallelism <= 1 || items.len() <= 1 {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut context = make_context()?;
        return items.iter().map(|item| unit(&mut context, item)).collect();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism)
        .thread_name(|i| format!("sitepress-worker-{i}"))
        .build()?;

    tracing::debug!(parallelism, items = items.len(), "dispatching to worker pool");

    pool.install(|| {
        items
            .par_iter()
            .map(|item| {
                let mut context = make_context()?;
                unit(&mut context, item)
            })
            .collect()
    })
}
