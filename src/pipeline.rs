//! Drives one backend through a full publish run.
//!
//! ```text
//! backend.initialize(ledger)
//! for producer in registry:
//!     records = run_units(producer.paths, workers, make_responder, backend.publish)
//!     backend.absorb(records, ledger)
//! backend.finalize(ledger)
//! ```
//!
//! Producers run one after another, in registration order; only the paths
//! of a single producer are spread over the worker pool. `absorb` sees each
//! producer's records in path order, on this thread, after the pool has
//! joined. The first error from any phase stops the run: later producers
//! are not published and `finalize` never runs.

use crate::backend::{Backend, PublishError, PublishLedger};
use crate::event::{Events, PublishEvent};
use crate::executor::run_units;
use crate::path::SitePath;
use crate::producer::Registry;
use crate::responder::Responder;

/// Totals for a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub paths_published: usize,
    /// Where the published site can be reached, as reported by the backend.
    pub location: Option<String>,
}

/// Publish every path of every registered producer through `backend`.
///
/// `make_responder` is called once for a sequential run (`workers <= 1`)
/// and once per path otherwise.
pub fn publish<B, R, M>(
    backend: &mut B,
    registry: &Registry,
    workers: usize,
    make_responder: M,
    events: &Events,
) -> Result<RunSummary, PublishError>
where
    B: Backend,
    R: Responder,
    M: Fn() -> Result<R, PublishError> + Sync,
{
    let mut ledger = PublishLedger::new();
    backend.initialize(&mut ledger, events)?;
    tracing::info!(backend = backend.name(), workers, "publish started");

    let mut paths_published = 0;
    for producer in registry.producers() {
        let paths = producer.paths()?;
        tracing::info!(producer = producer.name(), paths = paths.len(), "publishing producer");
        events.emit(PublishEvent::ProducerStarted {
            name: producer.name().to_string(),
            path_count: paths.len(),
            workers: workers.max(1),
        });

        let shared: &B = backend;
        let records = run_units(
            paths,
            workers,
            &make_responder,
            |responder: &mut R, path: &SitePath| shared.publish(responder, path, events),
        )?;
        paths_published += records.len();
        backend.absorb(records, &mut ledger)?;
    }

    let location = backend.finalize(&ledger, events)?;
    tracing::info!(paths_published, ?location, "publish finished");
    Ok(RunSummary {
        paths_published,
        location,
    })
}
