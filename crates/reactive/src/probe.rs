//! Data-readiness probe for prerendering.

use crate::options::QueryOptions;
use crate::service::{DataService, PendingResult, QueryStream};
use tether_core::Result;
use tracing::debug;

/// Returns the future a prerender pass must wait on, if any.
///
/// Components that opted out of prerendering (`ssr == false`) answer
/// `Ok(None)` without touching the service. Otherwise a throwaway stream is
/// opened with the prerender variant of `options` (forced network policies
/// become cache-first, so the probe can be answered from the cache), and its
/// completion future is returned while the `live` stream is still loading.
pub fn pending(
    service: &dyn DataService,
    options: &QueryOptions,
    live: &dyn QueryStream,
) -> Result<Option<PendingResult>> {
    if !options.ssr {
        debug!("probe skipped, prerendering disabled");
        return Ok(None);
    }

    let probe = service.open_stream(&options.for_prerender())?;
    if live.current_snapshot().loading {
        debug!(
            operation = options.query.operation_name().unwrap_or("anonymous"),
            "probe waiting on data"
        );
        Ok(Some(probe.result()))
    } else {
        Ok(None)
    }
}
