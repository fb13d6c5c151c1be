//! Prerender walking.
//!
//! A prerender pass renders a tree of components once, asks each of them
//! what it is waiting on, waits for all of it, and renders again. The second
//! pass reads every result from the cache.

use crate::service::{FetchResult, PendingResult};
use futures::future::try_join_all;
use tether_core::Result;

/// Something a prerender pass can wait on.
pub trait DataProbe {
    /// Returns a future for the data this node is waiting on, or `None` if
    /// it can render now.
    fn probe_pending(&self) -> Result<Option<PendingResult>>;
}

/// Collects the pending futures of every probe.
///
/// Stops at the first probe that fails to answer.
pub fn collect_pending<'a, I>(probes: I) -> Result<Vec<PendingResult>>
where
    I: IntoIterator<Item = &'a dyn DataProbe>,
{
    let mut pending = Vec::new();
    for probe in probes {
        if let Some(waiting) = probe.probe_pending()? {
            pending.push(waiting);
        }
    }
    Ok(pending)
}

/// Waits for every pending future; fails with the first failure.
pub async fn wait_for_data(pending: Vec<PendingResult>) -> Result<Vec<FetchResult>> {
    try_join_all(pending).await
}
