//! The data-service contract.
//!
//! A [`DataService`] opens one [`QueryStream`] per parameterized read
//! operation. Streams push new results to their observers, answer
//! synchronously with their current snapshot, and expose the request
//! operations (refetch, pagination, polling) that a rendering callback may
//! invoke.
//!
//! Everything here is single-threaded: handles are shared through `Rc` and
//! every suspension is either an observer callback or a [`PendingResult`]
//! future driven by the caller.

use crate::observer::Observer;
use crate::options::QueryOptions;
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Duration;
use tether_core::{NetworkStatus, QueryDocument, Result, StreamError, Value, Variables};

/// Unique identifier for an observer attached to a stream.
pub type ObserverId = u64;

/// Shared reference to a data service.
pub type ServiceRef = Rc<dyn DataService>;

/// Shared handle to an open stream.
pub type StreamRef = Rc<dyn QueryStream>;

/// A future that settles once the data service has answered a request.
pub type PendingResult = LocalBoxFuture<'static, Result<FetchResult>>;

/// A function producing a new local result from the current one.
pub type LocalUpdate = Box<dyn FnOnce(&Value) -> Value>;

/// A function merging a page of results into the previous result.
pub type MergeFn = Box<dyn FnOnce(&Value, &Value) -> Value>;

/// A source of query streams.
pub trait DataService {
    /// Opens a stream for the given options.
    fn open_stream(&self, options: &QueryOptions) -> Result<StreamRef>;
}

/// One active parameterized read operation.
///
/// All methods take `&self`; implementations use interior mutability and
/// must not hold a borrow while invoking observer callbacks, since observers
/// may call back into the stream (unsubscribe, re-subscribe) synchronously.
pub trait QueryStream {
    /// Returns the options the stream was opened with, including variables
    /// changed by a refetch.
    fn options(&self) -> QueryOptions;

    /// Returns the current result without suspending.
    fn current_snapshot(&self) -> StreamSnapshot;

    /// Attaches an observer and returns its identifier.
    ///
    /// If the stream holds an unreported last error, the new observer is
    /// signalled with it immediately.
    fn subscribe(&self, observer: Observer) -> ObserverId;

    /// Detaches an observer. Returns true if it was attached.
    fn unsubscribe(&self, id: ObserverId) -> bool;

    /// Returns the number of attached observers.
    fn observer_count(&self) -> usize;

    /// Re-runs the query, optionally with new variables.
    fn refetch(&self, variables: Option<Variables>) -> PendingResult;

    /// Fetches another page and merges it into the current result.
    fn fetch_more(&self, options: FetchMoreOptions) -> PendingResult;

    /// Replaces the current result locally and notifies observers.
    fn update_local_result(&self, update: LocalUpdate);

    /// Starts polling at the given interval.
    fn start_polling(&self, interval: Duration);

    /// Stops polling.
    fn stop_polling(&self);

    /// Returns the last error reported on the stream.
    fn last_error(&self) -> Option<StreamError>;

    /// Returns the last successful result reported on the stream.
    fn last_result(&self) -> Option<StreamSnapshot>;

    /// Forgets the last error and last result.
    fn reset_last_results(&self);

    /// Reinstates previously captured last error and last result.
    fn restore_last_results(&self, last: LastResults);

    /// Returns a future that settles with the next settled result, or
    /// immediately if nothing is in flight.
    fn result(&self) -> PendingResult;
}

/// A synchronous view of a stream's current result.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamSnapshot {
    /// Whether a request is outstanding
    pub loading: bool,
    /// Result payload, an empty object when nothing has arrived yet
    pub data: Value,
    /// Last error reported on the stream
    pub error: Option<StreamError>,
    /// Kind of activity in flight
    pub network_status: NetworkStatus,
}

impl StreamSnapshot {
    /// Creates a snapshot for a stream whose first fetch is in flight.
    pub fn loading() -> Self {
        Self {
            loading: true,
            data: Value::empty_object(),
            error: None,
            network_status: NetworkStatus::Loading,
        }
    }

    /// Creates a settled snapshot carrying the given data.
    pub fn ready(data: Value) -> Self {
        Self {
            loading: false,
            data,
            error: None,
            network_status: NetworkStatus::Ready,
        }
    }
}

/// The value a [`PendingResult`] settles with.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchResult {
    /// Result payload
    pub data: Value,
    /// Whether a request is still outstanding
    pub loading: bool,
    /// Kind of activity in flight
    pub network_status: NetworkStatus,
}

impl From<&StreamSnapshot> for FetchResult {
    fn from(snapshot: &StreamSnapshot) -> Self {
        Self {
            data: snapshot.data.clone(),
            loading: snapshot.loading,
            network_status: snapshot.network_status,
        }
    }
}

/// Last error and last result of a stream, captured by value.
///
/// Error recovery takes these out of a stream before re-subscribing and puts
/// them back afterwards, so the new observer is not signalled with the error
/// that ended the previous one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LastResults {
    /// Last error reported on the stream
    pub error: Option<StreamError>,
    /// Last successful result
    pub result: Option<StreamSnapshot>,
}

impl LastResults {
    /// Captures the last results of a stream.
    pub fn capture(stream: &dyn QueryStream) -> Self {
        Self {
            error: stream.last_error(),
            result: stream.last_result(),
        }
    }
}

/// A pagination request.
pub struct FetchMoreOptions {
    /// Document to run instead of the stream's own, if any
    pub query: Option<QueryDocument>,
    /// Variables overlaid onto the stream's variables for this request
    pub variables: Variables,
    /// Merges the fetched page into the previous result
    pub update_query: MergeFn,
}

impl FetchMoreOptions {
    /// Creates a pagination request with the given variables and merge function.
    pub fn new<F>(variables: Variables, update_query: F) -> Self
    where
        F: FnOnce(&Value, &Value) -> Value + 'static,
    {
        Self {
            query: None,
            variables,
            update_query: Box::new(update_query),
        }
    }

    /// Runs the request with a different document.
    pub fn with_query(mut self, query: impl Into<QueryDocument>) -> Self {
        self.query = Some(query.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryService;
    use tether_core::Object;

    #[test]
    fn test_snapshot_constructors() {
        let loading = StreamSnapshot::loading();
        assert!(loading.loading);
        assert!(loading.data.is_empty_object());
        assert_eq!(loading.network_status, NetworkStatus::Loading);

        let ready = StreamSnapshot::ready(Value::from("done"));
        assert!(!ready.loading);
        assert_eq!(ready.network_status, NetworkStatus::Ready);
    }

    #[test]
    fn test_fetch_result_from_snapshot() {
        let snapshot = StreamSnapshot::ready(Value::from(7));
        let result = FetchResult::from(&snapshot);
        assert_eq!(result.data, Value::from(7));
        assert!(!result.loading);
    }

    #[test]
    fn test_last_results_capture() {
        let service = MemoryService::new(|_| Ok(Value::Null));
        let _opened = service
            .open_stream(&QueryOptions::new("{ ships { id } }"))
            .unwrap();
        let stream = service.last_opened().unwrap();
        stream.push_result(Value::from(7));
        stream.push_error(StreamError::transport("reset"));

        let last = LastResults::capture(&*stream);
        assert_eq!(last.error, Some(StreamError::transport("reset")));
        assert_eq!(last.result.map(|snapshot| snapshot.data), Some(Value::from(7)));

        stream.reset_last_results();
        assert_eq!(LastResults::capture(&*stream), LastResults::default());
    }

    #[test]
    fn test_fetch_more_options() {
        let vars: Object = [("cursor", 10)].into_iter().collect();
        let options = FetchMoreOptions::new(vars, |prev, _| prev.clone()).with_query("{ more }");
        assert_eq!(options.query, Some(QueryDocument::new("{ more }")));
        assert_eq!(options.variables.get("cursor").and_then(Value::as_i64), Some(10));

        let merged = (options.update_query)(&Value::from(1), &Value::from(2));
        assert_eq!(merged, Value::from(1));
    }
}
