//! In-memory data service.
//!
//! `MemoryService` answers queries from a resolver function and keeps a
//! result cache keyed by document and variables. It has no transport; every
//! request is queued and runs when the owner calls [`MemoryService::flush`],
//! which plays the part of the network completing. That makes every
//! interleaving of pushes, parameter changes and unmounts reproducible in
//! tests and benches.
//!
//! Error semantics follow observable conventions:
//!
//! - a transport failure terminates every observer attached at that moment;
//! - a query-level failure is reported to observers, which stay attached;
//! - a new observer on a stream that still holds a last error is signalled
//!   with it immediately.
//!
//! # Example
//!
//! ```rust
//! use tether_core::Value;
//! use tether_reactive::memory::MemoryService;
//! use tether_reactive::{DataService, QueryOptions};
//!
//! let service = MemoryService::new(|request| {
//!     Ok(Value::from(request.query.operation_name().unwrap_or("anonymous")))
//! });
//!
//! let stream = service.open_stream(&QueryOptions::new("query planets { allPlanets }")).unwrap();
//! assert!(stream.current_snapshot().loading);
//!
//! assert_eq!(service.flush(), 1);
//! assert_eq!(stream.current_snapshot().data, Value::from("planets"));
//! ```

use crate::observer::{Observer, ObserverRegistry};
use crate::options::QueryOptions;
use crate::service::{
    DataService, FetchMoreOptions, FetchResult, LastResults, LocalUpdate, MergeFn, ObserverId,
    PendingResult, QueryStream, StreamRef, StreamSnapshot,
};
use futures::channel::oneshot;
use futures::future::{self, FutureExt};
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tether_core::{
    Error, FetchPolicy, NetworkStatus, QueryDocument, Result, StreamError, Value, Variables,
};
use tracing::{debug, trace};

/// The request handed to a resolver.
#[derive(Debug)]
pub struct QueryRequest<'a> {
    /// Document to answer
    pub query: &'a QueryDocument,
    /// Variables bound for this request
    pub variables: &'a Variables,
    /// Fetch policy of the stream that issued the request
    pub fetch_policy: FetchPolicy,
}

/// The outcome of resolving a request.
pub type ResolveResult = std::result::Result<Value, StreamError>;

type Resolver = dyn Fn(&QueryRequest<'_>) -> ResolveResult;
type Responder = oneshot::Sender<Result<FetchResult>>;

enum FetchKind {
    Initial,
    Refetch,
    Poll,
    FetchMore {
        query: Option<QueryDocument>,
        variables: Variables,
        merge: MergeFn,
    },
}

struct Task {
    stream: Rc<MemoryStream>,
    kind: FetchKind,
    responder: Option<Responder>,
}

/// State shared between the service and its streams.
struct Backend {
    resolver: Box<Resolver>,
    cache: RefCell<HashMap<String, Value>>,
    queue: RefCell<VecDeque<Task>>,
    fetches: Cell<usize>,
}

impl Backend {
    fn cache_key(query: &QueryDocument, variables: &Variables) -> String {
        format!("{}|{}", query.source(), variables)
    }

    fn read(&self, query: &QueryDocument, variables: &Variables) -> Option<Value> {
        self.cache
            .borrow()
            .get(&Self::cache_key(query, variables))
            .cloned()
    }

    fn write(&self, query: &QueryDocument, variables: &Variables, data: Value) {
        self.cache
            .borrow_mut()
            .insert(Self::cache_key(query, variables), data);
    }

    fn run(&self, task: Task) {
        let Task {
            stream,
            kind,
            responder,
        } = task;

        let (query, mut variables, fetch_policy) = {
            let state = stream.state.borrow();
            (
                state.options.query.clone(),
                state.options.variables.clone(),
                state.options.fetch_policy,
            )
        };
        let query = match &kind {
            FetchKind::FetchMore {
                query: more_query,
                variables: more_variables,
                ..
            } => {
                variables.merge(more_variables);
                more_query.clone().unwrap_or(query)
            }
            _ => query,
        };

        self.fetches.set(self.fetches.get() + 1);
        trace!(
            operation = query.operation_name().unwrap_or("anonymous"),
            %variables,
            "resolving request"
        );
        let outcome = (self.resolver)(&QueryRequest {
            query: &query,
            variables: &variables,
            fetch_policy,
        });
        stream.settle(kind, outcome, responder);
    }
}

/// A resolver-backed data service with a manual task queue.
pub struct MemoryService {
    backend: Rc<Backend>,
    /// Streams opened so far; stale entries are cleaned up lazily
    streams: RefCell<Vec<Weak<MemoryStream>>>,
    opened: Cell<usize>,
}

impl MemoryService {
    /// Creates a service answering every request with `resolver`.
    pub fn new<F>(resolver: F) -> Rc<Self>
    where
        F: Fn(&QueryRequest<'_>) -> ResolveResult + 'static,
    {
        Rc::new(Self {
            backend: Rc::new(Backend {
                resolver: Box::new(resolver),
                cache: RefCell::new(HashMap::new()),
                queue: RefCell::new(VecDeque::new()),
                fetches: Cell::new(0),
            }),
            streams: RefCell::new(Vec::new()),
            opened: Cell::new(0),
        })
    }

    /// Runs queued requests until the queue is empty.
    ///
    /// Requests queued by observers while flushing run in the same call.
    /// Returns the number of requests that ran.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.backend.queue.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    self.backend.run(task);
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    /// Returns the number of queued requests.
    pub fn pending_requests(&self) -> usize {
        self.backend.queue.borrow().len()
    }

    /// Queues a poll request for every polling stream that is idle.
    ///
    /// Returns the number of requests queued.
    pub fn tick_polling(&self) -> usize {
        self.live_streams()
            .iter()
            .filter(|stream| stream.begin_poll())
            .count()
    }

    /// Returns the number of streams opened since creation.
    pub fn streams_opened(&self) -> usize {
        self.opened.get()
    }

    /// Returns the number of requests the resolver has answered.
    pub fn fetch_count(&self) -> usize {
        self.backend.fetches.get()
    }

    /// Returns the streams that are still alive, oldest first.
    pub fn live_streams(&self) -> Vec<Rc<MemoryStream>> {
        self.cleanup();
        self.streams
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Returns the most recently opened stream, if it is still alive.
    pub fn last_opened(&self) -> Option<Rc<MemoryStream>> {
        self.streams.borrow().last().and_then(Weak::upgrade)
    }

    /// Returns the number of observers attached across all live streams.
    pub fn active_observers(&self) -> usize {
        self.live_streams()
            .iter()
            .map(|stream| stream.observer_count())
            .sum()
    }

    /// Reads a cached result.
    pub fn read_cache(&self, query: &QueryDocument, variables: &Variables) -> Option<Value> {
        self.backend.read(query, variables)
    }

    /// Seeds the cache with a result.
    pub fn write_cache(&self, query: &QueryDocument, variables: &Variables, data: Value) {
        self.backend.write(query, variables, data);
    }

    /// Cleans up references to dropped streams.
    pub fn cleanup(&self) {
        self.streams.borrow_mut().retain(|w| w.strong_count() > 0);
    }
}

impl DataService for MemoryService {
    fn open_stream(&self, options: &QueryOptions) -> Result<StreamRef> {
        let cached = self.backend.read(&options.query, &options.variables);
        let (data, fetch) = match options.fetch_policy {
            FetchPolicy::CacheFirst => match cached {
                Some(data) => (data, false),
                None => (Value::empty_object(), true),
            },
            FetchPolicy::CacheAndNetwork => (cached.unwrap_or_else(Value::empty_object), true),
            FetchPolicy::NetworkOnly | FetchPolicy::NoCache => (Value::empty_object(), true),
            FetchPolicy::CacheOnly => (cached.unwrap_or_else(Value::empty_object), false),
            FetchPolicy::Standby => (Value::empty_object(), false),
        };

        let stream = MemoryStream::new(self.backend.clone(), options.clone(), data, fetch);
        if fetch {
            stream.enqueue(FetchKind::Initial, None);
        }

        self.streams.borrow_mut().push(Rc::downgrade(&stream));
        self.opened.set(self.opened.get() + 1);
        debug!(
            operation = options.query.operation_name().unwrap_or("anonymous"),
            fetch_policy = %options.fetch_policy,
            fetch,
            "opened stream"
        );
        Ok(stream)
    }
}

struct StreamState {
    options: QueryOptions,
    data: Value,
    loading: bool,
    network_status: NetworkStatus,
    last_error: Option<StreamError>,
    last_result: Option<StreamSnapshot>,
    polling: Option<Duration>,
    in_flight: usize,
}

impl StreamState {
    fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            loading: self.loading,
            data: self.data.clone(),
            error: self.last_error.clone(),
            network_status: self.network_status,
        }
    }
}

/// A stream opened by [`MemoryService`].
pub struct MemoryStream {
    backend: Rc<Backend>,
    self_ref: Weak<MemoryStream>,
    state: RefCell<StreamState>,
    observers: RefCell<ObserverRegistry>,
    waiters: RefCell<Vec<Responder>>,
}

impl MemoryStream {
    fn new(backend: Rc<Backend>, options: QueryOptions, data: Value, fetch: bool) -> Rc<Self> {
        let polling = options.poll_interval;
        Rc::new_cyclic(|self_ref| Self {
            backend,
            self_ref: self_ref.clone(),
            state: RefCell::new(StreamState {
                options,
                data,
                loading: fetch,
                network_status: if fetch {
                    NetworkStatus::Loading
                } else {
                    NetworkStatus::Ready
                },
                last_error: None,
                last_result: None,
                polling,
                in_flight: 0,
            }),
            observers: RefCell::new(ObserverRegistry::new()),
            waiters: RefCell::new(Vec::new()),
        })
    }

    /// Pushes a result from the server side, as a subscription or cache
    /// broadcast would.
    pub fn push_result(&self, data: Value) {
        let snapshot = self.complete(data);
        self.resolve(None, Ok(FetchResult::from(&snapshot)));
        self.notify_next(&snapshot);
    }

    /// Pushes an error from the server side.
    pub fn push_error(&self, error: StreamError) {
        self.fail(&error);
        self.resolve(None, Err(error.clone().into()));
        self.notify_error(&error);
    }

    /// Returns the polling interval, if the stream is polling.
    pub fn polling_interval(&self) -> Option<Duration> {
        self.state.borrow().polling
    }

    /// Returns the number of requests in flight.
    pub fn in_flight(&self) -> usize {
        self.state.borrow().in_flight
    }

    fn enqueue(&self, kind: FetchKind, responder: Option<Responder>) {
        // Unreachable while `&self` is borrowed from an `Rc`; dropping the
        // responder settles its future as canceled.
        let Some(stream) = self.self_ref.upgrade() else {
            return;
        };
        self.state.borrow_mut().in_flight += 1;
        self.backend.queue.borrow_mut().push_back(Task {
            stream,
            kind,
            responder,
        });
    }

    fn request(&self, status: NetworkStatus, kind: FetchKind) -> PendingResult {
        let notify = {
            let mut state = self.state.borrow_mut();
            state.loading = true;
            state.network_status = status;
            state.options.notify_on_network_status_change
        };
        let (tx, rx) = oneshot::channel();
        self.enqueue(kind, Some(tx));
        if notify {
            let snapshot = self.state.borrow().snapshot();
            self.notify_next(&snapshot);
        }
        async move { rx.await.unwrap_or(Err(Error::Canceled)) }.boxed_local()
    }

    fn begin_poll(&self) -> bool {
        {
            let state = self.state.borrow();
            if state.polling.is_none() || state.in_flight > 0 {
                return false;
            }
        }
        // The poll's future is not observed; results arrive through observers.
        drop(self.request(NetworkStatus::Poll, FetchKind::Poll));
        true
    }

    fn settle(&self, kind: FetchKind, outcome: ResolveResult, responder: Option<Responder>) {
        {
            let mut state = self.state.borrow_mut();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        match outcome {
            Ok(fetched) => {
                let data = match kind {
                    FetchKind::FetchMore { merge, .. } => {
                        let previous = self.state.borrow().data.clone();
                        merge(&previous, &fetched)
                    }
                    FetchKind::Initial | FetchKind::Refetch | FetchKind::Poll => fetched,
                };
                let snapshot = self.complete(data);
                self.resolve(responder, Ok(FetchResult::from(&snapshot)));
                self.notify_next(&snapshot);
            }
            Err(error) => {
                self.fail(&error);
                self.resolve(responder, Err(error.clone().into()));
                self.notify_error(&error);
            }
        }
    }

    /// Records a successful result and returns the new snapshot.
    fn complete(&self, data: Value) -> StreamSnapshot {
        let (snapshot, cache_entry) = {
            let mut state = self.state.borrow_mut();
            state.data = data;
            state.loading = state.in_flight > 0;
            if !state.loading {
                state.network_status = NetworkStatus::Ready;
            }
            state.last_error = None;
            let snapshot = state.snapshot();
            state.last_result = Some(snapshot.clone());
            let cache_entry = state.options.fetch_policy.writes_cache().then(|| {
                (state.options.query.clone(), state.options.variables.clone())
            });
            (snapshot, cache_entry)
        };
        if let Some((query, variables)) = cache_entry {
            self.backend.write(&query, &variables, snapshot.data.clone());
        }
        snapshot
    }

    fn fail(&self, error: &StreamError) {
        let mut state = self.state.borrow_mut();
        state.loading = state.in_flight > 0;
        state.network_status = NetworkStatus::Error;
        state.last_error = Some(error.clone());
    }

    fn resolve(&self, responder: Option<Responder>, outcome: Result<FetchResult>) {
        let waiters: Vec<_> = self.waiters.borrow_mut().drain(..).collect();
        for waiter in responder.into_iter().chain(waiters) {
            // A dropped receiver means nobody is waiting any more.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn notify_next(&self, snapshot: &StreamSnapshot) {
        let observers = self.observers.borrow().snapshot();
        for (id, observer) in observers {
            // An earlier callback may have detached this observer.
            if self.observers.borrow().contains(id) {
                observer.on_next(snapshot);
            }
        }
    }

    fn notify_error(&self, error: &StreamError) {
        if error.is_terminal() {
            let observers = self.observers.borrow_mut().drain();
            for (_, observer) in observers {
                observer.on_error(error);
            }
        } else {
            let observers = self.observers.borrow().snapshot();
            for (id, observer) in observers {
                if self.observers.borrow().contains(id) {
                    observer.on_error(error);
                }
            }
        }
    }
}

impl QueryStream for MemoryStream {
    fn options(&self) -> QueryOptions {
        self.state.borrow().options.clone()
    }

    fn current_snapshot(&self) -> StreamSnapshot {
        self.state.borrow().snapshot()
    }

    fn subscribe(&self, observer: Observer) -> ObserverId {
        let pending = self.state.borrow().last_error.clone();
        match pending {
            Some(error) if error.is_terminal() => {
                let id = self.observers.borrow_mut().reserve_id();
                observer.on_error(&error);
                id
            }
            Some(error) => {
                let id = self.observers.borrow_mut().subscribe(observer.clone());
                observer.on_error(&error);
                id
            }
            None => self.observers.borrow_mut().subscribe(observer),
        }
    }

    fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.borrow_mut().unsubscribe(id)
    }

    fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn refetch(&self, variables: Option<Variables>) -> PendingResult {
        if let Some(variables) = variables {
            self.state.borrow_mut().options.variables = variables;
        }
        self.request(NetworkStatus::Refetch, FetchKind::Refetch)
    }

    fn fetch_more(&self, options: FetchMoreOptions) -> PendingResult {
        let FetchMoreOptions {
            query,
            variables,
            update_query,
        } = options;
        self.request(
            NetworkStatus::FetchMore,
            FetchKind::FetchMore {
                query,
                variables,
                merge: update_query,
            },
        )
    }

    fn update_local_result(&self, update: LocalUpdate) {
        let previous = self.state.borrow().data.clone();
        let data = update(&previous);
        let snapshot = {
            let mut state = self.state.borrow_mut();
            state.data = data;
            let snapshot = state.snapshot();
            if state.last_error.is_none() {
                state.last_result = Some(snapshot.clone());
            }
            snapshot
        };
        let options = self.options();
        if options.fetch_policy.writes_cache() {
            self.backend
                .write(&options.query, &options.variables, snapshot.data.clone());
        }
        self.notify_next(&snapshot);
    }

    fn start_polling(&self, interval: Duration) {
        self.state.borrow_mut().polling = Some(interval);
    }

    fn stop_polling(&self) {
        self.state.borrow_mut().polling = None;
    }

    fn last_error(&self) -> Option<StreamError> {
        self.state.borrow().last_error.clone()
    }

    fn last_result(&self) -> Option<StreamSnapshot> {
        self.state.borrow().last_result.clone()
    }

    fn reset_last_results(&self) {
        let mut state = self.state.borrow_mut();
        state.last_error = None;
        state.last_result = None;
    }

    fn restore_last_results(&self, last: LastResults) {
        let mut state = self.state.borrow_mut();
        state.last_error = last.error;
        state.last_result = last.result;
    }

    fn result(&self) -> PendingResult {
        let state = self.state.borrow();
        if !state.loading {
            let settled = match &state.last_error {
                Some(error) => Err(error.clone().into()),
                None => Ok(FetchResult::from(&state.snapshot())),
            };
            return future::ready(settled).boxed_local();
        }
        drop(state);

        let (tx, rx) = oneshot::channel();
        self.waiters.borrow_mut().push(tx);
        async move { rx.await.unwrap_or(Err(Error::Canceled)) }.boxed_local()
    }
}
