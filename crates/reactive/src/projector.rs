//! Result projection.
//!
//! Converts a stream's raw snapshot into the component's [`RenderState`] and
//! the render state into the [`QueryResult`] handed to rendering callbacks.
//!
//! The "empty object means no data yet" rule is applied exactly once, in
//! [`RenderState::from_snapshot`]; everything downstream sees `Option<Value>`.

use crate::service::{
    FetchMoreOptions, PendingResult, QueryStream, ServiceRef, StreamRef, StreamSnapshot,
};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tether_core::{NetworkStatus, StreamError, Value, Variables};

/// The minimal state a component renders from.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderState {
    /// Whether a request is outstanding
    pub loading: bool,
    /// Result payload; `None` until a non-empty result has arrived
    pub data: Option<Value>,
    /// Structured error, if the stream reported one
    pub error: Option<StreamError>,
    /// Kind of activity in flight
    pub network_status: NetworkStatus,
}

impl RenderState {
    /// Maps a snapshot 1:1, dropping an empty-object payload.
    pub fn from_snapshot(snapshot: StreamSnapshot) -> Self {
        let data = if snapshot.data.is_empty_object() {
            None
        } else {
            Some(snapshot.data)
        };
        Self {
            loading: snapshot.loading,
            data,
            error: snapshot.error,
            network_status: snapshot.network_status,
        }
    }
}

/// Reads a stream's current result synchronously.
#[inline]
pub fn snapshot(stream: &dyn QueryStream) -> RenderState {
    RenderState::from_snapshot(stream.current_snapshot())
}

/// Builds the component-facing result, binding fresh controls to `stream`.
pub fn project(service: &ServiceRef, state: &RenderState, stream: &StreamRef) -> QueryResult {
    QueryResult {
        service: service.clone(),
        data: state.data.clone(),
        error: state.error.clone(),
        loading: state.loading,
        network_status: state.network_status,
        controls: StreamControls::bind(stream.clone()),
    }
}

/// Stream operations bound to one stream handle.
#[derive(Clone)]
pub struct StreamControls {
    stream: StreamRef,
}

impl StreamControls {
    /// Binds controls to a stream.
    pub fn bind(stream: StreamRef) -> Self {
        Self { stream }
    }

    /// Returns true if these controls act on the given stream.
    pub fn is_bound_to(&self, stream: &StreamRef) -> bool {
        Rc::ptr_eq(&self.stream, stream)
    }

    /// Re-runs the query, optionally with new variables.
    pub fn refetch(&self, variables: Option<Variables>) -> PendingResult {
        self.stream.refetch(variables)
    }

    /// Fetches another page and merges it into the current result.
    pub fn fetch_more(&self, options: FetchMoreOptions) -> PendingResult {
        self.stream.fetch_more(options)
    }

    /// Replaces the current result locally.
    pub fn update_local_result<F>(&self, update: F)
    where
        F: FnOnce(&Value) -> Value + 'static,
    {
        self.stream.update_local_result(Box::new(update));
    }

    /// Starts polling at the given interval.
    pub fn start_polling(&self, interval: Duration) {
        self.stream.start_polling(interval);
    }

    /// Stops polling.
    pub fn stop_polling(&self) {
        self.stream.stop_polling();
    }
}

/// The result delivered to a rendering callback.
#[derive(Clone)]
pub struct QueryResult {
    /// The data service the component is bound to
    pub service: ServiceRef,
    /// Result payload, `None` until a non-empty result has arrived
    pub data: Option<Value>,
    /// Structured error, if any
    pub error: Option<StreamError>,
    /// Whether a request is outstanding
    pub loading: bool,
    /// Kind of activity in flight
    pub network_status: NetworkStatus,
    /// Operations on the stream this result was projected from
    pub controls: StreamControls,
}

impl QueryResult {
    /// See [`StreamControls::refetch`].
    pub fn refetch(&self, variables: Option<Variables>) -> PendingResult {
        self.controls.refetch(variables)
    }

    /// See [`StreamControls::fetch_more`].
    pub fn fetch_more(&self, options: FetchMoreOptions) -> PendingResult {
        self.controls.fetch_more(options)
    }

    /// See [`StreamControls::update_local_result`].
    pub fn update_local_result<F>(&self, update: F)
    where
        F: FnOnce(&Value) -> Value + 'static,
    {
        self.controls.update_local_result(update);
    }

    /// See [`StreamControls::start_polling`].
    pub fn start_polling(&self, interval: Duration) {
        self.controls.start_polling(interval);
    }

    /// See [`StreamControls::stop_polling`].
    pub fn stop_polling(&self) {
        self.controls.stop_polling();
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("data", &self.data)
            .field("error", &self.error)
            .field("loading", &self.loading)
            .field("network_status", &self.network_status)
            .finish_non_exhaustive()
    }
}
