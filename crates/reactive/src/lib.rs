//! Tether Reactive - binds query components to long-lived data streams.
//!
//! A [`QueryComponent`] derives a stream from its declared [`QueryOptions`],
//! receives the stream's pushes, reconciles them into a [`RenderState`], and
//! tears down and re-establishes the stream when its options or data service
//! change. It guarantees that:
//!
//! - a component has at most one observer attached at any time,
//! - a push from a replaced stream never overwrites newer render state,
//! - a transport fault is recovered from instead of ending the data flow.
//!
//! # Core Concepts
//!
//! - `DataService` / `QueryStream`: the contract a data layer implements
//! - `SubscriptionManager`: owns the active stream and its generation
//! - `projector`: snapshot -> `RenderState` -> `QueryResult`
//! - `should_replace`: decides whether new options need a new stream
//! - `probe` / `prerender`: data readiness for server-side prerendering
//! - `memory::MemoryService`: a resolver-backed data service
//!
//! # Example
//!
//! ```rust
//! use tether_core::Value;
//! use tether_reactive::memory::MemoryService;
//! use tether_reactive::{QueryComponent, QueryOptions, ServiceRef};
//!
//! let service = MemoryService::new(|request| {
//!     let id = request.variables.get("id").and_then(Value::as_i64).unwrap_or(0);
//!     Ok(Value::from(format!("Film:{}", id)))
//! });
//! let service_ref: ServiceRef = service.clone();
//!
//! let component = QueryComponent::builder()
//!     .service(service_ref.clone())
//!     .options(
//!         QueryOptions::new("query film($id: ID!) { film(id: $id) { title } }")
//!             .variable("id", 1),
//!     )
//!     .build()
//!     .unwrap();
//! component.mount().unwrap();
//! service.flush();
//! assert_eq!(component.render().unwrap().data, Some(Value::from("Film:1")));
//!
//! // New variables replace the stream.
//! let next = component.options().variable("id", 2);
//! assert!(component.on_params_changed(next, service_ref).unwrap());
//! assert!(component.render().unwrap().loading);
//! service.flush();
//! assert_eq!(component.render().unwrap().data, Some(Value::from("Film:2")));
//! ```

pub mod change;
pub mod component;
pub mod manager;
pub mod memory;
pub mod observer;
pub mod options;
pub mod prerender;
pub mod probe;
pub mod projector;
pub mod service;

pub use change::{same_service, should_replace};
pub use component::{Phase, QueryComponent, QueryComponentBuilder, RenderCallback};
pub use manager::{Generation, StreamListener, SubscriptionManager};
pub use observer::{Observer, ObserverRegistry};
pub use options::QueryOptions;
pub use prerender::{collect_pending, wait_for_data, DataProbe};
pub use projector::{QueryResult, RenderState, StreamControls};
pub use service::{
    DataService, FetchMoreOptions, FetchResult, LastResults, ObserverId, PendingResult,
    QueryStream, ServiceRef, StreamRef, StreamSnapshot,
};

// Re-export commonly used types from tether-core
pub use tether_core::{Error, FetchPolicy, NetworkStatus, Result, StreamError, Value, Variables};
