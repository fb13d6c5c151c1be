//! Tether Core - Core types shared by the Tether query-binding engine.
//!
//! This crate provides the foundational types used on both sides of the
//! data-service boundary:
//!
//! - `Value`: Result payloads and variable values (JSON-shaped)
//! - `Variables`: Named variable bindings for a query
//! - `QueryDocument`: The identity of a declared query
//! - `OperationClassifier`: Classifies a document as query, mutation or subscription
//! - `FetchPolicy`, `NetworkStatus`: Cache precedence and in-flight activity
//! - `Error`, `StreamError`: Contract violations and stream failures
//!
//! # Example
//!
//! ```rust
//! use tether_core::{KeywordClassifier, OperationClassifier, OperationKind, QueryDocument};
//! use tether_core::{FetchPolicy, Value, Variables};
//!
//! let doc = QueryDocument::new("query ship($id: ID!) { ship(id: $id) { name } }");
//! assert_eq!(KeywordClassifier.classify(&doc).unwrap(), OperationKind::Query);
//! assert_eq!(doc.operation_name(), Some("ship"));
//!
//! let mut vars = Variables::new();
//! vars.insert("id".into(), Value::from("Ship:2"));
//! assert_eq!(vars.get("id").and_then(Value::as_str), Some("Ship:2"));
//!
//! assert_eq!("network-only".parse::<FetchPolicy>().unwrap(), FetchPolicy::NetworkOnly);
//! ```

mod document;
mod error;
mod types;
mod value;

pub use document::{KeywordClassifier, OperationClassifier, QueryDocument};
pub use error::{Error, QueryError, Result, StreamError};
pub use types::{FetchPolicy, NetworkStatus, OperationKind};
pub use value::{Object, Value, Variables};
