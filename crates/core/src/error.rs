//! Error types for Tether.
//!
//! Two families are kept apart:
//!
//! - [`Error`]: contract violations and lifecycle misuse. These are returned
//!   to the caller that made the mistake and are never recovered.
//! - [`StreamError`]: failures reported by a data stream. These are data; they
//!   end up in render state and never reach a rendering callback as `Err`.

use crate::types::OperationKind;
use std::fmt;

/// Result type alias for Tether operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Tether operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A component was handed a document that is not a read operation.
    #[error("a query component requires a {expected}, but got a {found}")]
    WrongOperation {
        expected: OperationKind,
        found: OperationKind,
    },
    /// The classifier could not determine the operation kind.
    #[error("malformed query document: {message}")]
    MalformedDocument { message: String },
    /// A component was built without a data service.
    #[error("no data service was provided to the query component")]
    MissingService,
    /// A component was built without query options.
    #[error("no query options were provided to the query component")]
    MissingOptions,
    /// An operation needed an active stream but none is established.
    #[error("no active stream is established")]
    NotEstablished,
    /// A second listener was attached to a stream without disposing the first.
    #[error("the active stream already has a listener attached")]
    AlreadySubscribed,
    /// The component has been destroyed.
    #[error("the query component has been disposed")]
    Disposed,
    /// A pending result was dropped before it settled.
    #[error("the pending result was dropped before it settled")]
    Canceled,
    /// A fetch policy name was not recognised.
    #[error("unknown fetch policy: {name}")]
    UnknownFetchPolicy { name: String },
    /// A fetch settled with a stream failure.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl Error {
    /// Creates a wrong-operation error for a document of the given kind.
    pub fn wrong_operation(found: OperationKind) -> Self {
        Error::WrongOperation {
            expected: OperationKind::Query,
            found,
        }
    }

    /// Creates a malformed document error.
    pub fn malformed_document(message: impl Into<String>) -> Self {
        Error::MalformedDocument {
            message: message.into(),
        }
    }

    /// Creates an unknown fetch policy error.
    pub fn unknown_fetch_policy(name: impl Into<String>) -> Self {
        Error::UnknownFetchPolicy { name: name.into() }
    }

    /// Returns true for errors that indicate a programming mistake.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::WrongOperation { .. }
                | Error::MalformedDocument { .. }
                | Error::MissingService
                | Error::MissingOptions
                | Error::AlreadySubscribed
        )
    }
}

/// A single error reported by the server for a query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryError {
    /// Human readable message
    pub message: String,
    /// Path of the field that failed, outermost first
    pub path: Vec<String>,
}

impl QueryError {
    /// Creates a query error without a path.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
        }
    }

    /// Sets the field path of this error.
    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{} (at {})", self.message, self.path.join("."))
        }
    }
}

/// A failure signalled on a stream's error channel.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamError {
    /// The server answered with structured query errors.
    #[error("query failed with {} error(s)", .errors.len())]
    Query { errors: Vec<QueryError> },
    /// The request never produced a structured answer.
    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl StreamError {
    /// Creates a query-level error from the given server errors.
    pub fn query<I>(errors: I) -> Self
    where
        I: IntoIterator<Item = QueryError>,
    {
        StreamError::Query {
            errors: errors.into_iter().collect(),
        }
    }

    /// Creates a transport failure.
    pub fn transport(message: impl Into<String>) -> Self {
        StreamError::Transport {
            message: message.into(),
        }
    }

    /// Returns true if this error carries structured query errors.
    #[inline]
    pub fn is_query_error(&self) -> bool {
        matches!(self, StreamError::Query { .. })
    }

    /// Returns true if this error ends delivery to the observer that receives it.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamError::Transport { .. })
    }

    /// Returns the structured query errors, empty for transport failures.
    pub fn query_errors(&self) -> &[QueryError] {
        match self {
            StreamError::Query { errors } => errors,
            StreamError::Transport { .. } => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::wrong_operation(OperationKind::Mutation);
        assert_eq!(
            err.to_string(),
            "a query component requires a query, but got a mutation"
        );

        let err = Error::malformed_document("empty document");
        assert!(err.to_string().contains("empty document"));
    }

    #[test]
    fn test_contract_violations() {
        assert!(Error::wrong_operation(OperationKind::Subscription).is_contract_violation());
        assert!(Error::MissingService.is_contract_violation());
        assert!(!Error::Disposed.is_contract_violation());
        assert!(!Error::from(StreamError::transport("reset")).is_contract_violation());
    }

    #[test]
    fn test_stream_error_classification() {
        let query = StreamError::query([QueryError::new("not found").with_path(["ship"])]);
        assert!(query.is_query_error());
        assert!(!query.is_terminal());
        assert_eq!(query.query_errors().len(), 1);
        assert_eq!(query.to_string(), "query failed with 1 error(s)");

        let transport = StreamError::transport("connection reset");
        assert!(!transport.is_query_error());
        assert!(transport.is_terminal());
        assert!(transport.query_errors().is_empty());
    }

    #[test]
    fn test_query_error_display() {
        let err = QueryError::new("no such film").with_path(["ship", "films", "0"]);
        assert_eq!(err.to_string(), "no such film (at ship.films.0)");
        assert_eq!(QueryError::new("boom").to_string(), "boom");
    }

    #[test]
    fn test_stream_error_converts() {
        let err: Error = StreamError::transport("timeout").into();
        match err {
            Error::Stream(StreamError::Transport { message }) => assert_eq!(message, "timeout"),
            _ => panic!("Wrong error type"),
        }
    }
}
