//! Declared parameters of a query component.

use std::time::Duration;
use tether_core::{FetchPolicy, QueryDocument, Value, Variables};

/// The parameters a component declares for its subscription.
///
/// Two option sets describe the same subscription when every field compares
/// equal; any difference yields a new generation of the stream.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tether_core::FetchPolicy;
/// use tether_reactive::QueryOptions;
///
/// let options = QueryOptions::new("query ship($id: ID!) { ship(id: $id) { name } }")
///     .variable("id", "Ship:2")
///     .fetch_policy(FetchPolicy::CacheAndNetwork)
///     .poll_interval(Duration::from_secs(30));
///
/// assert!(options.ssr);
/// assert_eq!(options.for_prerender().fetch_policy, FetchPolicy::CacheFirst);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct QueryOptions {
    /// Query identity
    pub query: QueryDocument,
    /// Variable bindings
    pub variables: Variables,
    /// Cache-vs-network precedence
    pub fetch_policy: FetchPolicy,
    /// Polling interval, if the stream should poll
    pub poll_interval: Option<Duration>,
    /// Whether in-flight status changes are pushed to observers
    pub notify_on_network_status_change: bool,
    /// Whether the component takes part in prerendering
    pub ssr: bool,
}

impl QueryOptions {
    /// Creates options for the given document with default settings.
    pub fn new(query: impl Into<QueryDocument>) -> Self {
        Self {
            query: query.into(),
            variables: Variables::new(),
            fetch_policy: FetchPolicy::default(),
            poll_interval: None,
            notify_on_network_status_change: false,
            ssr: true,
        }
    }

    /// Replaces all variable bindings.
    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Binds one variable.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Sets the fetch policy.
    pub fn fetch_policy(mut self, fetch_policy: FetchPolicy) -> Self {
        self.fetch_policy = fetch_policy;
        self
    }

    /// Sets the polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets whether in-flight status changes are pushed to observers.
    pub fn notify_on_network_status_change(mut self, notify: bool) -> Self {
        self.notify_on_network_status_change = notify;
        self
    }

    /// Sets whether the component takes part in prerendering.
    pub fn ssr(mut self, ssr: bool) -> Self {
        self.ssr = ssr;
        self
    }

    /// Returns a copy suitable for a prerender probe: forced network fetch
    /// policies are downgraded to cache-first.
    pub fn for_prerender(&self) -> Self {
        Self {
            fetch_policy: self.fetch_policy.for_prerender(),
            ..self.clone()
        }
    }

    /// Returns the names of the fields that differ between two option sets.
    pub fn changed_fields(&self, other: &QueryOptions) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.query != other.query {
            changed.push("query");
        }
        if self.variables != other.variables {
            changed.push("variables");
        }
        if self.fetch_policy != other.fetch_policy {
            changed.push("fetch_policy");
        }
        if self.poll_interval != other.poll_interval {
            changed.push("poll_interval");
        }
        if self.notify_on_network_status_change != other.notify_on_network_status_change {
            changed.push("notify_on_network_status_change");
        }
        if self.ssr != other.ssr {
            changed.push("ssr");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILM: &str = "query data($id: ID!) { film(id: $id) { title } }";

    #[test]
    fn test_defaults() {
        let options = QueryOptions::new(FILM);
        assert!(options.variables.is_empty());
        assert_eq!(options.fetch_policy, FetchPolicy::CacheFirst);
        assert_eq!(options.poll_interval, None);
        assert!(!options.notify_on_network_status_change);
        assert!(options.ssr);
    }

    #[test]
    fn test_builder() {
        let options = QueryOptions::new(FILM)
            .variable("id", 4)
            .fetch_policy(FetchPolicy::NetworkOnly)
            .poll_interval(Duration::from_millis(500))
            .notify_on_network_status_change(true)
            .ssr(false);

        assert_eq!(options.variables.get("id").and_then(Value::as_i64), Some(4));
        assert_eq!(options.fetch_policy, FetchPolicy::NetworkOnly);
        assert_eq!(options.poll_interval, Some(Duration::from_millis(500)));
        assert!(options.notify_on_network_status_change);
        assert!(!options.ssr);
    }

    #[test]
    fn test_for_prerender_keeps_other_fields() {
        let options = QueryOptions::new(FILM)
            .variable("id", 4)
            .fetch_policy(FetchPolicy::CacheAndNetwork);
        let probe = options.for_prerender();

        assert_eq!(probe.fetch_policy, FetchPolicy::CacheFirst);
        assert_eq!(probe.variables, options.variables);
        assert_eq!(probe.query, options.query);
    }

    #[test]
    fn test_changed_fields() {
        let a = QueryOptions::new(FILM).variable("id", 4);
        assert!(a.changed_fields(&a.clone()).is_empty());

        let b = a.clone().variable("id", 5).ssr(false);
        assert_eq!(a.changed_fields(&b), vec!["variables", "ssr"]);
    }
}
