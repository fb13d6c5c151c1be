//! Parameter change detection.
//!
//! Decides, for each incoming set of options, whether the component's
//! current stream may be kept or must be replaced.

use crate::options::QueryOptions;
use crate::service::ServiceRef;
use std::rc::Rc;

/// Returns true if the current stream must be replaced.
///
/// A stream is kept only when every option field is unchanged and both
/// service references point at the same instance. A different service always
/// forces replacement, because a stream is only meaningful relative to the
/// service that opened it.
pub fn should_replace(
    prev: &QueryOptions,
    next: &QueryOptions,
    prev_service: &ServiceRef,
    next_service: &ServiceRef,
) -> bool {
    !same_service(prev_service, next_service) || prev != next
}

/// Returns true if both references point at the same service instance.
#[inline]
pub fn same_service(a: &ServiceRef, b: &ServiceRef) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{DataService, StreamRef};
    use proptest::prelude::*;
    use std::time::Duration;
    use tether_core::{Error, FetchPolicy, Result};

    struct NullService;

    impl DataService for NullService {
        fn open_stream(&self, _options: &QueryOptions) -> Result<StreamRef> {
            Err(Error::NotEstablished)
        }
    }

    fn service() -> ServiceRef {
        Rc::new(NullService)
    }

    fn base() -> QueryOptions {
        QueryOptions::new("query ships { allShips { name } }").variable("first", 2)
    }

    #[test]
    fn test_identical_options_same_service_kept() {
        let svc = service();
        assert!(!should_replace(&base(), &base(), &svc, &svc.clone()));
    }

    #[test]
    fn test_service_change_alone_replaces() {
        let a = service();
        let b = service();
        assert!(should_replace(&base(), &base(), &a, &b));
    }

    #[test]
    fn test_each_field_change_replaces() {
        let svc = service();
        let variants = [
            base().variables(Default::default()),
            QueryOptions::new("query planets { allPlanets { name } }").variable("first", 2),
            base().variable("first", 3),
            base().fetch_policy(FetchPolicy::NoCache),
            base().poll_interval(Duration::from_secs(1)),
            base().notify_on_network_status_change(true),
            base().ssr(false),
        ];
        for next in variants {
            assert!(should_replace(&base(), &next, &svc, &svc), "{:?}", next);
        }
    }

    fn policy_strategy() -> impl Strategy<Value = FetchPolicy> {
        prop_oneof![
            Just(FetchPolicy::CacheFirst),
            Just(FetchPolicy::CacheAndNetwork),
            Just(FetchPolicy::NetworkOnly),
            Just(FetchPolicy::CacheOnly),
            Just(FetchPolicy::NoCache),
            Just(FetchPolicy::Standby),
        ]
    }

    fn options_strategy() -> impl Strategy<Value = QueryOptions> {
        (
            0..3usize,
            prop::option::of(0i64..4),
            policy_strategy(),
            prop::option::of(1u64..3),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(doc, var, policy, poll, notify, ssr)| {
                let mut options = QueryOptions::new(["{ a }", "{ b }", "{ c }"][doc])
                    .fetch_policy(policy)
                    .notify_on_network_status_change(notify)
                    .ssr(ssr);
                if let Some(v) = var {
                    options = options.variable("v", v);
                }
                if let Some(secs) = poll {
                    options = options.poll_interval(Duration::from_secs(secs));
                }
                options
            })
    }

    proptest! {
        /// Property: a stream is kept exactly when options are equal and the service is shared.
        #[test]
        fn replace_iff_options_or_service_differ(
            prev in options_strategy(),
            next in options_strategy(),
            shared in any::<bool>(),
        ) {
            let a = service();
            let b = if shared { a.clone() } else { service() };
            let expected = !shared || prev != next;
            prop_assert_eq!(should_replace(&prev, &next, &a, &b), expected);
            prop_assert_eq!(prev.changed_fields(&next).is_empty(), prev == next);
        }
    }
}
