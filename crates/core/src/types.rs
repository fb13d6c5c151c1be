//! Enumerations describing operations, cache precedence and in-flight activity.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// The kind of operation a query document declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum OperationKind {
    /// Side-effect-free read operation
    Query,
    /// Write operation
    Mutation,
    /// Server push stream
    Subscription,
}

impl OperationKind {
    /// Returns the keyword that introduces this operation in a document.
    pub fn keyword(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Strategy governing cache-vs-network precedence for a read operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FetchPolicy {
    /// Answer from the cache, go to the network only on a miss
    #[default]
    CacheFirst,
    /// Answer from the cache and refresh from the network
    CacheAndNetwork,
    /// Always go to the network, write the result to the cache
    NetworkOnly,
    /// Never go to the network
    CacheOnly,
    /// Always go to the network, never touch the cache
    NoCache,
    /// Keep the stream open without fetching
    Standby,
}

impl FetchPolicy {
    /// Returns the kebab-case name of this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchPolicy::CacheFirst => "cache-first",
            FetchPolicy::CacheAndNetwork => "cache-and-network",
            FetchPolicy::NetworkOnly => "network-only",
            FetchPolicy::CacheOnly => "cache-only",
            FetchPolicy::NoCache => "no-cache",
            FetchPolicy::Standby => "standby",
        }
    }

    /// Returns true if this policy forces a network round trip even when the
    /// cache can answer.
    pub fn forces_network(&self) -> bool {
        matches!(self, FetchPolicy::NetworkOnly | FetchPolicy::CacheAndNetwork)
    }

    /// Returns the policy to use while prerendering.
    ///
    /// Forced network fetches are downgraded to `CacheFirst`; every other
    /// policy is kept.
    pub fn for_prerender(self) -> Self {
        if self.forces_network() {
            FetchPolicy::CacheFirst
        } else {
            self
        }
    }

    /// Returns true if results fetched under this policy are written to the cache.
    pub fn writes_cache(&self) -> bool {
        !matches!(self, FetchPolicy::NoCache | FetchPolicy::Standby)
    }
}

impl fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cache-first" => Ok(FetchPolicy::CacheFirst),
            "cache-and-network" => Ok(FetchPolicy::CacheAndNetwork),
            "network-only" => Ok(FetchPolicy::NetworkOnly),
            "cache-only" => Ok(FetchPolicy::CacheOnly),
            "no-cache" => Ok(FetchPolicy::NoCache),
            "standby" => Ok(FetchPolicy::Standby),
            other => Err(Error::unknown_fetch_policy(other)),
        }
    }
}

/// What kind of request, if any, is in flight for a stream.
///
/// The discriminants are the wire ordinals reported to rendering callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u8)]
pub enum NetworkStatus {
    /// First fetch for the stream
    Loading = 1,
    /// Variables changed and a fetch is in flight
    SetVariables = 2,
    /// A pagination request is in flight
    FetchMore = 3,
    /// An explicit refetch is in flight
    Refetch = 4,
    /// A polling request is in flight
    Poll = 6,
    /// No request in flight
    Ready = 7,
    /// The last request failed
    Error = 8,
}

impl NetworkStatus {
    /// Returns the wire ordinal of this status.
    #[inline]
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_policy_default() {
        assert_eq!(FetchPolicy::default(), FetchPolicy::CacheFirst);
    }

    #[test]
    fn test_fetch_policy_parse_roundtrip_names() {
        for policy in [
            FetchPolicy::CacheFirst,
            FetchPolicy::CacheAndNetwork,
            FetchPolicy::NetworkOnly,
            FetchPolicy::CacheOnly,
            FetchPolicy::NoCache,
            FetchPolicy::Standby,
        ] {
            assert_eq!(policy.as_str().parse::<FetchPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_fetch_policy_parse_unknown() {
        let err = "network-first".parse::<FetchPolicy>().unwrap_err();
        assert!(err.to_string().contains("network-first"));
    }

    #[test]
    fn test_fetch_policy_for_prerender() {
        assert_eq!(FetchPolicy::NetworkOnly.for_prerender(), FetchPolicy::CacheFirst);
        assert_eq!(FetchPolicy::CacheAndNetwork.for_prerender(), FetchPolicy::CacheFirst);
        assert_eq!(FetchPolicy::CacheOnly.for_prerender(), FetchPolicy::CacheOnly);
        assert_eq!(FetchPolicy::NoCache.for_prerender(), FetchPolicy::NoCache);
    }

    #[test]
    fn test_network_status_ordinals() {
        assert_eq!(NetworkStatus::Loading.ordinal(), 1);
        assert_eq!(NetworkStatus::Poll.ordinal(), 6);
        assert_eq!(NetworkStatus::Error.ordinal(), 8);
    }

    #[test]
    fn test_operation_kind_display() {
        assert_eq!(OperationKind::Mutation.to_string(), "mutation");
        assert_eq!(OperationKind::Subscription.keyword(), "subscription");
    }
}
