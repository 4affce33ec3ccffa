//! Cache and network participation policy for a single request.

use serde::Deserialize;
use serde::Serialize;

/// When the cache is consulted during an attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheRead {
    /// The cache is never consulted.
    Never,

    /// The cache is consulted before any network activity.
    BeforeNetwork,

    /// The cache is consulted only after a network fetch has failed.
    OnNetworkFailure,
}

/// When the network is used during an attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkFetch {
    /// The network is never used.
    Never,

    /// The network is always used, whether or not the cache produced a hit.
    Always,

    /// The network is used only when the cache did not produce a hit.
    OnCacheMiss,
}

/// How one request participates in caching and network fetching.
///
/// The two axes are independent, which is what lets the classic client-side
/// policies fall out as plain combinations, see the associated constants.
/// [`FetchBehavior::CACHE_FIRST`] is the default.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FetchBehavior {
    pub cache_read: CacheRead,
    pub network_fetch: NetworkFetch,
}

impl FetchBehavior {
    /// Return the cached response when there is one, otherwise fetch.
    pub const CACHE_FIRST: FetchBehavior = FetchBehavior {
        cache_read: CacheRead::BeforeNetwork,
        network_fetch: NetworkFetch::OnCacheMiss,
    };

    /// Always fetch, never touch the cache for reading.
    pub const NETWORK_ONLY: FetchBehavior = FetchBehavior {
        cache_read: CacheRead::Never,
        network_fetch: NetworkFetch::Always,
    };

    /// Only answer from the cache, never touch the network.
    pub const CACHE_ONLY: FetchBehavior = FetchBehavior {
        cache_read: CacheRead::BeforeNetwork,
        network_fetch: NetworkFetch::Never,
    };

    /// Fetch, and fall back to the cache when the network fails.
    pub const NETWORK_FIRST: FetchBehavior = FetchBehavior {
        cache_read: CacheRead::OnNetworkFailure,
        network_fetch: NetworkFetch::Always,
    };

    /// Answer from the cache when possible, then refresh from the network.
    pub const CACHE_AND_NETWORK: FetchBehavior = FetchBehavior {
        cache_read: CacheRead::BeforeNetwork,
        network_fetch: NetworkFetch::Always,
    };

    /// Whether the cache should be consulted at this point of an attempt.
    ///
    /// `network_failed` is `false` for the read happening ahead of the network
    /// leg, and `true` for the fallback read after a failed fetch.
    pub fn should_read_cache(&self, network_failed: bool) -> bool {
        match self.cache_read {
            CacheRead::Never => false,
            CacheRead::BeforeNetwork => !network_failed,
            CacheRead::OnNetworkFailure => network_failed,
        }
    }

    /// Whether the network leg should run, given the outcome of the initial
    /// cache read.
    pub fn should_fetch_network(&self, cache_hit: bool) -> bool {
        match self.network_fetch {
            NetworkFetch::Never => false,
            NetworkFetch::Always => true,
            NetworkFetch::OnCacheMiss => !cache_hit,
        }
    }
}

impl Default for FetchBehavior {
    fn default() -> Self {
        FetchBehavior::CACHE_FIRST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_read_axis_truth_table() {
        for (cache_read, before, on_failure) in [
            (CacheRead::Never, false, false),
            (CacheRead::BeforeNetwork, true, false),
            (CacheRead::OnNetworkFailure, false, true),
        ] {
            let behavior = FetchBehavior {
                cache_read,
                network_fetch: NetworkFetch::Always,
            };
            assert_eq!(behavior.should_read_cache(false), before, "{cache_read:?}");
            assert_eq!(
                behavior.should_read_cache(true),
                on_failure,
                "{cache_read:?}"
            );
        }
    }

    #[test]
    fn network_fetch_axis_truth_table() {
        for (network_fetch, on_miss, on_hit) in [
            (NetworkFetch::Never, false, false),
            (NetworkFetch::Always, true, true),
            (NetworkFetch::OnCacheMiss, true, false),
        ] {
            let behavior = FetchBehavior {
                cache_read: CacheRead::Never,
                network_fetch,
            };
            assert_eq!(
                behavior.should_fetch_network(false),
                on_miss,
                "{network_fetch:?}"
            );
            assert_eq!(
                behavior.should_fetch_network(true),
                on_hit,
                "{network_fetch:?}"
            );
        }
    }

    #[test]
    fn default_is_cache_first() {
        assert_eq!(FetchBehavior::default(), FetchBehavior::CACHE_FIRST);
    }

    #[test]
    fn presets_compose_the_axes() {
        assert!(!FetchBehavior::NETWORK_ONLY.should_read_cache(false));
        assert!(!FetchBehavior::NETWORK_ONLY.should_read_cache(true));
        assert!(FetchBehavior::NETWORK_ONLY.should_fetch_network(false));

        assert!(FetchBehavior::CACHE_ONLY.should_read_cache(false));
        assert!(!FetchBehavior::CACHE_ONLY.should_fetch_network(false));

        assert!(!FetchBehavior::NETWORK_FIRST.should_read_cache(false));
        assert!(FetchBehavior::NETWORK_FIRST.should_read_cache(true));
        assert!(FetchBehavior::NETWORK_FIRST.should_fetch_network(true));

        assert!(FetchBehavior::CACHE_AND_NETWORK.should_read_cache(false));
        assert!(FetchBehavior::CACHE_AND_NETWORK.should_fetch_network(true));
    }

    #[test]
    fn serializes_with_snake_case_axes() {
        assert_eq!(
            serde_json::to_value(FetchBehavior::NETWORK_FIRST).unwrap(),
            serde_json::json!({
                "cache_read": "on_network_failure",
                "network_fetch": "always",
            }),
        );
    }
}
