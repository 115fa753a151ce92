//! Memoized corrected-binding resolution.
//!
//! When a parcel was counted against the wrong target, the "correct" route
//! is whichever other target bound the same shipment inside the same task.
//! The lookup behind that is expensive and repeats heavily across a join
//! loop, so results are memoized per `(task, shipment)` pair — including
//! failed and empty lookups, which would otherwise be retried on every row.

use std::collections::HashMap;

use lastmile_client::{Endpoints, ResourceFetcher};
use tracing::debug;

use crate::model::{decode_list, TargetBinding};

/// Per-run cache of shipment-scoped target lookups.
///
/// Owned by the pipeline and used only from its sequential join loop, so
/// it carries no synchronization; a concurrent caller would need to wrap
/// it or single-flight per key.
#[derive(Default)]
pub struct RouteCache {
    entries: HashMap<(String, String), Vec<TargetBinding>>,
    hits: u64,
    misses: u64,
}

impl RouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the corrected binding for `shipment` under `task`, excluding
    /// the target the parcel was observed on.
    ///
    /// Tie-break: the first stored entry whose target differs from
    /// `exclude_target` wins (when it has a binding); otherwise the entry
    /// matching `exclude_target`; otherwise empty.
    pub async fn resolve(
        &mut self,
        fetcher: &dyn ResourceFetcher,
        endpoints: &Endpoints,
        task: &str,
        shipment: &str,
        exclude_target: &str,
    ) -> String {
        let key = (task.to_string(), shipment.to_string());
        if !self.entries.contains_key(&key) {
            self.misses += 1;
            let bindings = match fetcher
                .fetch_json(&endpoints.target_list_by_shipment(task, shipment))
                .await
            {
                Ok(response) => decode_list(&response),
                // Negative caching: a failed lookup stores an empty list so
                // later rows for the same pair don't repeat the failing call.
                Err(err) => {
                    debug!(task, shipment, error = %err, "cross-reference lookup failed");
                    Vec::new()
                }
            };
            self.entries.insert(key.clone(), bindings);
        } else {
            self.hits += 1;
        }

        let bindings = &self.entries[&key];
        if let Some(other) = bindings.iter().find(|b| b.target_id != exclude_target) {
            if !other.binding_entity.is_empty() {
                return other.binding_entity.clone();
            }
        }
        bindings
            .iter()
            .find(|b| b.target_id == exclude_target)
            .map(|b| b.binding_entity.clone())
            .unwrap_or_default()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lastmile_client::{FetchError, FetchOutcome, Target};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        response: FetchOutcome,
    }

    impl CountingFetcher {
        fn serving(response: Value) -> Self {
            Self { calls: AtomicUsize::new(0), response: Ok(response) }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Err(FetchError::Decode { raw: "boom".into() }),
            }
        }
    }

    #[async_trait]
    impl ResourceFetcher for CountingFetcher {
        async fn fetch_json(&self, _target: &Target) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(v) => Ok(v.clone()),
                Err(_) => Err(FetchError::Decode { raw: "boom".into() }),
            }
        }
    }

    fn two_bindings() -> Value {
        json!({ "data": { "list": [
            { "target_id": "X", "binding_entity": "A" },
            { "target_id": "Y", "binding_entity": "B" },
        ]}})
    }

    fn endpoints() -> Endpoints {
        Endpoints::new("http://test")
    }

    #[tokio::test]
    async fn repeat_resolve_hits_cache() {
        let fetcher = CountingFetcher::serving(two_bindings());
        let mut cache = RouteCache::new();

        let first = cache.resolve(&fetcher, &endpoints(), "VT1", "BR1", "X").await;
        let second = cache.resolve(&fetcher, &endpoints(), "VT1", "BR1", "X").await;

        assert_eq!(first, "B");
        assert_eq!(second, "B");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[tokio::test]
    async fn distinct_pairs_fetch_separately() {
        let fetcher = CountingFetcher::serving(two_bindings());
        let mut cache = RouteCache::new();

        cache.resolve(&fetcher, &endpoints(), "VT1", "BR1", "X").await;
        cache.resolve(&fetcher, &endpoints(), "VT1", "BR2", "X").await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tie_break_prefers_first_other_entry() {
        let fetcher = CountingFetcher::serving(two_bindings());
        let mut cache = RouteCache::new();

        assert_eq!(cache.resolve(&fetcher, &endpoints(), "VT1", "BR1", "X").await, "B");
        assert_eq!(cache.resolve(&fetcher, &endpoints(), "VT1", "BR1", "Y").await, "A");
        // Excluding an absent id: the first entry already differs, so it wins.
        assert_eq!(cache.resolve(&fetcher, &endpoints(), "VT1", "BR1", "Z").await, "A");
    }

    #[tokio::test]
    async fn falls_back_to_excluded_entry_when_other_has_no_binding() {
        let fetcher = CountingFetcher::serving(json!({ "data": { "list": [
            { "target_id": "X", "binding_entity": "" },
            { "target_id": "Y", "binding_entity": "B" },
        ]}}));
        let mut cache = RouteCache::new();

        // First non-matching entry (X) has an empty binding, so resolution
        // falls back to the entry matching the excluded id.
        assert_eq!(cache.resolve(&fetcher, &endpoints(), "VT1", "BR1", "Y").await, "B");
    }

    #[tokio::test]
    async fn single_entry_matching_exclusion_resolves_to_itself() {
        let fetcher = CountingFetcher::serving(json!({ "data": { "list": [
            { "target_id": "X", "binding_entity": "A" },
        ]}}));
        let mut cache = RouteCache::new();
        assert_eq!(cache.resolve(&fetcher, &endpoints(), "VT1", "BR1", "X").await, "A");
    }

    #[tokio::test]
    async fn failed_lookup_is_negatively_cached() {
        let fetcher = CountingFetcher::failing();
        let mut cache = RouteCache::new();

        assert_eq!(cache.resolve(&fetcher, &endpoints(), "VT1", "BR1", "X").await, "");
        assert_eq!(cache.resolve(&fetcher, &endpoints(), "VT1", "BR1", "Y").await, "");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
