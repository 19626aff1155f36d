/// Identity Resolver - single-flight, memoizing profile lookups
use crate::{
    api::ProfileLookup,
    error::{FeedError, FeedResult},
    models::Profile,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Outcome shared by every caller waiting on the same lookup.
/// The error side is the failure reason.
type Flight = Shared<BoxFuture<'static, Result<Profile, String>>>;

enum Slot {
    Ready(Profile),
    Pending { id: u64, flight: Flight },
}

/// Resolves public keys to profiles.
///
/// At most one lookup per key is in flight; concurrent callers for that key
/// await the same result. Successes are kept for the lifetime of the
/// resolver. Failures are handed to every waiter of the failed lookup and
/// then forgotten, so the next call tries again.
pub struct IdentityResolver {
    lookup: Arc<dyn ProfileLookup>,
    slots: DashMap<String, Slot>,
    next_flight: AtomicU64,
}

impl IdentityResolver {
    pub fn new(lookup: Arc<dyn ProfileLookup>) -> Self {
        Self {
            lookup,
            slots: DashMap::new(),
            next_flight: AtomicU64::new(0),
        }
    }

    /// Resolve `pubkey`, joining an in-flight lookup if there is one
    pub async fn resolve(&self, pubkey: &str) -> FeedResult<Profile> {
        let (id, flight) = match self.slots.entry(pubkey.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Ready(profile) => return Ok(profile.clone()),
                Slot::Pending { id, flight } => {
                    debug!(pubkey = %pubkey, "Joining in-flight profile lookup");
                    (*id, flight.clone())
                }
            },
            Entry::Vacant(entry) => {
                let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                let flight = self.start_flight(pubkey);
                entry.insert(Slot::Pending {
                    id,
                    flight: flight.clone(),
                });
                (id, flight)
            }
        };

        let outcome = flight.await;
        self.settle(pubkey, id, &outcome);

        outcome.map_err(|reason| FeedError::resolution(pubkey, reason))
    }

    fn start_flight(&self, pubkey: &str) -> Flight {
        let lookup = Arc::clone(&self.lookup);
        let pubkey = pubkey.to_string();

        async move {
            lookup.lookup_profile(&pubkey).await.map_err(|e| match e {
                FeedError::Resolution { reason, .. } => reason,
                other => other.to_string(),
            })
        }
        .boxed()
        .shared()
    }

    /// Record the outcome of flight `id`, unless the slot has since been
    /// invalidated or taken over by a newer flight.
    fn settle(&self, pubkey: &str, id: u64, outcome: &Result<Profile, String>) {
        if let Entry::Occupied(mut entry) = self.slots.entry(pubkey.to_string()) {
            let is_current = matches!(entry.get(), Slot::Pending { id: current, .. } if *current == id);
            if !is_current {
                return;
            }

            match outcome {
                Ok(profile) => {
                    entry.insert(Slot::Ready(profile.clone()));
                }
                Err(reason) => {
                    debug!(pubkey = %pubkey, reason = %reason, "Profile lookup failed, not caching");
                    entry.remove();
                }
            }
        }
    }

    /// Profile already resolved for `pubkey`, without any lookup
    pub fn cached(&self, pubkey: &str) -> Option<Profile> {
        self.slots.get(pubkey).and_then(|slot| match slot.value() {
            Slot::Ready(profile) => Some(profile.clone()),
            Slot::Pending { .. } => None,
        })
    }

    /// Forget `pubkey` so the next resolve fetches it again
    pub fn invalidate(&self, pubkey: &str) {
        self.slots.remove(pubkey);
    }

    /// Number of resolved profiles held
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::future::join_all;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn profile_for(pubkey: &str) -> Profile {
        Profile {
            pubkey: pubkey.to_string(),
            username: format!("user-{}", pubkey),
            avatar: format!("https://example.com/{}.png", pubkey),
            description: String::new(),
        }
    }

    /// Counts calls and answers after a short delay
    #[derive(Default)]
    struct SlowLookup {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl ProfileLookup for SlowLookup {
        async fn lookup_profile(&self, pubkey: &str) -> FeedResult<Profile> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if call < self.fail_first {
                return Err(FeedError::resolution(pubkey, "profile not found"));
            }
            Ok(profile_for(pubkey))
        }
    }

    fn resolver_with(lookup: Arc<SlowLookup>) -> IdentityResolver {
        IdentityResolver::new(lookup)
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_lookup() {
        let lookup = Arc::new(SlowLookup::default());
        let resolver = resolver_with(lookup.clone());

        let results = join_all((0..16).map(|_| resolver.resolve("alice"))).await;

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), profile_for("alice"));
        }
    }

    #[tokio::test]
    async fn test_concurrent_resolves_across_tasks() {
        let lookup = Arc::new(SlowLookup::default());
        let resolver = Arc::new(resolver_with(lookup.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve("bob").await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().username, "user-bob");
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_are_looked_up_separately() {
        let lookup = Arc::new(SlowLookup::default());
        let resolver = resolver_with(lookup.clone());

        let (a, b) = tokio::join!(resolver.resolve("a"), resolver.resolve("b"));
        assert_eq!(a.unwrap().pubkey, "a");
        assert_eq!(b.unwrap().pubkey, "b");
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_result_skips_lookup() {
        let lookup = Arc::new(SlowLookup::default());
        let resolver = resolver_with(lookup.clone());

        assert!(resolver.cached("carol").is_none());
        resolver.resolve("carol").await.unwrap();
        resolver.resolve("carol").await.unwrap();

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached("carol"), Some(profile_for("carol")));
        assert_eq!(resolver.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let lookup = Arc::new(SlowLookup {
            fail_first: 1,
            ..Default::default()
        });
        let resolver = resolver_with(lookup.clone());

        let first = resolver.resolve("dave").await;
        assert!(matches!(first, Err(FeedError::Resolution { .. })));
        assert!(resolver.is_empty());

        let second = resolver.resolve("dave").await.unwrap();
        assert_eq!(second, profile_for("dave"));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_a_failure() {
        let lookup = Arc::new(SlowLookup {
            fail_first: 1,
            ..Default::default()
        });
        let resolver = resolver_with(lookup.clone());

        let results = join_all((0..4).map(|_| resolver.resolve("erin"))).await;

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        for result in results {
            match result {
                Err(FeedError::Resolution { pubkey, reason }) => {
                    assert_eq!(pubkey, "erin");
                    assert_eq!(reason, "profile not found");
                }
                other => panic!("expected resolution error, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_invalidate_during_lookup_discards_result() {
        let lookup = Arc::new(SlowLookup::default());
        let resolver = resolver_with(lookup.clone());

        let (resolved, _) = tokio::join!(resolver.resolve("gina"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            resolver.invalidate("gina");
        });

        assert_eq!(resolved.unwrap(), profile_for("gina"));
        assert!(resolver.cached("gina").is_none());
        assert!(resolver.is_empty());

        resolver.resolve("gina").await.unwrap();
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidated_flight_does_not_replace_newer_one() {
        let lookup = Arc::new(SlowLookup::default());
        let resolver = resolver_with(lookup.clone());

        // The second resolve starts a fresh flight after the invalidate; the
        // first flight settling must leave that newer flight in place.
        let (first, second) = tokio::join!(resolver.resolve("hank"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            resolver.invalidate("hank");
            resolver.resolve("hank").await
        });

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached("hank"), Some(profile_for("hank")));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let lookup = Arc::new(SlowLookup::default());
        let resolver = resolver_with(lookup.clone());

        resolver.resolve("frank").await.unwrap();
        resolver.invalidate("frank");
        assert!(resolver.cached("frank").is_none());

        resolver.resolve("frank").await.unwrap();
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }
}
