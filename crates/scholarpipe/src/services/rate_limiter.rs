//! Per-domain politeness limiter for outbound HTTP.
//!
//! Every outbound request reserves a start slot for its domain: slots are at
//! least the policy's minimum spacing apart, a process-wide floor separates
//! any two requests regardless of domain, and a per-domain semaphore bounds
//! in-flight requests. Policies are selected by longest-suffix match on the
//! hostname, so `scholarships.gov.in` picks up the `gov.in` rules.

use crate::utils::url::host_matches_suffix;
use ahash::AHashMap;
use log::debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Spacing and concurrency rules for one domain bucket.
#[derive(Debug, Clone, Copy)]
pub struct DomainPolicy {
    /// Minimum gap between successive requests to the same domain.
    pub min_spacing: Duration,
    /// Maximum in-flight requests to the same domain.
    pub max_concurrent: usize,
}

impl DomainPolicy {
    pub const fn new(min_spacing_ms: u64, max_concurrent: usize) -> Self {
        Self {
            min_spacing: Duration::from_millis(min_spacing_ms),
            max_concurrent,
        }
    }
}

/// Commercial scholarship aggregators that get the faster commercial bucket.
const AGGREGATOR_SUFFIXES: &[&str] = &[
    "buddy4study.com",
    "scholarshipsinindia.com",
    "vidhyaa.in",
];

/// Holds a reserved request slot. In-flight accounting is released when the
/// permit drops, so hold it for the duration of the HTTP call.
#[derive(Debug)]
pub struct RatePermit {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug)]
struct DomainEntry {
    policy: DomainPolicy,
    semaphore: Arc<Semaphore>,
    last_slot: Mutex<Option<Instant>>,
}

/// Process-wide outbound request limiter.
///
/// Shared by every job; per-domain state is created lazily on first contact
/// with a domain. All internal locks are held only for slot arithmetic, never
/// across the actual wait.
#[derive(Debug)]
pub struct RateLimiter {
    rules: Vec<(String, DomainPolicy)>,
    default_policy: DomainPolicy,
    global_floor: Duration,
    global_last_slot: Mutex<Option<Instant>>,
    entries: Mutex<AHashMap<String, Arc<DomainEntry>>>,
}

impl RateLimiter {
    /// Limiter with the standard politeness buckets:
    ///
    /// - `*.gov.in` - 8000 ms spacing, 1 in-flight
    /// - `*.edu.in`, `*.ac.in` - 5000 ms spacing, 2 in-flight
    /// - known aggregators - 3000 ms spacing, 3 in-flight
    /// - everything else - 4000 ms spacing, 2 in-flight
    ///
    /// plus a 1000 ms global floor between any two outbound requests.
    pub fn standard() -> Self {
        let mut limiter = Self::new(Duration::from_millis(1000), DomainPolicy::new(4000, 2));
        limiter.add_rule("gov.in", DomainPolicy::new(8000, 1));
        limiter.add_rule("edu.in", DomainPolicy::new(5000, 2));
        limiter.add_rule("ac.in", DomainPolicy::new(5000, 2));
        for suffix in AGGREGATOR_SUFFIXES {
            limiter.add_rule(suffix, DomainPolicy::new(3000, 3));
        }
        limiter
    }

    /// Empty limiter with explicit defaults; rules are added with
    /// [`add_rule`](Self::add_rule). Tests use this to scale timings down.
    pub fn new(global_floor: Duration, default_policy: DomainPolicy) -> Self {
        Self {
            rules: Vec::new(),
            default_policy,
            global_floor,
            global_last_slot: Mutex::new(None),
            entries: Mutex::new(AHashMap::new()),
        }
    }

    pub fn add_rule(&mut self, suffix: &str, policy: DomainPolicy) {
        self.rules.push((suffix.to_lowercase(), policy));
    }

    /// Resolves the policy for a hostname by longest-suffix match.
    pub fn policy_for(&self, host: &str) -> DomainPolicy {
        let host = host.to_lowercase();
        self.rules
            .iter()
            .filter(|(suffix, _)| host_matches_suffix(&host, suffix))
            .max_by_key(|(suffix, _)| suffix.len())
            .map(|(_, policy)| *policy)
            .unwrap_or(self.default_policy)
    }

    /// Waits until a request to `host` is allowed and returns the in-flight
    /// permit. The caller performs its HTTP request while holding the permit
    /// and drops it afterwards.
    ///
    /// Slot reservation happens under the lock, the wait happens after it is
    /// released; concurrent callers therefore queue onto successive slots and
    /// successive requests to one domain stay at least `min_spacing` apart.
    pub async fn acquire(&self, host: &str) -> RatePermit {
        let entry = self.entry_for(host).await;

        let permit = entry
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("rate limiter semaphore closed");

        let slot = {
            let mut domain_last = entry.last_slot.lock().await;
            let mut global_last = self.global_last_slot.lock().await;
            let now = Instant::now();
            let mut slot = now;
            if let Some(prev) = *domain_last {
                slot = slot.max(prev + entry.policy.min_spacing);
            }
            if let Some(prev) = *global_last {
                slot = slot.max(prev + self.global_floor);
            }
            *domain_last = Some(slot);
            *global_last = Some(slot);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!("Rate limiter delaying request to {} by {:?}", host, wait);
            tokio::time::sleep_until(tokio::time::Instant::from_std(slot)).await;
        }

        RatePermit { _permit: permit }
    }

    async fn entry_for(&self, host: &str) -> Arc<DomainEntry> {
        let host = host.to_lowercase();
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(&host) {
            return entry.clone();
        }
        let policy = self.policy_for(&host);
        let entry = Arc::new(DomainEntry {
            policy,
            semaphore: Arc::new(Semaphore::new(policy.max_concurrent)),
            last_slot: Mutex::new(None),
        });
        entries.insert(host, entry.clone());
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_limiter() -> RateLimiter {
        let mut limiter = RateLimiter::new(Duration::from_millis(10), DomainPolicy::new(40, 2));
        limiter.add_rule("gov.in", DomainPolicy::new(80, 1));
        limiter.add_rule("ac.in", DomainPolicy::new(50, 2));
        limiter
    }

    #[test]
    fn test_policy_longest_suffix_wins() {
        let mut limiter = quick_limiter();
        limiter.add_rule("up.gov.in", DomainPolicy::new(120, 1));

        assert_eq!(
            limiter.policy_for("scholarships.gov.in").min_spacing,
            Duration::from_millis(80)
        );
        assert_eq!(
            limiter.policy_for("portal.up.gov.in").min_spacing,
            Duration::from_millis(120)
        );
        assert_eq!(
            limiter.policy_for("random.example.com").min_spacing,
            Duration::from_millis(40)
        );
    }

    #[test]
    fn test_standard_buckets() {
        let limiter = RateLimiter::standard();
        assert_eq!(
            limiter.policy_for("a.gov.in").min_spacing,
            Duration::from_millis(8000)
        );
        assert_eq!(limiter.policy_for("a.gov.in").max_concurrent, 1);
        assert_eq!(
            limiter.policy_for("college.ac.in").min_spacing,
            Duration::from_millis(5000)
        );
        assert_eq!(
            limiter.policy_for("www.buddy4study.com").min_spacing,
            Duration::from_millis(3000)
        );
        assert_eq!(
            limiter.policy_for("anything.org").min_spacing,
            Duration::from_millis(4000)
        );
    }

    #[tokio::test]
    async fn test_spacing_between_requests_to_same_domain() {
        let limiter = quick_limiter();
        let start = Instant::now();
        drop(limiter.acquire("x.gov.in").await);
        drop(limiter.acquire("x.gov.in").await);
        assert!(
            start.elapsed() >= Duration::from_millis(75),
            "second request arrived after only {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_global_floor_applies_across_domains() {
        let limiter = RateLimiter::new(Duration::from_millis(60), DomainPolicy::new(1, 2));
        let start = Instant::now();
        drop(limiter.acquire("a.example.com").await);
        drop(limiter.acquire("b.example.com").await);
        assert!(
            start.elapsed() >= Duration::from_millis(55),
            "global floor not enforced, elapsed {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_max_concurrent_limits_in_flight() {
        let limiter = Arc::new(RateLimiter::new(
            Duration::from_millis(1),
            DomainPolicy::new(1, 1),
        ));
        let first = limiter.acquire("slow.example.com").await;

        let limiter2 = limiter.clone();
        let waiter = tokio::spawn(async move {
            let _p = limiter2.acquire("slow.example.com").await;
            Instant::now()
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let released_at = Instant::now();
        drop(first);

        let acquired_at = waiter.await.unwrap();
        assert!(
            acquired_at >= released_at,
            "second permit was granted while the first was held"
        );
    }
}
