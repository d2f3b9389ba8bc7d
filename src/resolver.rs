//! Resolves the partial follow graph for a set of accounts.
//!
//! Lookups for independent accounts run concurrently up to a bounded
//! worker count; a shared rate-limit gate suspends every worker while the
//! provider's limit window is closed. One account failing permanently
//! degrades only that entry — the whole batch fails only when the retry
//! budget runs out.

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, ProviderError};
use crate::model::SocialGraph;
use crate::sources::SocialGraphProvider;

/// Retry discipline for graph resolution. Passed in explicitly; there is
/// no global retry flag.
///
/// The default attempt budget is sized to ride out one full fifteen-minute
/// rate-limit window at the default delay, so a single window never fails
/// the batch but repeated exhaustion eventually does.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Failed attempts allowed per account before the batch fails.
    pub max_attempts: u32,
    /// Sleep between retries of transient failures.
    pub retry_delay: Duration,
    /// Concurrent account lookups.
    pub concurrency: usize,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 120,
            retry_delay: Duration::from_secs(10),
            concurrency: 4,
        }
    }
}

/// An account whose lookup failed permanently. Absent from the graph;
/// inference treats it as following no one.
#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedAccount {
    pub account_id: u64,
    pub reason: String,
}

/// Outcome of one resolution batch: the graph for every account that
/// resolved, plus the accounts that did not.
#[derive(Debug)]
pub struct GraphResolution {
    pub graph: SocialGraph,
    pub unresolved: Vec<UnresolvedAccount>,
}

impl GraphResolution {
    pub fn is_degraded(&self) -> bool {
        !self.unresolved.is_empty()
    }
}

/// Shared suspend/resume point for the provider's rate-limit window. Any
/// worker that sees a rate-limit response pushes the deadline out; every
/// worker waits for it before issuing a request.
struct RateLimitGate {
    until: Mutex<Option<Instant>>,
}

impl RateLimitGate {
    fn new() -> Self {
        Self {
            until: Mutex::new(None),
        }
    }

    async fn wait_ready(&self) {
        loop {
            let deadline = *self.until.lock().await;
            match deadline {
                Some(at) if at > Instant::now() => tokio::time::sleep_until(at).await,
                _ => return,
            }
        }
    }

    async fn suspend_until(&self, deadline: Instant) {
        let mut until = self.until.lock().await;
        if until.is_none_or(|current| deadline > current) {
            *until = Some(deadline);
        }
    }
}

enum ResolveFailure {
    /// This account is a lost cause; the batch continues without it.
    Account(String),
    /// The provider never came back; the batch is over.
    Exhausted { attempts: u32, last_error: String },
}

/// Resolve the follow sets for `accounts`. Returns the graph for every
/// account that resolved; never fails because one account did not.
pub async fn resolve_follow_graph<P: SocialGraphProvider + ?Sized>(
    provider: &P,
    accounts: &HashSet<u64>,
    policy: &BackoffPolicy,
) -> Result<GraphResolution, Error> {
    let gate = RateLimitGate::new();
    let gate = &gate;
    let mut lookups = stream::iter(accounts.iter().copied())
        .map(|account_id| async move {
            let outcome = resolve_account(provider, account_id, policy, gate).await;
            (account_id, outcome)
        })
        .buffer_unordered(policy.concurrency.max(1));

    let mut graph = SocialGraph::new();
    let mut unresolved = Vec::new();
    while let Some((account_id, outcome)) = lookups.next().await {
        match outcome {
            Ok(followed) => {
                debug!(account_id, followed = followed.len(), "resolved follow set");
                graph.insert(account_id, followed);
            }
            Err(ResolveFailure::Account(reason)) => {
                warn!(account_id, %reason, "abandoning account lookup");
                unresolved.push(UnresolvedAccount { account_id, reason });
            }
            // Dropping the stream abandons the in-flight lookups.
            Err(ResolveFailure::Exhausted {
                attempts,
                last_error,
            }) => return Err(Error::SourceUnavailable {
                attempts,
                last_error,
            }),
        }
    }
    unresolved.sort_by_key(|u| u.account_id);
    Ok(GraphResolution { graph, unresolved })
}

/// Page through one account's follow list until the continuation token
/// runs out. Recoverable failures retry within the policy's budget;
/// anything else abandons the account.
async fn resolve_account<P: SocialGraphProvider + ?Sized>(
    provider: &P,
    account_id: u64,
    policy: &BackoffPolicy,
    gate: &RateLimitGate,
) -> Result<HashSet<u64>, ResolveFailure> {
    let mut followed = HashSet::new();
    let mut page_token: Option<String> = None;
    let mut attempts = 0u32;
    loop {
        gate.wait_ready().await;
        match provider.following_page(account_id, page_token.as_deref()).await {
            Ok(page) => {
                followed.extend(page.ids);
                match page.next_token {
                    Some(token) => page_token = Some(token),
                    None => return Ok(followed),
                }
            }
            Err(ProviderError::RateLimited { reset_after }) => {
                attempts += 1;
                if attempts >= policy.max_attempts {
                    return Err(ResolveFailure::Exhausted {
                        attempts,
                        last_error: "rate limit window never reset".to_string(),
                    });
                }
                debug!(account_id, ?reset_after, "rate limited, suspending lookups");
                gate.suspend_until(Instant::now() + reset_after).await;
            }
            Err(err @ ProviderError::Transient(_)) => {
                attempts += 1;
                if attempts >= policy.max_attempts {
                    return Err(ResolveFailure::Exhausted {
                        attempts,
                        last_error: err.to_string(),
                    });
                }
                tokio::time::sleep(policy.retry_delay).await;
            }
            Err(err) => return Err(ResolveFailure::Account(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::FollowingPage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// In-memory provider with per-account failure injection and a fixed
    /// page size, so pagination and retry paths are exercised without a
    /// network.
    struct FakeProvider {
        follows: HashMap<u64, Vec<u64>>,
        page_size: usize,
        not_found: HashSet<u64>,
        transient_failures: StdMutex<HashMap<u64, u32>>,
        rate_limit_failures: StdMutex<HashMap<u64, u32>>,
    }

    impl FakeProvider {
        fn new(follows: &[(u64, &[u64])]) -> Self {
            Self {
                follows: follows
                    .iter()
                    .map(|(id, f)| (*id, f.to_vec()))
                    .collect(),
                page_size: 2,
                not_found: HashSet::new(),
                transient_failures: StdMutex::new(HashMap::new()),
                rate_limit_failures: StdMutex::new(HashMap::new()),
            }
        }

        fn with_not_found(mut self, account_id: u64) -> Self {
            self.not_found.insert(account_id);
            self
        }

        fn with_transient_failures(self, account_id: u64, count: u32) -> Self {
            self.transient_failures
                .lock()
                .unwrap()
                .insert(account_id, count);
            self
        }

        fn with_rate_limit_failures(self, account_id: u64, count: u32) -> Self {
            self.rate_limit_failures
                .lock()
                .unwrap()
                .insert(account_id, count);
            self
        }
    }

    #[async_trait]
    impl SocialGraphProvider for FakeProvider {
        async fn following_page(
            &self,
            account_id: u64,
            page_token: Option<&str>,
        ) -> Result<FollowingPage, ProviderError> {
            {
                let mut failures = self.rate_limit_failures.lock().unwrap();
                if let Some(count) = failures.get_mut(&account_id) {
                    if *count > 0 {
                        *count -= 1;
                        return Err(ProviderError::RateLimited {
                            reset_after: Duration::from_millis(5),
                        });
                    }
                }
            }
            {
                let mut failures = self.transient_failures.lock().unwrap();
                if let Some(count) = failures.get_mut(&account_id) {
                    if *count > 0 {
                        *count -= 1;
                        return Err(ProviderError::Transient("HTTP 503".to_string()));
                    }
                }
            }
            if self.not_found.contains(&account_id) {
                return Err(ProviderError::NotFound);
            }
            let all = self
                .follows
                .get(&account_id)
                .ok_or(ProviderError::NotFound)?;
            let start: usize = page_token.map_or(Ok(0), str::parse).unwrap();
            let end = (start + self.page_size).min(all.len());
            let next_token = (end < all.len()).then(|| end.to_string());
            Ok(FollowingPage {
                ids: all[start..end].to_vec(),
                next_token,
            })
        }
    }

    fn fast_policy() -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: 5,
            retry_delay: Duration::from_millis(1),
            concurrency: 3,
        }
    }

    #[tokio::test]
    async fn test_resolves_all_accounts() {
        let provider = FakeProvider::new(&[(1, &[10, 11]), (2, &[12])]);
        let resolution = resolve_follow_graph(&provider, &HashSet::from([1, 2]), &fast_policy())
            .await
            .unwrap();
        assert_eq!(resolution.graph.len(), 2);
        assert!(resolution.graph.follows(1, 11));
        assert!(!resolution.is_degraded());
    }

    #[tokio::test]
    async fn test_paginates_past_continuation_tokens() {
        let provider = FakeProvider::new(&[(1, &[10, 11, 12, 13, 14])]);
        let resolution = resolve_follow_graph(&provider, &HashSet::from([1]), &fast_policy())
            .await
            .unwrap();
        for followee in [10, 11, 12, 13, 14] {
            assert!(resolution.graph.follows(1, followee));
        }
    }

    #[tokio::test]
    async fn test_one_failed_account_degrades_not_fails() {
        let provider =
            FakeProvider::new(&[(1, &[10]), (2, &[11]), (3, &[12])]).with_not_found(3);
        let resolution =
            resolve_follow_graph(&provider, &HashSet::from([1, 2, 3]), &fast_policy())
                .await
                .unwrap();
        assert_eq!(resolution.graph.len(), 2);
        assert!(resolution.graph.contains(1));
        assert!(resolution.graph.contains(2));
        assert!(!resolution.graph.contains(3));
        assert!(resolution.is_degraded());
        assert_eq!(resolution.unresolved[0].account_id, 3);
    }

    #[tokio::test]
    async fn test_transient_failures_retry_to_success() {
        let provider = FakeProvider::new(&[(1, &[10, 11])]).with_transient_failures(1, 2);
        let resolution = resolve_follow_graph(&provider, &HashSet::from([1]), &fast_policy())
            .await
            .unwrap();
        assert!(resolution.graph.follows(1, 10));
        assert!(!resolution.is_degraded());
    }

    #[tokio::test]
    async fn test_rate_limit_suspends_then_resumes() {
        let provider = FakeProvider::new(&[(1, &[10]), (2, &[11])])
            .with_rate_limit_failures(1, 1);
        let resolution = resolve_follow_graph(&provider, &HashSet::from([1, 2]), &fast_policy())
            .await
            .unwrap();
        assert_eq!(resolution.graph.len(), 2);
        assert!(resolution.graph.follows(1, 10));
    }

    #[tokio::test]
    async fn test_exhausted_retry_budget_fails_batch() {
        let provider = FakeProvider::new(&[(1, &[10])]).with_transient_failures(1, 100);
        let err = resolve_follow_graph(&provider, &HashSet::from([1]), &fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { attempts: 5, .. }));
    }

    #[tokio::test]
    async fn test_degraded_graph_still_infers() {
        use crate::cascade::build_cascade_report;
        use crate::model::RetweetEvent;
        use chrono::{TimeZone, Utc};

        let event = |tweet_id: &str, author_id: u64, secs: i64| RetweetEvent {
            tweet_id: tweet_id.to_string(),
            author_id,
            created_at: Utc.with_ymd_and_hms(2021, 1, 18, 0, 0, 0).unwrap()
                + chrono::Duration::seconds(secs),
        };
        let provider = FakeProvider::new(&[(2, &[]), (3, &[2])]).with_not_found(4);
        let report = build_cascade_report(
            event("R", 1, 0),
            vec![event("A", 2, 1), event("B", 3, 2), event("C", 4, 3)],
            &provider,
            &fast_policy(),
        )
        .await
        .unwrap();
        assert!(report.is_degraded());
        assert_eq!(report.edges.len(), 3);
        // B's author follows A's author; C's author is unresolved and
        // falls back to the root.
        assert_eq!(report.edges[1].parent_tweet_id, "A");
        assert_eq!(report.edges[2].parent_tweet_id, "R");
    }
}
