//! Data-source seams. The core consumes these traits; the live Twitter
//! client and the archived-file loader implement them.

pub mod archive;
pub mod twitter;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::model::BenchmarkRecord;

/// One page of a "accounts followed by this account" query.
#[derive(Debug, Clone)]
pub struct FollowingPage {
    pub ids: Vec<u64>,
    pub next_token: Option<String>,
}

/// Paginated access to an account's follow list. Implementations classify
/// failures via [`ProviderError`] so the resolver can tell recoverable
/// from terminal.
#[async_trait]
pub trait SocialGraphProvider: Send + Sync {
    async fn following_page(
        &self,
        account_id: u64,
        page_token: Option<&str>,
    ) -> Result<FollowingPage, ProviderError>;
}

/// Engagement lookups for benchmark comparison.
#[async_trait]
pub trait EngagementSource: Send + Sync {
    /// Current engagement metrics for one tweet.
    async fn tweet_engagement(&self, tweet_id: &str) -> Result<BenchmarkRecord, ProviderError>;

    /// Up to `limit` of the author's tweets strictly earlier than
    /// `until_id`, most recent first.
    async fn tweets_before(
        &self,
        author_id: u64,
        until_id: &str,
        limit: usize,
    ) -> Result<Vec<BenchmarkRecord>, ProviderError>;
}
