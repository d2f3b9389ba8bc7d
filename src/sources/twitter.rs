//! Live Twitter v2 client: recent-search pagination for retweets,
//! follow-list pagination for the graph resolver, and engagement lookups
//! for benchmarking. All failures are classified into [`ProviderError`]
//! here; nothing upstream inspects HTTP statuses.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::model::{BenchmarkRecord, Retweeter};
use crate::normalize::LiveTweet;
use crate::sources::{EngagementSource, FollowingPage, SocialGraphProvider};

const TWITTER_API_BASE: &str = "https://api.twitter.com/2";
const SEARCH_PAGE_SIZE: u32 = 100;
const FOLLOWING_PAGE_SIZE: u32 = 1000;
const DEFAULT_RESET: Duration = Duration::from_secs(60);

pub struct TwitterClient {
    bearer_token: String,
    client: reqwest::Client,
}

impl TwitterClient {
    pub fn new(bearer_token: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("ripple/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            bearer_token,
            client,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .query(params)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|err| ProviderError::Other(format!("bad response body: {err}")));
        }
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let reset = response
                    .headers()
                    .get("x-rate-limit-reset")
                    .and_then(|v| v.to_str().ok());
                ProviderError::RateLimited {
                    reset_after: reset_after(reset, Utc::now().timestamp()),
                }
            }
            StatusCode::NOT_FOUND => ProviderError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Forbidden,
            s if s.is_server_error() => ProviderError::Transient(format!("HTTP {s}")),
            s => ProviderError::Other(format!("HTTP {s}")),
        })
    }

    /// Page through recent retweets/quotes of a post matching `text`.
    /// Returns the raw records plus the original post from the
    /// referenced-tweets expansion (requested on the first page only).
    pub async fn search_retweets(
        &self,
        text: &str,
    ) -> Result<(Vec<LiveTweet>, LiveTweet), ProviderError> {
        let url = format!("{TWITTER_API_BASE}/tweets/search/recent");
        let query = format!("(is:retweet OR is:quote) \"{text}\"");
        let mut retweets = Vec::new();
        let mut original: Option<LiveTweet> = None;
        let mut next_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("query", query.clone()),
                ("tweet.fields", "created_at,author_id".to_string()),
                ("max_results", SEARCH_PAGE_SIZE.to_string()),
            ];
            if original.is_none() {
                params.push(("expansions", "referenced_tweets.id".to_string()));
            }
            if let Some(token) = &next_token {
                params.push(("next_token", token.clone()));
            }
            let page: SearchResponse = self.get_json(&url, &params).await?;
            debug!(records = page.data.len(), "fetched retweet search page");
            retweets.extend(page.data);
            if original.is_none() {
                original = page
                    .includes
                    .and_then(|inc| inc.tweets.into_iter().next());
            }
            next_token = page.meta.and_then(|m| m.next_token);
            if next_token.is_none() {
                break;
            }
        }
        let original = original.ok_or_else(|| {
            ProviderError::Other("search response carried no original tweet".to_string())
        })?;
        Ok((retweets, original))
    }

    /// Collect the retweeting users with their follower counts, for
    /// follower ranking.
    pub async fn search_retweeters(&self, text: &str) -> Result<Vec<Retweeter>, ProviderError> {
        let url = format!("{TWITTER_API_BASE}/tweets/search/recent");
        let query = format!("(is:retweet OR is:quote) \"{text}\"");
        let mut retweeters = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("query", query.clone()),
                ("expansions", "author_id".to_string()),
                ("user.fields", "public_metrics".to_string()),
                ("max_results", SEARCH_PAGE_SIZE.to_string()),
            ];
            if let Some(token) = &next_token {
                params.push(("next_token", token.clone()));
            }
            let page: SearchResponse = self.get_json(&url, &params).await?;
            if let Some(includes) = page.includes {
                retweeters.extend(includes.users.into_iter().filter_map(|user| {
                    let followers = user.public_metrics.map(|m| m.followers_count)?;
                    Some(Retweeter {
                        username: user.username,
                        followers,
                    })
                }));
            }
            next_token = page.meta.and_then(|m| m.next_token);
            if next_token.is_none() {
                break;
            }
        }
        Ok(retweeters)
    }
}

/// Seconds until the rate-limit window resets, from the provider's epoch
/// header. Missing or garbled headers fall back to a flat minute.
fn reset_after(header: Option<&str>, now_epoch: i64) -> Duration {
    header
        .and_then(|raw| raw.parse::<i64>().ok())
        .map(|reset| Duration::from_secs((reset - now_epoch).max(1) as u64))
        .unwrap_or(DEFAULT_RESET)
}

fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ProviderError::Other(format!("unparsable created_at: {raw:?}")))
}

#[async_trait]
impl SocialGraphProvider for TwitterClient {
    async fn following_page(
        &self,
        account_id: u64,
        page_token: Option<&str>,
    ) -> Result<FollowingPage, ProviderError> {
        let url = format!("{TWITTER_API_BASE}/users/{account_id}/following");
        let mut params = vec![("max_results", FOLLOWING_PAGE_SIZE.to_string())];
        if let Some(token) = page_token {
            params.push(("pagination_token", token.to_string()));
        }
        let page: FollowingResponse = self.get_json(&url, &params).await?;
        let ids = page
            .data
            .into_iter()
            .filter_map(|user| match user.id.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(raw = %user.id, "skipping non-numeric followed account id");
                    None
                }
            })
            .collect();
        Ok(FollowingPage {
            ids,
            next_token: page.meta.and_then(|m| m.next_token),
        })
    }
}

#[async_trait]
impl EngagementSource for TwitterClient {
    async fn tweet_engagement(&self, tweet_id: &str) -> Result<BenchmarkRecord, ProviderError> {
        let url = format!("{TWITTER_API_BASE}/tweets");
        let params = vec![
            ("ids", tweet_id.to_string()),
            ("tweet.fields", "created_at,public_metrics".to_string()),
        ];
        let response: TweetLookupResponse = self.get_json(&url, &params).await?;
        response
            .data
            .into_iter()
            .next()
            .ok_or(ProviderError::NotFound)?
            .into_record()
    }

    async fn tweets_before(
        &self,
        author_id: u64,
        until_id: &str,
        limit: usize,
    ) -> Result<Vec<BenchmarkRecord>, ProviderError> {
        let url = format!("{TWITTER_API_BASE}/users/{author_id}/tweets");
        // The provider insists on 5..=100 per page.
        let page_size = limit.clamp(5, 100);
        let params = vec![
            ("tweet.fields", "public_metrics,text,created_at".to_string()),
            ("max_results", page_size.to_string()),
            ("until_id", until_id.to_string()),
        ];
        let response: TweetLookupResponse = self.get_json(&url, &params).await?;
        response
            .data
            .into_iter()
            .take(limit)
            .map(ApiTweet::into_record)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<LiveTweet>,
    includes: Option<SearchIncludes>,
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct SearchIncludes {
    #[serde(default)]
    tweets: Vec<LiveTweet>,
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    username: String,
    public_metrics: Option<UserMetrics>,
}

#[derive(Debug, Deserialize)]
struct UserMetrics {
    followers_count: u64,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FollowingResponse {
    #[serde(default)]
    data: Vec<ApiUserId>,
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct ApiUserId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TweetLookupResponse {
    #[serde(default)]
    data: Vec<ApiTweet>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    text: String,
    created_at: String,
    public_metrics: TweetMetrics,
}

#[derive(Debug, Deserialize)]
struct TweetMetrics {
    retweet_count: u64,
    reply_count: u64,
    like_count: u64,
}

impl ApiTweet {
    fn into_record(self) -> Result<BenchmarkRecord, ProviderError> {
        Ok(BenchmarkRecord {
            created_at: parse_created_at(&self.created_at)?,
            text: self.text,
            retweet_count: self.public_metrics.retweet_count,
            reply_count: self.public_metrics.reply_count,
            like_count: self.public_metrics.like_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_after_from_epoch_header() {
        assert_eq!(
            reset_after(Some("1000120"), 1_000_000),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_reset_after_past_deadline_clamps_to_one_second() {
        assert_eq!(reset_after(Some("999"), 1_000_000), Duration::from_secs(1));
    }

    #[test]
    fn test_reset_after_missing_or_garbled_header() {
        assert_eq!(reset_after(None, 1_000_000), DEFAULT_RESET);
        assert_eq!(reset_after(Some("soon"), 1_000_000), DEFAULT_RESET);
    }

    #[test]
    fn test_search_response_deserializes() {
        let body = r#"{
            "data": [
                {"id": "201", "author_id": "2", "created_at": "2021-01-18T01:00:00.000Z"}
            ],
            "includes": {
                "tweets": [{"id": "100", "author_id": "1", "created_at": "2021-01-18T00:00:00.000Z"}]
            },
            "meta": {"next_token": "abc"}
        }"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(
            response.includes.unwrap().tweets[0].id.as_deref(),
            Some("100")
        );
        assert_eq!(response.meta.unwrap().next_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_search_response_tolerates_missing_fields() {
        let response: SearchResponse = serde_json::from_str(r#"{"meta": {}}"#).unwrap();
        assert!(response.data.is_empty());
        assert!(response.meta.unwrap().next_token.is_none());
    }

    #[test]
    fn test_following_response_deserializes() {
        let body = r#"{"data": [{"id": "12"}, {"id": "34"}], "meta": {"next_token": null}}"#;
        let response: FollowingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.data.len(), 2);
        assert!(response.meta.unwrap().next_token.is_none());
    }

    #[test]
    fn test_api_tweet_into_record() {
        let tweet: ApiTweet = serde_json::from_str(
            r#"{
                "text": "hello",
                "created_at": "2021-01-18T12:00:00.000Z",
                "public_metrics": {"retweet_count": 3, "reply_count": 1, "like_count": 9}
            }"#,
        )
        .unwrap();
        let record = tweet.into_record().unwrap();
        assert_eq!(record.text, "hello");
        assert_eq!(record.like_count, 9);
    }

    #[test]
    fn test_api_tweet_bad_timestamp() {
        let tweet = ApiTweet {
            text: "hello".to_string(),
            created_at: "not a time".to_string(),
            public_metrics: TweetMetrics {
                retweet_count: 0,
                reply_count: 0,
                like_count: 0,
            },
        };
        assert!(matches!(
            tweet.into_record(),
            Err(ProviderError::Other(_))
        ));
    }
}
