use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One repost of the original post, in canonical form. Both raw source
/// shapes normalize into this; nothing downstream branches on where a
/// record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetweetEvent {
    pub tweet_id: String,
    pub author_id: u64,
    pub created_at: DateTime<Utc>,
}

/// Inferred parent→child relationship: the child's repost was most
/// plausibly surfaced via the parent's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffusionEdge {
    pub parent_tweet_id: String,
    pub child_tweet_id: String,
}

/// Directed "follows" relation among accounts, keyed by follower id.
///
/// Partial by design: an account absent from the map is unresolved, and
/// every consumer treats it as an empty follow set, never as an error.
#[derive(Debug, Clone, Default)]
pub struct SocialGraph {
    follows: HashMap<u64, HashSet<u64>>,
}

impl SocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the complete follow set for one account. Keys are disjoint
    /// across resolver lookups, so each account is written exactly once.
    pub fn insert(&mut self, account_id: u64, followed: HashSet<u64>) {
        self.follows.insert(account_id, followed);
    }

    /// Whether `follower` follows `followee`. Unresolved accounts follow
    /// no one.
    pub fn follows(&self, follower: u64, followee: u64) -> bool {
        self.follows
            .get(&follower)
            .is_some_and(|set| set.contains(&followee))
    }

    pub fn contains(&self, account_id: u64) -> bool {
        self.follows.contains_key(&account_id)
    }

    pub fn len(&self) -> usize {
        self.follows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.follows.is_empty()
    }
}

impl FromIterator<(u64, HashSet<u64>)> for SocialGraph {
    fn from_iter<I: IntoIterator<Item = (u64, HashSet<u64>)>>(iter: I) -> Self {
        Self {
            follows: iter.into_iter().collect(),
        }
    }
}

impl<'de> Deserialize<'de> for SocialGraph {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let follows = HashMap::<u64, HashSet<u64>>::deserialize(deserializer)?;
        Ok(Self { follows })
    }
}

/// A retweeting account with its follower count, for ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retweeter {
    pub username: String,
    pub followers: u64,
}

/// Engagement metrics for one tweet, used by benchmark comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub retweet_count: u64,
    pub reply_count: u64,
    pub like_count: u64,
}

/// Elapsed time decomposed into whole days/hours/minutes/seconds,
/// truncated to whole seconds and clamped non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationTime {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl PropagationTime {
    pub fn from_duration(elapsed: chrono::Duration) -> Self {
        let total = elapsed.num_seconds().max(0);
        let days = total / 86_400;
        let rem = total % 86_400;
        let hours = rem / 3_600;
        let rem = rem % 3_600;
        Self {
            days,
            hours,
            minutes: rem / 60,
            seconds: rem % 60,
        }
    }
}

impl fmt::Display for PropagationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} days, {} hours, {} minutes, {} seconds",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}
