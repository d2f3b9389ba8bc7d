//! Propagation time, follower ranking, and engagement benchmarking over
//! the same event primitives the cascade pipeline uses.

use crate::cascade::Cascade;
use crate::error::Error;
use crate::model::{BenchmarkRecord, PropagationTime, Retweeter};
use crate::sources::EngagementSource;

/// Elapsed time from the original post to the `rank`-th repost, clamped
/// to the last event when `rank` exceeds the cascade.
pub fn propagation_time(cascade: &Cascade, rank: usize) -> PropagationTime {
    let events = cascade.events();
    let target = &events[rank.min(events.len() - 1)];
    PropagationTime::from_duration(target.created_at - cascade.root().created_at)
}

/// Order retweeters descending by follower count. The sort is stable, so
/// equal counts keep their original relative order.
pub fn rank_by_followers(mut retweeters: Vec<Retweeter>) -> Vec<Retweeter> {
    retweeters.sort_by(|a, b| b.followers.cmp(&a.followers));
    retweeters
}

/// Compare a tweet's engagement against the same author's recent history.
/// Row 0 is the target tweet; the rest are up to `count` strictly-earlier
/// tweets (fewer if the author has fewer).
pub async fn benchmark<S: EngagementSource + ?Sized>(
    source: &S,
    author_id: u64,
    tweet_id: &str,
    count: usize,
) -> Result<Vec<BenchmarkRecord>, Error> {
    let target = source.tweet_engagement(tweet_id).await?;
    let prior = source.tweets_before(author_id, tweet_id, count).await?;
    let mut rows = Vec::with_capacity(prior.len().min(count) + 1);
    rows.push(target);
    rows.extend(prior.into_iter().take(count));
    Ok(rows)
}
