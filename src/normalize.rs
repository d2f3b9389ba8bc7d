//! Converts raw source records into canonical [`RetweetEvent`]s.
//!
//! Two incompatible shapes arrive here: the live API's flat records and
//! archived activity records with colon-delimited composite ids. Nothing
//! past this module knows which shape a cascade came from.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::error::Error;
use crate::model::{RetweetEvent, Retweeter};

/// Flat tweet record from the live search API. Also used for the original
/// post delivered once via the `includes` expansion.
///
/// Fields are optional so one bad record cannot fail deserialization of a
/// whole page; validation happens per record in [`normalize_live`].
#[derive(Debug, Clone, Deserialize)]
pub struct LiveTweet {
    pub id: Option<String>,
    pub author_id: Option<String>,
    pub created_at: Option<String>,
}

/// Archived activity record (legacy Gnip schema). The activity itself is
/// the retweet; the nested `object` is the original post it shares.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchivedActivity {
    pub id: Option<String>,
    #[serde(rename = "postedTime")]
    pub posted_time: Option<String>,
    pub actor: Option<ArchivedActor>,
    pub object: Option<ArchivedObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchivedActor {
    pub id: Option<String>,
    #[serde(rename = "preferredUsername")]
    pub preferred_username: Option<String>,
    #[serde(rename = "followersCount")]
    pub followers_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchivedObject {
    pub id: Option<String>,
    #[serde(rename = "postedTime")]
    pub posted_time: Option<String>,
    pub actor: Option<ArchivedActor>,
}

/// A normalized batch: the original post plus its retweet events, in
/// arrival order (the cascade builder owns ordering).
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub root: RetweetEvent,
    pub retweets: Vec<RetweetEvent>,
}

/// Strip the colon-delimited type prefix from a composite id like
/// `"tag:search.twitter.com,2005:12345"` or `"id:twitter.com:67890"`.
pub fn parse_composite_id(raw: &str) -> Result<&str, Error> {
    let idx = raw
        .rfind(':')
        .ok_or_else(|| Error::MalformedRecord(format!("id without type prefix: {raw:?}")))?;
    let id = &raw[idx + 1..];
    if id.is_empty() {
        return Err(Error::MalformedRecord(format!("empty id in {raw:?}")));
    }
    Ok(id)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| Error::MalformedRecord(format!("unparsable timestamp: {raw:?}")))
}

fn parse_account_id(raw: &str) -> Result<u64, Error> {
    raw.parse()
        .map_err(|_| Error::MalformedRecord(format!("non-numeric account id: {raw:?}")))
}

/// Normalize one live record.
pub fn normalize_live(record: &LiveTweet) -> Result<RetweetEvent, Error> {
    let tweet_id = record
        .id
        .clone()
        .ok_or_else(|| Error::MalformedRecord("live record missing id".to_string()))?;
    let author_id = record
        .author_id
        .as_deref()
        .ok_or_else(|| Error::MalformedRecord("live record missing author_id".to_string()))?;
    let created_at = record
        .created_at
        .as_deref()
        .ok_or_else(|| Error::MalformedRecord("live record missing created_at".to_string()))?;
    Ok(RetweetEvent {
        tweet_id,
        author_id: parse_account_id(author_id)?,
        created_at: parse_timestamp(created_at)?,
    })
}

/// Normalize one archived activity. The composite prefixes on both the
/// activity id and the actor id are stripped here and nowhere else.
pub fn normalize_archived(record: &ArchivedActivity) -> Result<RetweetEvent, Error> {
    let raw_id = record
        .id
        .as_deref()
        .ok_or_else(|| Error::MalformedRecord("archived record missing id".to_string()))?;
    let actor_id = record
        .actor
        .as_ref()
        .and_then(|a| a.id.as_deref())
        .ok_or_else(|| Error::MalformedRecord("archived record missing actor id".to_string()))?;
    let posted_time = record
        .posted_time
        .as_deref()
        .ok_or_else(|| Error::MalformedRecord("archived record missing postedTime".to_string()))?;
    Ok(RetweetEvent {
        tweet_id: parse_composite_id(raw_id)?.to_string(),
        author_id: parse_account_id(parse_composite_id(actor_id)?)?,
        created_at: parse_timestamp(posted_time)?,
    })
}

/// Normalize a live batch: the retweet page data plus the original-post
/// descriptor from the expansion. Malformed retweet records are dropped
/// with a warning; a malformed original is fatal since there is no root
/// without it.
pub fn normalize_live_batch(
    retweets: &[LiveTweet],
    original: &LiveTweet,
) -> Result<NormalizedBatch, Error> {
    let root = normalize_live(original)?;
    let retweets = retweets
        .iter()
        .filter_map(|record| match normalize_live(record) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(%err, "dropping malformed live record");
                None
            }
        })
        .collect();
    Ok(NormalizedBatch { root, retweets })
}

/// Normalize an archived batch. The root is derived from the first
/// record's `object`; records sharing that object are the cascade,
/// records for other posts are skipped (they are foreign, not malformed).
pub fn normalize_archived_batch(records: &[ArchivedActivity]) -> Result<NormalizedBatch, Error> {
    let first_object = records
        .first()
        .and_then(|r| r.object.as_ref())
        .ok_or(Error::EmptyCascade)?;
    let root = normalize_archived_object(first_object)?;

    let retweets = records
        .iter()
        .filter(|record| {
            record
                .object
                .as_ref()
                .and_then(|o| o.id.as_deref())
                .and_then(|id| parse_composite_id(id).ok())
                == Some(root.tweet_id.as_str())
        })
        .filter_map(|record| match normalize_archived(record) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(%err, "dropping malformed archived record");
                None
            }
        })
        .collect();
    Ok(NormalizedBatch { root, retweets })
}

fn normalize_archived_object(object: &ArchivedObject) -> Result<RetweetEvent, Error> {
    let raw_id = object
        .id
        .as_deref()
        .ok_or_else(|| Error::MalformedRecord("archived object missing id".to_string()))?;
    let actor_id = object
        .actor
        .as_ref()
        .and_then(|a| a.id.as_deref())
        .ok_or_else(|| Error::MalformedRecord("archived object missing actor id".to_string()))?;
    let posted_time = object
        .posted_time
        .as_deref()
        .ok_or_else(|| Error::MalformedRecord("archived object missing postedTime".to_string()))?;
    Ok(RetweetEvent {
        tweet_id: parse_composite_id(raw_id)?.to_string(),
        author_id: parse_account_id(parse_composite_id(actor_id)?)?,
        created_at: parse_timestamp(posted_time)?,
    })
}

/// Pull retweeter usernames and follower counts out of archived actor
/// metadata, for follower ranking. Records without both fields are
/// dropped with a warning.
pub fn archived_retweeters(records: &[ArchivedActivity]) -> Vec<Retweeter> {
    records
        .iter()
        .filter_map(|record| {
            let actor = record.actor.as_ref()?;
            match (actor.preferred_username.clone(), actor.followers_count) {
                (Some(username), Some(followers)) => Some(Retweeter {
                    username,
                    followers,
                }),
                _ => {
                    warn!("dropping archived record without actor username/followers");
                    None
                }
            }
        })
        .collect()
}
