//! Cascade assembly and diffusion inference.
//!
//! Both stages are pure transformations over already-resolved data: the
//! builder orders events, the inferencer walks the ordered sequence
//! against the follow graph. No I/O, no mutation of inputs.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::Error;
use crate::model::{DiffusionEdge, RetweetEvent, SocialGraph};
use crate::resolver::{resolve_follow_graph, BackoffPolicy, UnresolvedAccount};
use crate::sources::SocialGraphProvider;

/// Chronologically ordered repost events for one original post. Element 0
/// is always the original post itself; the retweets that follow are
/// non-decreasing by `created_at`.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Cascade {
    events: Vec<RetweetEvent>,
}

impl Cascade {
    /// Sort retweets ascending by timestamp (ties broken by tweet id so
    /// ordering is reproducible across input permutations) and prepend
    /// the root. The root is never sorted in with the retweets: it is
    /// first by definition, whatever its own timestamp says.
    pub fn assemble(root: RetweetEvent, mut retweets: Vec<RetweetEvent>) -> Result<Self, Error> {
        if retweets.is_empty() {
            return Err(Error::EmptyCascade);
        }
        retweets.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.tweet_id.cmp(&b.tweet_id))
        });
        let mut events = Vec::with_capacity(retweets.len() + 1);
        events.push(root);
        events.append(&mut retweets);
        Ok(Self { events })
    }

    pub fn root(&self) -> &RetweetEvent {
        &self.events[0]
    }

    pub fn events(&self) -> &[RetweetEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct authors of the retweets, excluding the original poster.
    /// These are the accounts whose follow sets inference needs.
    pub fn retweeting_authors(&self) -> HashSet<u64> {
        self.events[1..].iter().map(|e| e.author_id).collect()
    }
}

/// Infer who saw-and-shared-from-whom.
///
/// For each event after the root, scan backward through earlier events;
/// the nearest-in-time event whose author the reposter follows becomes
/// the parent. No followed author in sight means the repost attaches to
/// the root, which anyone who reposted at all must have seen. The result
/// is always a tree: n−1 edges, every edge pointing strictly backward in
/// chronological order.
pub fn infer_diffusion(cascade: &Cascade, graph: &SocialGraph) -> Vec<DiffusionEdge> {
    let events = cascade.events();
    let mut edges = Vec::with_capacity(events.len().saturating_sub(1));
    for i in 1..events.len() {
        let author = events[i].author_id;
        let parent = events[..i]
            .iter()
            .rev()
            .find(|earlier| graph.follows(author, earlier.author_id))
            .unwrap_or(&events[0]);
        edges.push(DiffusionEdge {
            parent_tweet_id: parent.tweet_id.clone(),
            child_tweet_id: events[i].tweet_id.clone(),
        });
    }
    edges
}

/// Everything one inference call produces. `unresolved` being non-empty
/// means the result is degraded but complete: those accounts contributed
/// empty follow sets.
#[derive(Debug, Serialize)]
pub struct CascadeReport {
    pub cascade: Cascade,
    pub edges: Vec<DiffusionEdge>,
    pub unresolved: Vec<UnresolvedAccount>,
}

impl CascadeReport {
    pub fn is_degraded(&self) -> bool {
        !self.unresolved.is_empty()
    }
}

/// Assemble the cascade, resolve the follow graph for its retweeting
/// authors, and run inference. The single entry point tying the whole
/// pipeline together; nothing is cached across calls.
pub async fn build_cascade_report<P: SocialGraphProvider + ?Sized>(
    root: RetweetEvent,
    retweets: Vec<RetweetEvent>,
    provider: &P,
    policy: &BackoffPolicy,
) -> Result<CascadeReport, Error> {
    let cascade = Cascade::assemble(root, retweets)?;
    let resolution = resolve_follow_graph(provider, &cascade.retweeting_authors(), policy).await?;
    let edges = infer_diffusion(&cascade, &resolution.graph);
    Ok(CascadeReport {
        cascade,
        edges,
        unresolved: resolution.unresolved,
    })
}
