//! Reconstructs a plausible propagation path for a viral post: given the
//! flat set of accounts that reposted it and the follow relationships
//! between them, infers who most likely saw-and-shared-from-whom.
//!
//! The pipeline runs one direction: raw records are normalized into
//! canonical events, the cascade builder orders them behind the root, the
//! resolver fetches each participant's follow set, and the inferencer
//! turns the ordered events plus the partial graph into a parent/child
//! tree. Analytics (propagation time, follower ranking, engagement
//! benchmarks) share the same primitives.

pub mod analytics;
pub mod cascade;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod resolver;
pub mod sources;

pub use cascade::{build_cascade_report, infer_diffusion, Cascade, CascadeReport};
pub use error::{Error, ProviderError};
pub use model::{
    BenchmarkRecord, DiffusionEdge, PropagationTime, RetweetEvent, Retweeter, SocialGraph,
};
pub use resolver::{resolve_follow_graph, BackoffPolicy, GraphResolution, UnresolvedAccount};
pub use sources::{EngagementSource, FollowingPage, SocialGraphProvider};
