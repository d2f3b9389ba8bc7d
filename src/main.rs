use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ripple::analytics::{benchmark, propagation_time, rank_by_followers};
use ripple::cascade::{build_cascade_report, infer_diffusion, Cascade, CascadeReport};
use ripple::config::Config;
use ripple::error::Error;
use ripple::normalize::{archived_retweeters, normalize_archived_batch};
use ripple::resolver::BackoffPolicy;
use ripple::sources::archive::{load_activities, load_follow_graph};
use ripple::sources::twitter::TwitterClient;

#[derive(Parser)]
#[command(name = "ripple", version, about = "Reconstruct retweet cascades and infer diffusion paths")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the cascade for an archived post and infer its diffusion tree
    Cascade {
        /// JSON array of archived activity records
        #[arg(long)]
        retweets: PathBuf,
        /// Pre-resolved follow graph (JSON map of account id to followed
        /// ids); omit to resolve live against the Twitter API
        #[arg(long)]
        graph: Option<PathBuf>,
    },
    /// Rank an archived post's retweeters by follower count
    Rank {
        #[arg(long)]
        retweets: PathBuf,
    },
    /// Time for an archived post to reach its k-th repost
    Propagation {
        #[arg(long)]
        retweets: PathBuf,
        #[arg(short = 'k', long)]
        rank: usize,
    },
    /// Compare a tweet's engagement against the author's recent tweets
    Benchmark {
        #[arg(long)]
        author_id: u64,
        #[arg(long)]
        tweet_id: String,
        #[arg(short, long, default_value_t = 5)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ripple=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Cascade { retweets, graph } => run_cascade(&retweets, graph.as_deref()).await,
        Command::Rank { retweets } => {
            let activities = load_activities(&retweets)?;
            let ranking = rank_by_followers(archived_retweeters(&activities));
            println!("{}", serde_json::to_string_pretty(&ranking)?);
            Ok(())
        }
        Command::Propagation { retweets, rank } => {
            let activities = load_activities(&retweets)?;
            let batch = match normalize_archived_batch(&activities) {
                Err(Error::EmptyCascade) => {
                    println!("no retweet events found");
                    return Ok(());
                }
                other => other?,
            };
            let cascade = Cascade::assemble(batch.root, batch.retweets)?;
            let time = propagation_time(&cascade, rank);
            println!("time to reach {rank} reposts: {time}");
            Ok(())
        }
        Command::Benchmark {
            author_id,
            tweet_id,
            count,
        } => {
            let config = Config::load()?;
            let client = TwitterClient::new(config.twitter.bearer_token);
            let rows = benchmark(&client, author_id, &tweet_id, count).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
            Ok(())
        }
    }
}

async fn run_cascade(retweets: &std::path::Path, graph: Option<&std::path::Path>) -> Result<()> {
    let activities = load_activities(retweets)?;
    let batch = match normalize_archived_batch(&activities) {
        Err(Error::EmptyCascade) => {
            println!("no retweet events found");
            return Ok(());
        }
        other => other?,
    };
    let report = match graph {
        // Offline: inference against a follow graph resolved earlier.
        Some(path) => {
            let follow_graph = load_follow_graph(path)?;
            let cascade = Cascade::assemble(batch.root, batch.retweets)?;
            let edges = infer_diffusion(&cascade, &follow_graph);
            CascadeReport {
                cascade,
                edges,
                unresolved: Vec::new(),
            }
        }
        None => {
            let config = Config::load()?;
            let client = TwitterClient::new(config.twitter.bearer_token);
            build_cascade_report(
                batch.root,
                batch.retweets,
                &client,
                &BackoffPolicy::default(),
            )
            .await?
        }
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
