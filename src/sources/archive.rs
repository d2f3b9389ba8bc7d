//! Archived-activity files: one JSON array of legacy activity records per
//! original post, as exported by the old streaming archive.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::SocialGraph;
use crate::normalize::ArchivedActivity;

/// Load a JSON array of archived activity records from disk.
pub fn load_activities(path: &Path) -> Result<Vec<ArchivedActivity>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read archive file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid archive file: {}", path.display()))
}

/// Load a pre-resolved follow graph from a JSON object mapping account
/// ids to arrays of followed account ids, for offline inference.
pub fn load_follow_graph(path: &Path) -> Result<SocialGraph> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read follow graph file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid follow graph file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_activities() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "id": "tag:search.twitter.com,2005:201",
                "postedTime": "2021-01-18T01:00:00.000Z",
                "actor": {{"id": "id:twitter.com:2", "preferredUsername": "someone", "followersCount": 42}},
                "object": {{"id": "tag:search.twitter.com,2005:100", "postedTime": "2021-01-18T00:00:00.000Z", "actor": {{"id": "id:twitter.com:1"}}}}
            }}]"#
        )
        .unwrap();
        let activities = load_activities(file.path()).unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(
            activities[0].actor.as_ref().unwrap().followers_count,
            Some(42)
        );
    }

    #[test]
    fn test_load_activities_missing_file() {
        let err = load_activities(Path::new("/nonexistent/archive.json")).unwrap_err();
        assert!(err.to_string().contains("could not read"));
    }

    #[test]
    fn test_load_activities_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_activities(file.path()).is_err());
    }

    #[test]
    fn test_load_follow_graph() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"2": [1], "3": [1, 2]}}"#).unwrap();
        let graph = load_follow_graph(file.path()).unwrap();
        assert!(graph.follows(3, 2));
        assert!(!graph.follows(2, 3));
    }
}
