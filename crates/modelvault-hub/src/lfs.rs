//! Large-file-storage detection.
//!
//! A repository tracks LFS content when its `.gitattributes` carries
//! `filter=lfs` rules. The file is fetched through the hub's single-file
//! API before cloning, so downloads know up front whether an LFS payload
//! needs to be collected.

use hf_hub::api::tokio::ApiBuilder;
use hf_hub::{Repo, RepoType};
use tracing::{debug, warn};

use crate::error::HubResult;

/// Parse `.gitattributes` content into the list of LFS-tracked patterns.
pub fn parse_gitattributes(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| line.contains("filter=lfs"))
        .filter_map(|line| line.split_whitespace().next())
        .map(String::from)
        .collect()
}

/// Fetch a repository's `.gitattributes` and return its LFS patterns.
///
/// A repository without the file (or one we cannot read) simply tracks no
/// LFS content; fetch errors are logged, not propagated.
pub async fn fetch_lfs_patterns(repo_id: &str, revision: &str) -> HubResult<Vec<String>> {
    let token = std::env::var("HUGGING_FACE_HUB_TOKEN")
        .ok()
        .filter(|t| !t.is_empty());
    let api = ApiBuilder::new().with_token(token).build()?;
    let repo = api.repo(Repo::with_revision(
        repo_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    match repo.get(".gitattributes").await {
        Ok(path) => {
            let content = std::fs::read_to_string(&path)?;
            let patterns = parse_gitattributes(&content);
            debug!(repo_id, count = patterns.len(), "LFS patterns");
            Ok(patterns)
        }
        Err(e) => {
            warn!(repo_id, error = %e, "no readable .gitattributes; assuming no LFS");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_lfs_patterns() {
        let content = "\
*.safetensors filter=lfs diff=lfs merge=lfs -text
*.bin filter=lfs diff=lfs merge=lfs -text
*.md -text
";
        let patterns = parse_gitattributes(content);
        assert_eq!(patterns, vec!["*.safetensors", "*.bin"]);
    }

    #[test]
    fn no_lfs_rules_means_empty() {
        assert!(parse_gitattributes("*.md -text\n*.py text\n").is_empty());
        assert!(parse_gitattributes("").is_empty());
    }

    #[test]
    fn ignores_malformed_lines() {
        // A line that mentions the filter but has no pattern token still
        // yields nothing useful; whitespace-only lines are skipped.
        let patterns = parse_gitattributes("   \n*.pt filter=lfs\n");
        assert_eq!(patterns, vec!["*.pt"]);
    }
}
