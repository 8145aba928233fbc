//! Explicit removal of bundles and extracted trees. Nothing is ever
//! evicted automatically; this command is the only way storage shrinks.

use crate::commands::{known_repos, open_store, parse_repo_args, Outcome};
use crate::config::AppConfig;

pub fn run(
    repos: &[String],
    all: bool,
    extracted_only: bool,
    config: &AppConfig,
) -> anyhow::Result<Outcome> {
    let store = open_store(config)?;

    let ids = if !repos.is_empty() {
        parse_repo_args(repos)?
    } else if all {
        known_repos(&store)?
    } else {
        println!("Specify repository ids to clean, or use --all.");
        return Ok(Outcome::Success);
    };
    if ids.is_empty() {
        println!("Nothing to clean.");
        return Ok(Outcome::Success);
    }

    let mut removed = 0usize;
    let mut failures = Vec::new();
    for repo in &ids {
        let result = if extracted_only {
            store.remove_extraction(repo)
        } else {
            store
                .remove_extraction(repo)
                .and_then(|a| store.remove(repo).map(|b| a || b))
        };
        match result {
            Ok(true) => {
                println!("removed {repo}");
                removed += 1;
            }
            Ok(false) => println!("nothing stored for {repo}"),
            Err(e) => failures.push((repo.to_string(), e.to_string())),
        }
    }

    println!("\nRemoved {removed} of {} repositories.", ids.len());
    if !failures.is_empty() {
        println!("Failures:");
        for (repo, reason) in &failures {
            println!("- {repo}: {reason}");
        }
        return Ok(Outcome::DataFailure);
    }
    Ok(Outcome::Success)
}
