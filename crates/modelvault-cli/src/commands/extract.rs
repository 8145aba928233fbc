//! Selectively extract stored bundles into working trees.
//!
//! Every extraction is re-verified first, so the planner always sees a
//! report for the bundle version actually on disk; a stale report can
//! never smuggle an invalid bundle past the executor.

use std::sync::Arc;

use modelvault_store::{
    extract as run_extract, plan_extraction, verify_bundle, BundleStore, ExtractionStatus,
    PlanDecision, RepoId,
};

use crate::batch::{run_batch, TaskStatus};
use crate::commands::{human_size, known_repos, open_store, parse_repo_args, Outcome};
use crate::config::AppConfig;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    repos: &[String],
    all: bool,
    list: bool,
    force: bool,
    dry_run: bool,
    workers: Option<usize>,
    config: &AppConfig,
) -> anyhow::Result<Outcome> {
    let store = open_store(config)?;

    if list {
        let records = store.list()?;
        if records.is_empty() {
            println!("No downloaded repositories found.");
            return Ok(Outcome::Success);
        }
        println!("Available repositories:");
        for record in records {
            let extracted = match store.read_extraction(&record.repo)? {
                Some(_) => " (extracted)",
                None => "",
            };
            println!(
                "- {} [{}, {}]{}",
                record.repo,
                human_size(record.size_bytes),
                record.status,
                extracted
            );
        }
        return Ok(Outcome::Success);
    }

    let ids = if !repos.is_empty() {
        parse_repo_args(repos)?
    } else if all {
        known_repos(&store)?
    } else {
        println!("Specify repository ids to extract, or use --all / --list.");
        return Ok(Outcome::Success);
    };
    if ids.is_empty() {
        println!("No downloaded repositories found.");
        return Ok(Outcome::Success);
    }

    let workers = workers.unwrap_or(config.download.workers);
    let store = Arc::new(store);
    let summary = run_batch(ids, workers, move |repo| {
        let store = store.clone();
        async move { extract_one(&store, &repo, force, dry_run).await }
    })
    .await;

    summary.print("Extraction summary");
    if summary.has_failures() {
        Ok(Outcome::DataFailure)
    } else {
        Ok(Outcome::Success)
    }
}

async fn extract_one(store: &BundleStore, repo: &RepoId, force: bool, dry_run: bool) -> TaskStatus {
    let record = match store.get(repo) {
        Ok(Some(record)) => record,
        Ok(None) => return TaskStatus::Failed("not downloaded".into()),
        Err(e) => return TaskStatus::Failed(e.to_string()),
    };

    // Fresh verification; the report is guaranteed to match the record's
    // current version.
    let report = verify_bundle(&record);
    if !dry_run {
        if let Err(e) = store.apply_report(&report) {
            return TaskStatus::Failed(format!("cannot persist status: {e}"));
        }
    }

    let plan = match plan_extraction(&record, Some(&report), store.layout()) {
        Ok(PlanDecision::Proceed(plan)) => plan,
        Ok(PlanDecision::RejectInvalid) => {
            return TaskStatus::Failed(format!(
                "bundle is invalid, re-download required: {}",
                report.issues.join("; ")
            ))
        }
        Ok(PlanDecision::RejectMissingReport) => {
            return TaskStatus::Failed("no verification report for current bundle".into())
        }
        // Covers PathConflict: foreign data in the target is a per-repo
        // failure, never a reason to touch the directory.
        Err(e) => return TaskStatus::Failed(e.to_string()),
    };

    if plan.already_extracted && !force {
        return TaskStatus::Skipped("already extracted".into());
    }

    if dry_run {
        return TaskStatus::Skipped(format!("dry-run: would extract to {}", plan.target_dir.display()));
    }

    if plan.already_extracted {
        if let Err(e) = store.remove_extraction(repo) {
            return TaskStatus::Failed(format!("cannot clear previous extraction: {e}"));
        }
    }

    match run_extract(&plan, store.layout()).await {
        Ok(outcome) if outcome.status == ExtractionStatus::LfsPending => {
            TaskStatus::Warned(vec![format!(
                "LFS content pending; run `git lfs pull` in {}",
                plan.target_dir.display()
            )])
        }
        Ok(_) => TaskStatus::Done,
        Err(e) => TaskStatus::Failed(e.to_string()),
    }
}
