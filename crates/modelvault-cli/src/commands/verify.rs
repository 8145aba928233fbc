//! Verify stored bundles and report the results.

use std::sync::{Arc, Mutex};

use modelvault_store::{verify_bundle, VerificationReport};

use crate::batch::{run_batch, TaskStatus};
use crate::commands::{known_repos, open_store, parse_repo_args, Outcome};
use crate::config::AppConfig;

pub async fn run(
    repos: &[String],
    workers: Option<usize>,
    json: bool,
    config: &AppConfig,
) -> anyhow::Result<Outcome> {
    let store = open_store(config)?;

    let ids = if repos.is_empty() {
        known_repos(&store)?
    } else {
        parse_repo_args(repos)?
    };
    if ids.is_empty() {
        println!("No downloaded repositories found.");
        return Ok(Outcome::Success);
    }

    let strict_metadata = config.verify.strict;
    let workers = workers.unwrap_or(config.download.workers);
    println!("Verifying {} repositories...", ids.len());

    let store = Arc::new(store);
    let reports: Arc<Mutex<Vec<VerificationReport>>> = Arc::new(Mutex::new(Vec::new()));

    let reports_sink = reports.clone();
    let summary = run_batch(ids, workers, move |repo| {
        let store = store.clone();
        let reports = reports_sink.clone();
        async move {
            let record = match store.get(&repo) {
                Ok(Some(record)) => record,
                Ok(None) => return TaskStatus::Failed("bundle file missing".into()),
                Err(e) => return TaskStatus::Failed(e.to_string()),
            };

            let report = verify_bundle(&record);
            if let Err(e) = store.apply_report(&report) {
                return TaskStatus::Failed(format!("cannot persist status: {e}"));
            }

            let status = classify(&report, strict_metadata);
            reports.lock().expect("report sink poisoned").push(report);
            status
        }
    })
    .await;

    if json {
        let mut reports = reports.lock().expect("report sink poisoned");
        reports.sort_by(|a, b| a.repo.as_str().cmp(b.repo.as_str()));
        println!("{}", serde_json::to_string_pretty(&*reports)?);
    } else {
        summary.print("Verification results");
    }

    if summary.has_failures() {
        Ok(Outcome::DataFailure)
    } else {
        Ok(Outcome::Success)
    }
}

fn classify(report: &VerificationReport, strict_metadata: bool) -> TaskStatus {
    if !report.passing() {
        return TaskStatus::Failed(report.issues.join("; "));
    }
    if strict_metadata && !report.metadata_complete {
        return TaskStatus::Failed(report.issues.join("; "));
    }
    if !report.lfs_configured || !report.metadata_complete {
        return TaskStatus::Warned(report.issues.clone());
    }
    TaskStatus::Done
}
