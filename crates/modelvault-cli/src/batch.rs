//! Batch runner: a fixed-size pool of workers, each processing one
//! repository end-to-end.
//!
//! Failures are isolated per repository: a blocking error stops work on
//! that id only, never the run. Operations on the same id are serialized
//! through [`RepoLocks`]; different ids proceed fully independently.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use modelvault_store::{RepoId, RepoLocks};

const PB_TEMPLATE: &str = "[{bar:40.cyan/blue}] {pos}/{len}  {wide_msg}";

/// Terminal state of one repository's task.
#[derive(Debug)]
pub enum TaskStatus {
    Done,
    Skipped(String),
    Warned(Vec<String>),
    Failed(String),
}

/// Per-run tally, printed as the final summary.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub done: Vec<String>,
    pub skipped: Vec<(String, String)>,
    pub warned: Vec<(String, Vec<String>)>,
    pub failed: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn record(&mut self, repo: &RepoId, status: TaskStatus) {
        let id = repo.to_string();
        match status {
            TaskStatus::Done => self.done.push(id),
            TaskStatus::Skipped(reason) => self.skipped.push((id, reason)),
            TaskStatus::Warned(issues) => self.warned.push((id, issues)),
            TaskStatus::Failed(reason) => self.failed.push((id, reason)),
        }
    }

    pub fn total(&self) -> usize {
        self.done.len() + self.skipped.len() + self.warned.len() + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Print the user-facing summary: counts first, then the specific
    /// issue list for every repository that warned or failed.
    pub fn print(&self, title: &str) {
        println!("\n{title}");
        println!("{}", "-".repeat(title.len()));
        println!("Total repositories: {}", self.total());
        println!("Succeeded: {}", self.done.len());
        if !self.skipped.is_empty() {
            println!("Skipped: {}", self.skipped.len());
        }
        println!("Warnings: {}", self.warned.len());
        println!("Failed: {}", self.failed.len());

        if !self.warned.is_empty() {
            println!("\nWarnings:");
            for (repo, issues) in &self.warned {
                println!("- {repo}");
                for issue in issues {
                    println!("    {issue}");
                }
            }
        }
        if !self.failed.is_empty() {
            println!("\nFailures:");
            for (repo, reason) in &self.failed {
                println!("- {repo}");
                println!("    {reason}");
            }
        }
    }
}

/// Run `op` over every repository with at most `workers` in flight.
pub async fn run_batch<F, Fut>(repos: Vec<RepoId>, workers: usize, op: F) -> BatchSummary
where
    F: Fn(RepoId) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = TaskStatus> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let locks = Arc::new(RepoLocks::new());
    let op = Arc::new(op);

    let pb = ProgressBar::new(repos.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(PB_TEMPLATE)
            .unwrap()
            .progress_chars("##-"),
    );

    let mut tasks = JoinSet::new();
    for repo in repos {
        let semaphore = semaphore.clone();
        let locks = locks.clone();
        let op = op.clone();
        let pb = pb.clone();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore never closes");
            let lock = locks.for_repo(&repo);
            let _guard = lock.lock().await;
            pb.set_message(repo.to_string());
            let status = op(repo.clone()).await;
            pb.inc(1);
            (repo, status)
        });
    }

    let mut summary = BatchSummary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((repo, status)) => summary.record(&repo, status),
            Err(e) => {
                // A panicked worker loses its repo id; surface it without
                // sinking the rest of the batch.
                warn!(error = %e, "worker task panicked");
                summary
                    .failed
                    .push(("<unknown>".to_string(), format!("worker panicked: {e}")));
            }
        }
    }
    pb.finish_and_clear();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(id: &str) -> RepoId {
        RepoId::new(id).unwrap()
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let repos = vec![repo("a/one"), repo("a/two"), repo("a/three")];
        let summary = run_batch(repos, 2, |r| async move {
            if r.name() == "two" {
                TaskStatus::Failed("corrupt container: test".into())
            } else {
                TaskStatus::Done
            }
        })
        .await;

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.done.len(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "a/two");
        assert!(summary.has_failures());
    }

    #[tokio::test]
    async fn worker_cap_limits_concurrency() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
        static PEAK: AtomicUsize = AtomicUsize::new(0);

        let repos: Vec<RepoId> = (0..8).map(|i| repo(&format!("a/m{i}"))).collect();
        let summary = run_batch(repos, 2, |_| async {
            let now = IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
            PEAK.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
            TaskStatus::Done
        })
        .await;

        assert_eq!(summary.done.len(), 8);
        assert!(PEAK.load(Ordering::SeqCst) <= 2, "peak {}", PEAK.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn statuses_land_in_their_buckets() {
        let repos = vec![repo("a/ok"), repo("a/skip"), repo("a/warn")];
        let summary = run_batch(repos, 4, |r| async move {
            match r.name() {
                "skip" => TaskStatus::Skipped("already downloaded".into()),
                "warn" => TaskStatus::Warned(vec!["LFS content pending".into()]),
                _ => TaskStatus::Done,
            }
        })
        .await;

        assert_eq!(summary.done, vec!["a/ok"]);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.warned.len(), 1);
        assert!(!summary.has_failures());
    }
}
