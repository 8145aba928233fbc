//! Download repositories into the bundle store.
//!
//! Each repository is cloned bare into a scratch directory, snapshotted
//! into a Git bundle with `--all --tags`, inspected, and registered with
//! the store. LFS content, when tracked and enabled, is fetched into the
//! companion payload so later extractions can materialize it offline.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use modelvault_hub::{git, lfs, HubClient};
use modelvault_store::extract::copy_dir_all;
use modelvault_store::{inspect_bundle, BundleStore, LfsInfo, RepoId};

use crate::batch::{run_batch, TaskStatus};
use crate::commands::{open_store, parse_repo_args, Outcome};
use crate::config::AppConfig;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    repos: &[String],
    author: Option<&str>,
    workers: Option<usize>,
    force: bool,
    skip_lfs: bool,
    dry_run: bool,
    config: &AppConfig,
) -> anyhow::Result<Outcome> {
    let store = open_store(config)?;
    let hub = HubClient::new(&config.hub.endpoint)?;

    let ids = if repos.is_empty() {
        let author = author.unwrap_or(&config.hub.author);
        info!(author, "fetching repository list");
        let mut ids = Vec::new();
        for model in hub.list_models(author).await? {
            match RepoId::new(&model.id) {
                Ok(id) => ids.push(id),
                Err(e) => warn!(id = %model.id, error = %e, "skipping unusable repository id"),
            }
        }
        ids
    } else {
        parse_repo_args(repos)?
    };

    if ids.is_empty() {
        println!("No repositories to download.");
        return Ok(Outcome::Success);
    }

    if dry_run {
        for id in &ids {
            if store.get(id)?.is_some() && !force {
                println!("would skip {id} (already downloaded)");
            } else {
                println!("would download {id}");
            }
        }
        return Ok(Outcome::Success);
    }

    let workers = workers.unwrap_or(config.download.workers);
    let include_lfs = config.download.lfs && !skip_lfs;
    println!("Downloading {} repositories with {workers} workers...", ids.len());

    let store = Arc::new(store);
    let hub = Arc::new(hub);
    let summary = run_batch(ids, workers, move |repo| {
        let store = store.clone();
        let hub = hub.clone();
        async move { download_one(&store, &hub, &repo, force, include_lfs).await }
    })
    .await;

    summary.print("Download summary");
    if summary.has_failures() {
        Ok(Outcome::DataFailure)
    } else {
        Ok(Outcome::Success)
    }
}

async fn download_one(
    store: &BundleStore,
    hub: &HubClient,
    repo: &RepoId,
    force: bool,
    include_lfs: bool,
) -> TaskStatus {
    match store.get(repo) {
        Ok(Some(_)) if !force => return TaskStatus::Skipped("already downloaded".into()),
        Ok(_) => {}
        Err(e) => return TaskStatus::Failed(e.to_string()),
    }

    let scratch = match tempfile::tempdir() {
        Ok(d) => d,
        Err(e) => return TaskStatus::Failed(format!("cannot create scratch dir: {e}")),
    };
    let clone_dir = scratch.path().join("repo.git");
    let url = hub.authenticated_url(repo.as_str());

    if let Err(e) = git::clone_bare(&url, &clone_dir).await {
        return TaskStatus::Failed(e.to_string());
    }

    let revision = match git::default_branch(&clone_dir).await {
        Ok(branch) => branch,
        Err(e) => {
            warn!(repo = %repo, error = %e, "default branch detection failed; assuming main");
            "main".to_string()
        }
    };

    let patterns = lfs::fetch_lfs_patterns(repo.as_str(), &revision)
        .await
        .unwrap_or_default();
    let tracks_lfs = !patterns.is_empty();

    let mut content_fetched = false;
    if tracks_lfs && include_lfs {
        match fetch_lfs_payload(store, repo, &clone_dir, &url).await {
            Ok(()) => content_fetched = true,
            Err(reason) => warn!(repo = %repo, reason, "LFS fetch failed; bundle will carry pointers only"),
        }
    }

    // Bundle into the final location via a temp name, so a crash mid-write
    // never leaves a half bundle under the real key.
    let bundle_path = store.layout().bundle_path(repo);
    let tmp_path = bundle_path.with_extension("bundle.tmp");
    if let Err(e) = git::bundle_create(&clone_dir, &tmp_path).await {
        let _ = fs::remove_file(&tmp_path);
        return TaskStatus::Failed(e.to_string());
    }
    if let Err(e) = fs::rename(&tmp_path, &bundle_path) {
        let _ = fs::remove_file(&tmp_path);
        return TaskStatus::Failed(format!("cannot move bundle into store: {e}"));
    }

    // The fresh bundle must itself pass container inspection before it is
    // registered; a bad snapshot is removed rather than stored.
    let object_count = match inspect_bundle(&bundle_path) {
        Ok(summary) => Some(summary.pack_objects),
        Err(e) => {
            let _ = fs::remove_file(&bundle_path);
            return TaskStatus::Failed(format!("created bundle failed inspection: {e}"));
        }
    };

    let lfs_info = LfsInfo {
        tracks_lfs,
        patterns,
        content_fetched,
    };
    let git_version = git::version().await.ok();
    if let Err(e) = store.register(repo, &revision, lfs_info, object_count, git_version) {
        return TaskStatus::Failed(e.to_string());
    }

    if tracks_lfs && !content_fetched {
        TaskStatus::Warned(vec![
            "tracks LFS patterns but content was not fetched".to_string(),
        ])
    } else {
        TaskStatus::Done
    }
}

/// Pull all LFS objects into the bare clone, then move them into the
/// store's companion directory for this repository.
async fn fetch_lfs_payload(
    store: &BundleStore,
    repo: &RepoId,
    clone_dir: &Path,
    url: &str,
) -> Result<(), String> {
    git::lfs_fetch_all(clone_dir, url)
        .await
        .map_err(|e| e.to_string())?;

    let objects = clone_dir.join("lfs").join("objects");
    if !objects.is_dir() {
        return Err("lfs fetch produced no objects directory".to_string());
    }

    let companion = store.layout().lfs_companion_dir(repo);
    if companion.exists() {
        fs::remove_dir_all(&companion).map_err(|e| e.to_string())?;
    }
    copy_dir_all(&objects, &companion.join("objects")).map_err(|e| e.to_string())?;
    Ok(())
}
