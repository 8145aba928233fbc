//! Mirror every repository from one hub account to another.
//!
//! Server-to-server: each source repo is cloned bare with its LFS objects,
//! then the LFS content is pushed before the refs so the target never holds
//! refs whose pointers dangle.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use modelvault_hub::{git, HubClient};

use crate::commands::Outcome;
use crate::config::AppConfig;

pub async fn run(
    from: &str,
    to: &str,
    clean_target: bool,
    yes_delete_remote: bool,
    dry_run: bool,
    config: &AppConfig,
) -> anyhow::Result<Outcome> {
    let hub = HubClient::new(&config.hub.endpoint)?;
    if !hub.has_token() {
        anyhow::bail!("HUGGING_FACE_HUB_TOKEN is required for mirroring");
    }

    let models = hub.list_models(from).await?;
    if models.is_empty() {
        println!("No repositories found for '{from}'.");
        return Ok(Outcome::Success);
    }

    if dry_run {
        if clean_target {
            println!("would delete all repositories under '{to}'");
        }
        for model in &models {
            let name = model.id.rsplit('/').next().unwrap_or(&model.id);
            println!("would mirror {} -> {to}/{name}", model.id);
        }
        return Ok(Outcome::Success);
    }

    if clean_target {
        if !yes_delete_remote {
            anyhow::bail!(
                "--clean-target deletes every repository under '{to}'; \
                pass --yes-delete-remote to confirm"
            );
        }
        for target in hub.list_models(to).await? {
            info!(repo = %target.id, "deleting target repository");
            if let Err(e) = hub.delete_repo(&target.id).await {
                warn!(repo = %target.id, error = %e, "delete failed");
            }
        }
    }

    let pb = ProgressBar::new(models.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len}  {wide_msg}")
            .unwrap()
            .progress_chars("##-"),
    );

    let mut failures = Vec::new();
    for model in &models {
        pb.set_message(model.id.clone());
        if let Err(reason) = mirror_one(&hub, &model.id, to).await {
            failures.push((model.id.clone(), reason));
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "\nMirrored {} of {} repositories.",
        models.len() - failures.len(),
        models.len()
    );
    if !failures.is_empty() {
        println!("Failures:");
        for (repo, reason) in &failures {
            println!("- {repo}");
            println!("    {reason}");
        }
        return Ok(Outcome::DataFailure);
    }
    Ok(Outcome::Success)
}

async fn mirror_one(hub: &HubClient, source: &str, target_owner: &str) -> Result<(), String> {
    let name = source.rsplit('/').next().unwrap_or(source);
    let target = format!("{target_owner}/{name}");

    hub.create_repo(&target).await.map_err(|e| e.to_string())?;

    let scratch = tempfile::tempdir().map_err(|e| e.to_string())?;
    let clone_dir = scratch.path().join("mirror.git");
    let source_url = hub.authenticated_url(source);
    let target_url = hub.authenticated_url(&target);

    git::clone_bare(&source_url, &clone_dir)
        .await
        .map_err(|e| e.to_string())?;
    // LFS objects first, refs last.
    if let Err(e) = git::lfs_fetch_all(&clone_dir, &source_url).await {
        warn!(repo = source, error = %e, "LFS fetch failed; mirroring refs only");
    } else {
        git::lfs_push_all(&clone_dir, &target_url)
            .await
            .map_err(|e| e.to_string())?;
    }
    git::remote_add(&clone_dir, "target", &target_url)
        .await
        .map_err(|e| e.to_string())?;
    git::push_mirror(&clone_dir, "target")
        .await
        .map_err(|e| e.to_string())?;

    Ok(())
}
