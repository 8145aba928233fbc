//! Report hub-side storage usage per repository.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use modelvault_hub::HubClient;

use crate::commands::{human_size, Outcome};
use crate::config::AppConfig;
use crate::SortOrder;

pub async fn run(
    author: Option<&str>,
    sort: SortOrder,
    top: usize,
    config: &AppConfig,
) -> anyhow::Result<Outcome> {
    let hub = HubClient::new(&config.hub.endpoint)?;
    let author = author.unwrap_or(&config.hub.author);

    let models = hub.list_models(author).await?;
    if models.is_empty() {
        println!("No repositories found for '{author}'.");
        return Ok(Outcome::Success);
    }

    let pb = ProgressBar::new(models.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len}  {wide_msg}")
            .unwrap()
            .progress_chars("##-"),
    );

    let mut sizes: Vec<(String, u64)> = Vec::new();
    for model in &models {
        pb.set_message(model.id.clone());
        match hub.repo_size(&model.id).await {
            Ok(size) if size > 0 => sizes.push((model.id.clone(), size)),
            Ok(_) => {}
            Err(e) => warn!(repo = %model.id, error = %e, "size lookup failed"),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    match sort {
        SortOrder::Asc => sizes.sort_by_key(|(_, size)| *size),
        SortOrder::Desc => {
            sizes.sort_by_key(|(_, size)| *size);
            sizes.reverse();
        }
    }
    if top > 0 {
        sizes.truncate(top);
    }

    let total: u64 = sizes.iter().map(|(_, s)| s).sum();
    println!("{:<50} {:>12}", "REPOSITORY", "SIZE");
    println!("{}", "-".repeat(64));
    for (repo, size) in &sizes {
        println!("{:<50} {:>12}", repo, human_size(*size));
    }
    println!("\n{} repositories, {} total", sizes.len(), human_size(total));

    Ok(Outcome::Success)
}
