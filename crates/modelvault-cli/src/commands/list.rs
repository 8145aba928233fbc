//! List bundles known to the store.

use crate::commands::{human_size, open_store, Outcome};
use crate::config::AppConfig;

pub fn run(config: &AppConfig) -> anyhow::Result<Outcome> {
    let store = open_store(config)?;
    let records = store.list()?;

    if records.is_empty() {
        println!("No bundles stored in {}.", store.layout().root().display());
        println!("Use `modelvault download <owner/name>` to fetch a repository.");
        return Ok(Outcome::Success);
    }

    println!(
        "{:<45} {:>12} {:<12} {:>4}  {}",
        "REPOSITORY", "SIZE", "STATUS", "VER", "EXTRACTED"
    );
    println!("{}", "-".repeat(90));
    for record in &records {
        let extracted = match store.read_extraction(&record.repo)? {
            Some(rec) => format!("yes ({})", rec.status),
            None => "-".to_string(),
        };
        println!(
            "{:<45} {:>12} {:<12} {:>4}  {}",
            record.repo.as_str(),
            human_size(record.size_bytes),
            record.status.to_string(),
            record.version,
            extracted
        );
    }
    println!(
        "\n{} bundle(s) in {}",
        records.len(),
        store.layout().root().display()
    );

    Ok(Outcome::Success)
}
