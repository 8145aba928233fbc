pub mod clean;
pub mod download;
pub mod extract;
pub mod list;
pub mod mirror;
pub mod sizes;
pub mod verify;

use anyhow::Context;

use modelvault_store::{BundleStore, RepoId, StorageLayout};

use crate::config::{expand_storage_root, AppConfig};

/// What a command run amounted to, for the process exit status.
/// Operational errors travel as `anyhow::Error` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// One or more repositories failed verification or extraction.
    DataFailure,
}

pub fn open_store(config: &AppConfig) -> anyhow::Result<BundleStore> {
    let root = expand_storage_root(&config.storage.root);
    BundleStore::open(StorageLayout::new(&root))
        .with_context(|| format!("failed to open storage root {}", root.display()))
}

/// Parse repository ids given on the command line. A malformed id is an
/// operational error, not a per-repo data failure.
pub fn parse_repo_args(args: &[String]) -> anyhow::Result<Vec<RepoId>> {
    args.iter()
        .map(|raw| RepoId::new(raw).map_err(anyhow::Error::from))
        .collect()
}

/// Every repository known to the store.
pub fn known_repos(store: &BundleStore) -> anyhow::Result<Vec<RepoId>> {
    Ok(store.list()?.into_iter().map(|r| r.repo).collect())
}

/// Bytes in human-readable form, e.g. `1.37 GB`.
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}
