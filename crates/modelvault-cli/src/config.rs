use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use modelvault_hub::DEFAULT_ENDPOINT;

/// Full runtime configuration loaded from TOML + env vars.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub hub: HubConfig,
    pub download: DownloadConfig,
    pub verify: VerifyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory holding the `bundles/` and `extracted/` trees.
    pub root: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HubConfig {
    pub endpoint: String,
    /// Account whose repositories are managed when none are named.
    pub author: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Parallel download workers.
    pub workers: usize,
    /// Fetch LFS content into the companion payload at download time.
    pub lfs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifyConfig {
    /// Treat incomplete metadata as a verification failure instead of a
    /// warning.
    pub strict: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                root: "~/.cache/modelvault".to_string(),
            },
            hub: HubConfig {
                endpoint: DEFAULT_ENDPOINT.to_string(),
                author: "deepseek-ai".to_string(),
            },
            download: DownloadConfig {
                workers: 4,
                lfs: true,
            },
            verify: VerifyConfig { strict: false },
        }
    }
}

/// Load configuration from:
/// 1. Built-in defaults
/// 2. `config/default.toml` (if present)
/// 3. A custom config file path (if provided)
/// 4. Environment variables prefixed with `MODELVAULT_`
///    (e.g. `MODELVAULT_STORAGE_ROOT` overrides `storage.root`)
pub fn load_config(config_file: Option<&PathBuf>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        // Layer 1: defaults baked in
        .set_default("storage.root", "~/.cache/modelvault")?
        .set_default("hub.endpoint", DEFAULT_ENDPOINT)?
        .set_default("hub.author", "deepseek-ai")?
        .set_default("download.workers", 4_i64)?
        .set_default("download.lfs", true)?
        .set_default("verify.strict", false)?
        // Layer 2: project default.toml
        .add_source(File::with_name("config/default").required(false));

    // Layer 3: optional user-supplied config file
    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    // Layer 4: environment variables (MODELVAULT_STORAGE_ROOT, etc.)
    builder = builder.add_source(
        Environment::with_prefix("MODELVAULT")
            .separator("_")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// Expand `~` in the storage root to the actual home directory.
pub fn expand_storage_root(raw: &str) -> PathBuf {
    if raw.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(raw.trim_start_matches("~/"));
        }
    }
    PathBuf::from(raw)
}
