//! # modelvault-hub
//!
//! Hub-facing half of modelvault: a thin HTTP client for the model hosting
//! platform's API (repository listings, file sizes, repo management for
//! mirroring) and async wrappers around the system `git` / `git-lfs`
//! binaries used to produce and publish bundles.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use modelvault_hub::{HubClient, HubResult};
//!
//! #[tokio::main]
//! async fn main() -> HubResult<()> {
//!     let hub = HubClient::new("https://huggingface.co")?;
//!     for model in hub.list_models("deepseek-ai").await? {
//!         println!("{}", model.id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod error;
pub mod git;
pub mod lfs;

pub use api::{HubClient, ModelSummary, RepoFile, DEFAULT_ENDPOINT};
pub use error::{HubError, HubResult};
