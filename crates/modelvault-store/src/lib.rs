//! # modelvault-store
//!
//! Offline bundle storage and the verification/extraction pipeline for
//! modelvault.
//!
//! Every remote model repository is kept as a single self-contained Git
//! bundle under `<storage root>/bundles`, with extracted working trees as a
//! sibling hierarchy under `<storage root>/extracted`. The pipeline runs
//! strictly leaf to root: [`BundleStore`] hands out records,
//! [`verify_bundle`] inspects them, [`plan_extraction`] decides whether a
//! working tree may be materialized, and [`extract`] does the materializing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use modelvault_store::{
//!     extract, plan_extraction, verify_bundle, BundleStore, PlanDecision, RepoId,
//!     StorageLayout,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = BundleStore::open(StorageLayout::new("/data/modelvault"))?;
//!     let repo: RepoId = "acme/model-a".parse()?;
//!     if let Some(record) = store.get(&repo)? {
//!         let report = verify_bundle(&record);
//!         store.apply_report(&report)?;
//!         if let PlanDecision::Proceed(plan) =
//!             plan_extraction(&record, Some(&report), store.layout())?
//!         {
//!             let outcome = extract(&plan, store.layout()).await?;
//!             println!("extracted to {}", outcome.target_dir.display());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod error;
pub mod extract;
pub mod locks;
pub mod plan;
pub mod record;
pub mod store;
pub mod verify;

pub use bundle::{inspect_bundle, sha256_file, BundleSummary, ObjectFormat};
pub use error::{StoreError, StoreResult};
pub use extract::extract;
pub use locks::RepoLocks;
pub use plan::{plan_extraction, ExtractionPlan, PlanDecision};
pub use record::{
    BundleMeta, BundleRecord, BundleStatus, ExtractionRecord, ExtractionStatus, LfsInfo,
    RepoId, VerificationReport,
};
pub use store::{BundleStore, StorageLayout};
pub use verify::verify_bundle;
