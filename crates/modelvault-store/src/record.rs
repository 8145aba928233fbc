use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Characters that are unsafe in file names on at least one supported
/// filesystem. Each is mapped to `_` when building an on-disk slug.
const UNSAFE_CHARS: &[char] = &['\\', ':', '*', '?', '"', '<', '>', '|'];

/// The `owner/name` identifier of a remote repository.
///
/// The id is the unique key across the bundle store; its [`slug`](Self::slug)
/// form is the deterministic on-disk name used for bundle files and
/// extraction directories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(String);

impl RepoId {
    pub fn new(raw: &str) -> StoreResult<Self> {
        let mut parts = raw.splitn(2, '/');
        let owner = parts.next().unwrap_or("");
        let name = parts.next().unwrap_or("");
        if owner.is_empty()
            || name.is_empty()
            || name.contains('/')
            || raw.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(StoreError::InvalidRepoId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn owner(&self) -> &str {
        self.0.split('/').next().unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or("")
    }

    /// Filesystem-safe name: `/` becomes `__`, unsafe characters become `_`.
    pub fn slug(&self) -> String {
        self.0
            .replace('/', "__")
            .chars()
            .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
            .collect()
    }

    /// Recover the id from a slug produced by [`slug`](Self::slug).
    pub fn from_slug(slug: &str) -> StoreResult<Self> {
        Self::new(&slug.replacen("__", "/", 1))
    }
}

impl FromStr for RepoId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a stored bundle. Set to `Unknown` at registration and
/// only changed when a verification report is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleStatus {
    Unknown,
    Valid,
    Invalid,
    LfsWarning,
}

impl fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BundleStatus::Unknown => "unknown",
            BundleStatus::Valid => "valid",
            BundleStatus::Invalid => "invalid",
            BundleStatus::LfsWarning => "lfs-warning",
        };
        f.write_str(s)
    }
}

/// Large-file-storage facts captured at download time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LfsInfo {
    /// `.gitattributes` carries at least one `filter=lfs` rule.
    pub tracks_lfs: bool,
    /// The tracked patterns, e.g. `*.safetensors`.
    pub patterns: Vec<String>,
    /// LFS object content was fetched into the companion payload.
    pub content_fetched: bool,
}

/// Metadata sidecar written next to each bundle (`<slug>.bundle.meta.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMeta {
    pub repo_id: RepoId,
    pub revision: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub created: DateTime<Utc>,
    /// Object count read from the bundle's pack header at download time.
    pub object_count: Option<u32>,
    pub git_version: Option<String>,
    pub bundle_format: String,
    pub lfs: LfsInfo,
    /// Monotonic counter, bumped on every re-download. Verification reports
    /// carry the version they saw, so a stale report is detectable without
    /// comparing wall clocks.
    pub version: u64,
    pub status: BundleStatus,
}

/// In-memory view of one stored bundle, assembled by the store from the
/// bundle file and its sidecar.
#[derive(Debug, Clone)]
pub struct BundleRecord {
    pub repo: RepoId,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub version: u64,
    pub status: BundleStatus,
    /// Companion LFS payload directory is present on disk.
    pub lfs_companion: bool,
    pub meta: Option<BundleMeta>,
}

/// Result of one verification run. Immutable once produced and never
/// persisted by the pipeline itself; callers may log or serialize it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub repo: RepoId,
    /// The bundle version this report was computed against.
    pub bundle_version: u64,
    pub structural_integrity: bool,
    pub missing_objects: usize,
    pub lfs_configured: bool,
    pub metadata_complete: bool,
    pub issues: Vec<String>,
}

impl VerificationReport {
    /// A report passes iff the container is structurally sound and every
    /// referenced object resolves within the bundle. LFS and metadata flags
    /// are advisory.
    pub fn passing(&self) -> bool {
        self.structural_integrity && self.missing_objects == 0
    }

    /// The bundle status this report implies.
    pub fn status(&self) -> BundleStatus {
        if !self.passing() {
            BundleStatus::Invalid
        } else if !self.lfs_configured {
            BundleStatus::LfsWarning
        } else {
            BundleStatus::Valid
        }
    }
}

/// Final state of a completed extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionStatus {
    /// Working tree is complete, including any LFS content.
    Complete,
    /// Pointer files remain in place; content fetch is up to `git lfs`.
    LfsPending,
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStatus::Complete => f.write_str("complete"),
            ExtractionStatus::LfsPending => f.write_str("lfs-pending"),
        }
    }
}

/// Sidecar written next to each extracted working tree
/// (`<slug>.extract.json`). Removed together with the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub repo_id: RepoId,
    pub target_dir: PathBuf,
    pub extracted_at: DateTime<Utc>,
    pub validated: bool,
    pub status: ExtractionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_id_accepts_owner_name() {
        let id = RepoId::new("deepseek-ai/DeepSeek-V2").unwrap();
        assert_eq!(id.owner(), "deepseek-ai");
        assert_eq!(id.name(), "DeepSeek-V2");
    }

    #[test]
    fn repo_id_rejects_missing_name() {
        assert!(RepoId::new("deepseek-ai").is_err());
        assert!(RepoId::new("deepseek-ai/").is_err());
        assert!(RepoId::new("/model").is_err());
    }

    #[test]
    fn repo_id_rejects_extra_separator_and_whitespace() {
        assert!(RepoId::new("a/b/c").is_err());
        assert!(RepoId::new("a/b c").is_err());
    }

    #[test]
    fn slug_encodes_slash_as_double_underscore() {
        let id = RepoId::new("acme/model-a").unwrap();
        assert_eq!(id.slug(), "acme__model-a");
    }

    #[test]
    fn slug_replaces_unsafe_characters() {
        let id = RepoId::new("acme/mo:del?a").unwrap();
        assert_eq!(id.slug(), "acme__mo_del_a");
    }

    #[test]
    fn slug_roundtrip() {
        let id = RepoId::new("acme/model_a").unwrap();
        assert_eq!(RepoId::from_slug(&id.slug()).unwrap(), id);
    }

    #[test]
    fn passing_requires_integrity_and_zero_missing() {
        let mut report = VerificationReport {
            repo: RepoId::new("a/b").unwrap(),
            bundle_version: 1,
            structural_integrity: true,
            missing_objects: 0,
            lfs_configured: true,
            metadata_complete: true,
            issues: vec![],
        };
        assert!(report.passing());
        assert_eq!(report.status(), BundleStatus::Valid);

        report.missing_objects = 2;
        assert!(!report.passing());
        assert_eq!(report.status(), BundleStatus::Invalid);

        report.missing_objects = 0;
        report.structural_integrity = false;
        assert!(!report.passing());
    }

    #[test]
    fn advisory_flags_do_not_block() {
        let report = VerificationReport {
            repo: RepoId::new("a/b").unwrap(),
            bundle_version: 1,
            structural_integrity: true,
            missing_objects: 0,
            lfs_configured: false,
            metadata_complete: false,
            issues: vec!["advisory".into()],
        };
        assert!(report.passing());
        assert_eq!(report.status(), BundleStatus::LfsWarning);
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&BundleStatus::LfsWarning).unwrap();
        assert_eq!(json, "\"lfs-warning\"");
        let json = serde_json::to_string(&ExtractionStatus::LfsPending).unwrap();
        assert_eq!(json, "\"lfs-pending\"");
    }
}
