//! On-disk bundle store.
//!
//! Layout under a configurable storage root:
//!
//! ```text
//! <root>/bundles/<slug>.bundle             the bundle itself
//! <root>/bundles/<slug>.bundle.meta.json   metadata sidecar
//! <root>/bundles/<slug>.lfs/               companion LFS object payload
//! <root>/extracted/<slug>/                 extracted working tree
//! <root>/extracted/<slug>.extract.json     extraction record
//! ```
//!
//! Each repository owns a distinct path, so concurrent workers never share
//! a partial file. The store is not a cache: nothing is evicted, removal is
//! always explicit.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::bundle::sha256_file;
use crate::error::{StoreError, StoreResult};
use crate::record::{
    BundleMeta, BundleRecord, BundleStatus, ExtractionRecord, LfsInfo, RepoId,
    VerificationReport,
};

pub const BUNDLE_FORMAT: &str = "git-bundle-v2";

/// Resolved directory layout, read once at startup and passed explicitly
/// into every component that touches the filesystem.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bundles_dir(&self) -> PathBuf {
        self.root.join("bundles")
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.root.join("extracted")
    }

    pub fn bundle_path(&self, repo: &RepoId) -> PathBuf {
        self.bundles_dir().join(format!("{}.bundle", repo.slug()))
    }

    pub fn meta_path(&self, repo: &RepoId) -> PathBuf {
        self.bundles_dir()
            .join(format!("{}.bundle.meta.json", repo.slug()))
    }

    /// Directory holding fetched LFS objects for a bundle, if any.
    pub fn lfs_companion_dir(&self, repo: &RepoId) -> PathBuf {
        self.bundles_dir().join(format!("{}.lfs", repo.slug()))
    }

    pub fn extraction_dir(&self, repo: &RepoId) -> PathBuf {
        self.extracted_dir().join(repo.slug())
    }

    pub fn extraction_record_path(&self, repo: &RepoId) -> PathBuf {
        self.extracted_dir()
            .join(format!("{}.extract.json", repo.slug()))
    }
}

/// Maps each [`RepoId`] to zero or one bundle record.
#[derive(Debug, Clone)]
pub struct BundleStore {
    layout: StorageLayout,
}

impl BundleStore {
    /// Open the store, creating the bundle and extraction directories if
    /// they do not exist yet.
    pub fn open(layout: StorageLayout) -> StoreResult<Self> {
        fs::create_dir_all(layout.bundles_dir())?;
        fs::create_dir_all(layout.extracted_dir())?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Register a freshly downloaded bundle: stat its size, compute its
    /// checksum, bump the version counter past any previous download, and
    /// write the metadata sidecar with status `unknown`.
    pub fn register(
        &self,
        repo: &RepoId,
        revision: &str,
        lfs: LfsInfo,
        object_count: Option<u32>,
        git_version: Option<String>,
    ) -> StoreResult<BundleRecord> {
        let path = self.layout.bundle_path(repo);
        if !path.is_file() {
            return Err(StoreError::NotDownloaded(repo.to_string()));
        }

        let size_bytes = fs::metadata(&path)?.len();
        let version = self
            .read_meta(repo)?
            .map(|m| m.version + 1)
            .unwrap_or(1);

        let meta = BundleMeta {
            repo_id: repo.clone(),
            revision: revision.to_string(),
            size_bytes,
            sha256: sha256_file(&path)?,
            created: Utc::now(),
            object_count,
            git_version,
            bundle_format: BUNDLE_FORMAT.to_string(),
            lfs,
            version,
            status: BundleStatus::Unknown,
        };
        self.write_meta(&meta)?;
        debug!(repo = %repo, version, size_bytes, "registered bundle");

        Ok(self.assemble(repo.clone(), path, size_bytes, Some(meta)))
    }

    /// Look up the record for one repository.
    pub fn get(&self, repo: &RepoId) -> StoreResult<Option<BundleRecord>> {
        let path = self.layout.bundle_path(repo);
        if !path.is_file() {
            return Ok(None);
        }
        let size_bytes = fs::metadata(&path)?.len();
        let meta = self.read_meta(repo)?;
        Ok(Some(self.assemble(repo.clone(), path, size_bytes, meta)))
    }

    /// All known records, sorted by repository id.
    pub fn list(&self) -> StoreResult<Vec<BundleRecord>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(self.layout.bundles_dir())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(slug) = name.strip_suffix(".bundle") else {
                continue;
            };
            let Ok(repo) = RepoId::from_slug(slug) else {
                debug!(file = %name, "skipping bundle with unparseable name");
                continue;
            };
            if let Some(record) = self.get(&repo)? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.repo.as_str().cmp(b.repo.as_str()));
        Ok(records)
    }

    /// Persist the status a verification report implies. The report itself
    /// is not stored; only the status and the verified version stamp move
    /// into the sidecar.
    pub fn apply_report(&self, report: &VerificationReport) -> StoreResult<BundleStatus> {
        let status = report.status();
        if let Some(mut meta) = self.read_meta(&report.repo)? {
            meta.status = status;
            self.write_meta(&meta)?;
        }
        debug!(repo = %report.repo, %status, "applied verification report");
        Ok(status)
    }

    /// Remove a bundle, its sidecar, and its LFS companion payload.
    /// Returns `true` if anything was deleted.
    pub fn remove(&self, repo: &RepoId) -> StoreResult<bool> {
        let mut removed = false;
        let bundle = self.layout.bundle_path(repo);
        if bundle.exists() {
            fs::remove_file(&bundle)?;
            removed = true;
        }
        let meta = self.layout.meta_path(repo);
        if meta.exists() {
            fs::remove_file(&meta)?;
            removed = true;
        }
        let companion = self.layout.lfs_companion_dir(repo);
        if companion.exists() {
            fs::remove_dir_all(&companion)?;
            removed = true;
        }
        Ok(removed)
    }

    /// Remove an extracted working tree and its extraction record.
    pub fn remove_extraction(&self, repo: &RepoId) -> StoreResult<bool> {
        let mut removed = false;
        let dir = self.layout.extraction_dir(repo);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            removed = true;
        }
        let record = self.layout.extraction_record_path(repo);
        if record.exists() {
            fs::remove_file(&record)?;
            removed = true;
        }
        Ok(removed)
    }

    /// Read the extraction record for a repository, if one exists.
    pub fn read_extraction(&self, repo: &RepoId) -> StoreResult<Option<ExtractionRecord>> {
        let path = self.layout.extraction_record_path(repo);
        if !path.is_file() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn assemble(
        &self,
        repo: RepoId,
        path: PathBuf,
        size_bytes: u64,
        meta: Option<BundleMeta>,
    ) -> BundleRecord {
        let lfs_companion = self.layout.lfs_companion_dir(&repo).is_dir();
        BundleRecord {
            version: meta.as_ref().map(|m| m.version).unwrap_or(0),
            status: meta
                .as_ref()
                .map(|m| m.status)
                .unwrap_or(BundleStatus::Unknown),
            repo,
            path,
            size_bytes,
            lfs_companion,
            meta,
        }
    }

    fn read_meta(&self, repo: &RepoId) -> StoreResult<Option<BundleMeta>> {
        let path = self.layout.meta_path(repo);
        if !path.is_file() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        match serde_json::from_str(&json) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                debug!(repo = %repo, error = %e, "unreadable metadata sidecar");
                Ok(None)
            }
        }
    }

    fn write_meta(&self, meta: &BundleMeta) -> StoreResult<()> {
        let path = self.layout.meta_path(&meta.repo_id);
        let json = serde_json::to_string_pretty(meta)?;
        fs::write(&path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (BundleStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = BundleStore::open(StorageLayout::new(dir.path())).unwrap();
        (store, dir)
    }

    fn seed_bundle(store: &BundleStore, repo: &RepoId, bytes: &[u8]) {
        fs::write(store.layout().bundle_path(repo), bytes).unwrap();
    }

    #[test]
    fn layout_paths_are_siblings_under_root() {
        let layout = StorageLayout::new("/data/vault");
        let repo = RepoId::new("acme/model-a").unwrap();
        assert_eq!(
            layout.bundle_path(&repo),
            PathBuf::from("/data/vault/bundles/acme__model-a.bundle")
        );
        assert_eq!(
            layout.extraction_dir(&repo),
            PathBuf::from("/data/vault/extracted/acme__model-a")
        );
    }

    #[test]
    fn get_returns_none_when_not_downloaded() {
        let (store, _dir) = open_store();
        let repo = RepoId::new("acme/missing").unwrap();
        assert!(store.get(&repo).unwrap().is_none());
    }

    #[test]
    fn register_writes_sidecar_with_unknown_status() {
        let (store, _dir) = open_store();
        let repo = RepoId::new("acme/model-a").unwrap();
        seed_bundle(&store, &repo, b"bundle bytes");

        let record = store
            .register(&repo, "main", LfsInfo::default(), Some(4), None)
            .unwrap();
        assert_eq!(record.status, BundleStatus::Unknown);
        assert_eq!(record.version, 1);
        assert_eq!(record.size_bytes, 12);

        let meta = record.meta.unwrap();
        assert_eq!(meta.revision, "main");
        assert_eq!(meta.object_count, Some(4));
        assert!(!meta.sha256.is_empty());
    }

    #[test]
    fn register_bumps_version_on_redownload() {
        let (store, _dir) = open_store();
        let repo = RepoId::new("acme/model-a").unwrap();
        seed_bundle(&store, &repo, b"first");
        let r1 = store
            .register(&repo, "main", LfsInfo::default(), None, None)
            .unwrap();
        seed_bundle(&store, &repo, b"second download");
        let r2 = store
            .register(&repo, "main", LfsInfo::default(), None, None)
            .unwrap();
        assert_eq!(r1.version, 1);
        assert_eq!(r2.version, 2);
        // Re-registration resets the status to unknown.
        assert_eq!(r2.status, BundleStatus::Unknown);
    }

    #[test]
    fn register_fails_without_bundle_file() {
        let (store, _dir) = open_store();
        let repo = RepoId::new("acme/model-a").unwrap();
        let err = store
            .register(&repo, "main", LfsInfo::default(), None, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotDownloaded(_)));
    }

    #[test]
    fn list_returns_sorted_records() {
        let (store, _dir) = open_store();
        for id in ["zeta/model", "acme/model"] {
            let repo = RepoId::new(id).unwrap();
            seed_bundle(&store, &repo, b"x");
            store
                .register(&repo, "main", LfsInfo::default(), None, None)
                .unwrap();
        }
        let listed: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|r| r.repo.to_string())
            .collect();
        assert_eq!(listed, vec!["acme/model", "zeta/model"]);
    }

    #[test]
    fn apply_report_persists_status() {
        let (store, _dir) = open_store();
        let repo = RepoId::new("acme/model-a").unwrap();
        seed_bundle(&store, &repo, b"x");
        store
            .register(&repo, "main", LfsInfo::default(), None, None)
            .unwrap();

        let report = VerificationReport {
            repo: repo.clone(),
            bundle_version: 1,
            structural_integrity: false,
            missing_objects: 0,
            lfs_configured: true,
            metadata_complete: true,
            issues: vec!["corrupt container: test".into()],
        };
        let status = store.apply_report(&report).unwrap();
        assert_eq!(status, BundleStatus::Invalid);
        assert_eq!(
            store.get(&repo).unwrap().unwrap().status,
            BundleStatus::Invalid
        );
    }

    #[test]
    fn remove_deletes_bundle_sidecar_and_companion() {
        let (store, _dir) = open_store();
        let repo = RepoId::new("acme/model-a").unwrap();
        seed_bundle(&store, &repo, b"x");
        store
            .register(&repo, "main", LfsInfo::default(), None, None)
            .unwrap();
        fs::create_dir_all(store.layout().lfs_companion_dir(&repo).join("objects")).unwrap();

        assert!(store.remove(&repo).unwrap());
        assert!(store.get(&repo).unwrap().is_none());
        assert!(!store.layout().lfs_companion_dir(&repo).exists());
        // Second removal is a no-op.
        assert!(!store.remove(&repo).unwrap());
    }

    #[test]
    fn record_without_sidecar_has_version_zero() {
        let (store, _dir) = open_store();
        let repo = RepoId::new("acme/model-a").unwrap();
        seed_bundle(&store, &repo, b"x");
        let record = store.get(&repo).unwrap().unwrap();
        assert_eq!(record.version, 0);
        assert_eq!(record.status, BundleStatus::Unknown);
        assert!(record.meta.is_none());
    }
}
