//! Extraction planning.
//!
//! The planner sits between verification and extraction: given a record and
//! its latest report it decides whether materializing a working tree is
//! permitted, and where.

use std::fs;

use crate::error::{StoreError, StoreResult};
use crate::record::{BundleRecord, RepoId, VerificationReport};
use crate::store::StorageLayout;

/// Outcome of planning one extraction.
#[derive(Debug)]
pub enum PlanDecision {
    Proceed(ExtractionPlan),
    /// The latest report does not pass; the bundle must be re-downloaded.
    RejectInvalid,
    /// No report exists for the bundle's current version. Re-verify and
    /// plan again rather than trusting stale data.
    RejectMissingReport,
}

/// Everything the executor needs to materialize a working tree.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    pub repo: RepoId,
    pub bundle_path: std::path::PathBuf,
    /// Companion LFS payload, when the store holds one.
    pub lfs_companion: Option<std::path::PathBuf>,
    pub target_dir: std::path::PathBuf,
    /// The target already holds a previous extraction of this repository.
    pub already_extracted: bool,
}

/// Decide whether `record` may be extracted.
///
/// Errors with [`StoreError::PathConflict`] when the deterministic target
/// directory is occupied by non-empty data that is not a previous
/// extraction; foreign user data is never silently overwritten.
pub fn plan_extraction(
    record: &BundleRecord,
    report: Option<&VerificationReport>,
    layout: &StorageLayout,
) -> StoreResult<PlanDecision> {
    let report = match report {
        Some(r) if r.bundle_version == record.version => r,
        // Absent, or computed against an older download of the same repo.
        _ => return Ok(PlanDecision::RejectMissingReport),
    };

    if !report.passing() {
        return Ok(PlanDecision::RejectInvalid);
    }

    let target_dir = layout.extraction_dir(&record.repo);
    let mut already_extracted = false;
    if target_dir.exists() {
        let is_ours = layout.extraction_record_path(&record.repo).is_file()
            || target_dir.join(".git").is_dir();
        if is_ours {
            already_extracted = true;
        } else if dir_is_nonempty(&target_dir)? {
            return Err(StoreError::PathConflict { path: target_dir });
        }
    }

    let companion = layout.lfs_companion_dir(&record.repo);
    Ok(PlanDecision::Proceed(ExtractionPlan {
        repo: record.repo.clone(),
        bundle_path: record.path.clone(),
        lfs_companion: companion.is_dir().then_some(companion),
        target_dir,
        already_extracted,
    }))
}

fn dir_is_nonempty(path: &std::path::Path) -> StoreResult<bool> {
    Ok(fs::read_dir(path)?.next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::BundleStatus;
    use tempfile::TempDir;

    fn fixture(version: u64) -> (BundleRecord, StorageLayout, TempDir) {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        std::fs::create_dir_all(layout.bundles_dir()).unwrap();
        std::fs::create_dir_all(layout.extracted_dir()).unwrap();
        let repo = RepoId::new("acme/model-a").unwrap();
        let record = BundleRecord {
            path: layout.bundle_path(&repo),
            repo,
            size_bytes: 1024,
            version,
            status: BundleStatus::Unknown,
            lfs_companion: false,
            meta: None,
        };
        (record, layout, dir)
    }

    fn passing_report(record: &BundleRecord) -> VerificationReport {
        VerificationReport {
            repo: record.repo.clone(),
            bundle_version: record.version,
            structural_integrity: true,
            missing_objects: 0,
            lfs_configured: true,
            metadata_complete: true,
            issues: vec![],
        }
    }

    #[test]
    fn proceeds_for_passing_report() {
        let (record, layout, _dir) = fixture(1);
        let report = passing_report(&record);
        match plan_extraction(&record, Some(&report), &layout).unwrap() {
            PlanDecision::Proceed(plan) => {
                assert_eq!(plan.target_dir, layout.extraction_dir(&record.repo));
                assert!(!plan.already_extracted);
                assert!(plan.lfs_companion.is_none());
            }
            other => panic!("expected Proceed, got {other:?}"),
        }
    }

    #[test]
    fn rejects_without_report() {
        let (record, layout, _dir) = fixture(1);
        assert!(matches!(
            plan_extraction(&record, None, &layout).unwrap(),
            PlanDecision::RejectMissingReport
        ));
    }

    #[test]
    fn rejects_stale_report_after_redownload() {
        let (mut record, layout, _dir) = fixture(1);
        let report = passing_report(&record);
        // Re-download bumps the record's version; the old report no longer
        // speaks for the bytes on disk.
        record.version = 2;
        assert!(matches!(
            plan_extraction(&record, Some(&report), &layout).unwrap(),
            PlanDecision::RejectMissingReport
        ));
    }

    #[test]
    fn rejects_failing_report() {
        let (record, layout, _dir) = fixture(1);
        let mut report = passing_report(&record);
        report.structural_integrity = false;
        assert!(matches!(
            plan_extraction(&record, Some(&report), &layout).unwrap(),
            PlanDecision::RejectInvalid
        ));

        let mut report = passing_report(&record);
        report.missing_objects = 3;
        assert!(matches!(
            plan_extraction(&record, Some(&report), &layout).unwrap(),
            PlanDecision::RejectInvalid
        ));
    }

    #[test]
    fn advisory_flags_still_proceed() {
        let (record, layout, _dir) = fixture(1);
        let mut report = passing_report(&record);
        report.lfs_configured = false;
        report.metadata_complete = false;
        assert!(matches!(
            plan_extraction(&record, Some(&report), &layout).unwrap(),
            PlanDecision::Proceed(_)
        ));
    }

    #[test]
    fn conflicts_on_foreign_nonempty_target() {
        let (record, layout, _dir) = fixture(1);
        let target = layout.extraction_dir(&record.repo);
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("notes.txt"), b"user data").unwrap();

        let err = plan_extraction(&record, Some(&passing_report(&record)), &layout).unwrap_err();
        assert!(matches!(err, StoreError::PathConflict { .. }), "got {err:?}");
    }

    #[test]
    fn empty_target_directory_is_not_a_conflict() {
        let (record, layout, _dir) = fixture(1);
        std::fs::create_dir_all(layout.extraction_dir(&record.repo)).unwrap();
        assert!(matches!(
            plan_extraction(&record, Some(&passing_report(&record)), &layout).unwrap(),
            PlanDecision::Proceed(plan) if !plan.already_extracted
        ));
    }

    #[test]
    fn previous_extraction_is_flagged_not_conflicting() {
        let (record, layout, _dir) = fixture(1);
        let target = layout.extraction_dir(&record.repo);
        std::fs::create_dir_all(target.join(".git")).unwrap();
        std::fs::write(target.join("model.card"), b"x").unwrap();

        match plan_extraction(&record, Some(&passing_report(&record)), &layout).unwrap() {
            PlanDecision::Proceed(plan) => assert!(plan.already_extracted),
            other => panic!("expected Proceed, got {other:?}"),
        }
    }

    #[test]
    fn companion_payload_is_picked_up() {
        let (mut record, layout, _dir) = fixture(1);
        std::fs::create_dir_all(layout.lfs_companion_dir(&record.repo)).unwrap();
        record.lfs_companion = true;
        match plan_extraction(&record, Some(&passing_report(&record)), &layout).unwrap() {
            PlanDecision::Proceed(plan) => assert!(plan.lfs_companion.is_some()),
            other => panic!("expected Proceed, got {other:?}"),
        }
    }
}
