//! Bundle verification.
//!
//! [`verify_bundle`] is read-only: it inspects the bundle file and its
//! metadata sidecar and produces a [`VerificationReport`]. Persisting the
//! implied status is the caller's job (see `BundleStore::apply_report`).
//!
//! Check order, short-circuiting only on the first:
//! 1. container integrity: the file must parse as a well-formed bundle;
//! 2. object consistency: prerequisite objects are unresolvable within the
//!    bundle and each one counts as missing;
//! 3. LFS readiness (advisory);
//! 4. metadata completeness (advisory).

use tracing::debug;

use crate::bundle::inspect_bundle;
use crate::record::{BundleRecord, VerificationReport};

/// How many unresolved objects are itemized before the list is elided.
const MAX_LISTED_OBJECTS: usize = 10;

pub fn verify_bundle(record: &BundleRecord) -> VerificationReport {
    let mut report = VerificationReport {
        repo: record.repo.clone(),
        bundle_version: record.version,
        structural_integrity: true,
        missing_objects: 0,
        lfs_configured: true,
        metadata_complete: true,
        issues: Vec::new(),
    };

    // ── 1. Container integrity ────────────────────────────────────────────
    let summary = match inspect_bundle(&record.path) {
        Ok(summary) => summary,
        Err(e) => {
            report.structural_integrity = false;
            report.issues.push(format!("corrupt container: {e}"));
            return report;
        }
    };

    // ── 2. Object consistency ─────────────────────────────────────────────
    report.missing_objects = summary.prerequisites.len();
    for oid in summary.prerequisites.iter().take(MAX_LISTED_OBJECTS) {
        report.issues.push(format!("unresolved object {oid}"));
    }
    if summary.prerequisites.len() > MAX_LISTED_OBJECTS {
        report.issues.push(format!(
            "... and {} more unresolved objects",
            summary.prerequisites.len() - MAX_LISTED_OBJECTS
        ));
    }
    if let Some(filter) = &summary.filter {
        report
            .issues
            .push(format!("bundle was created with object filter '{filter}'"));
    }

    // ── 3. LFS readiness ──────────────────────────────────────────────────
    match &record.meta {
        Some(meta) if meta.lfs.tracks_lfs => {
            if !meta.lfs.content_fetched {
                report.lfs_configured = false;
                report.issues.push(format!(
                    "tracks {} LFS pattern(s) but content was not fetched at download time",
                    meta.lfs.patterns.len()
                ));
            } else if !record.lfs_companion {
                report.lfs_configured = false;
                report
                    .issues
                    .push("LFS companion payload is missing from the store".to_string());
            }
        }
        // No metadata, or no LFS patterns: nothing indicates large-file
        // pointers, so there is nothing to warn about here.
        _ => {}
    }

    // ── 4. Metadata completeness ──────────────────────────────────────────
    match &record.meta {
        None => {
            report.metadata_complete = false;
            report.issues.push("metadata sidecar missing".to_string());
        }
        Some(meta) => {
            if meta.repo_id != record.repo {
                report.metadata_complete = false;
                report.issues.push(format!(
                    "metadata names '{}' but the bundle is keyed '{}'",
                    meta.repo_id, record.repo
                ));
            }
            if meta.revision.is_empty() {
                report.metadata_complete = false;
                report.issues.push("metadata lacks a revision".to_string());
            }
            match meta.object_count {
                None => {
                    report.metadata_complete = false;
                    report
                        .issues
                        .push("metadata lacks an object count".to_string());
                }
                Some(n) if n != summary.pack_objects => {
                    report.metadata_complete = false;
                    report.issues.push(format!(
                        "metadata object count {n} disagrees with pack ({})",
                        summary.pack_objects
                    ));
                }
                Some(_) => {}
            }
        }
    }

    debug!(
        repo = %record.repo,
        passing = report.passing(),
        missing = report.missing_objects,
        "verified bundle"
    );
    report
}
