//! Extraction executor.
//!
//! Materializes a working tree from a planned extraction by cloning the
//! bundle with the system `git` binary, then normalizes file permissions
//! and settles LFS content. Any failure removes the target directory
//! entirely; a partial tree is never left behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::Utc;
use tokio::process::Command;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::plan::ExtractionPlan;
use crate::record::{ExtractionRecord, ExtractionStatus};
use crate::store::StorageLayout;

/// First bytes of a git-lfs pointer file.
const LFS_POINTER_PREFIX: &[u8] = b"version https://git-lfs";

/// Removes the extraction target on drop unless disarmed. Covers error
/// returns, panics, and unwinding during process shutdown alike.
struct CleanupGuard {
    path: PathBuf,
    armed: bool,
}

impl CleanupGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Materialize the working tree described by `plan`.
///
/// Pointer files are left in place when no LFS payload is available; the
/// outcome is [`ExtractionStatus::LfsPending`] in that case rather than an
/// error, since content transport belongs to `git lfs` itself.
pub async fn extract(
    plan: &ExtractionPlan,
    layout: &StorageLayout,
) -> StoreResult<ExtractionRecord> {
    let target = &plan.target_dir;
    if target.exists() && fs::read_dir(target)?.next().is_some() {
        return Err(StoreError::ExtractionFailed {
            repo: plan.repo.to_string(),
            reason: "target directory is not empty".to_string(),
        });
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut guard = CleanupGuard::new(target.clone());

    clone_from_bundle(&plan.bundle_path, target)
        .await
        .map_err(|reason| StoreError::ExtractionFailed {
            repo: plan.repo.to_string(),
            reason,
        })?;

    if let Err(missing) = validate_working_tree(target) {
        return Err(StoreError::ExtractionFailed {
            repo: plan.repo.to_string(),
            reason: format!("extracted tree failed validation: missing {missing}"),
        });
    }

    normalize_permissions(target)?;

    let status = settle_lfs(plan, target).await?;

    let record = ExtractionRecord {
        repo_id: plan.repo.clone(),
        target_dir: target.clone(),
        extracted_at: Utc::now(),
        validated: true,
        status,
    };
    let json = serde_json::to_string_pretty(&record)?;
    fs::write(layout.extraction_record_path(&plan.repo), json)?;

    guard.disarm();
    debug!(repo = %plan.repo, %status, "extraction complete");
    Ok(record)
}

async fn clone_from_bundle(bundle: &Path, target: &Path) -> Result<(), String> {
    let mut cmd = Command::new("git");
    cmd.arg("clone").arg(bundle).arg(target);
    // Pointer files stay in place; content fetch is a separate step.
    cmd.env("GIT_LFS_SKIP_SMUDGE", "1");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = cmd
        .output()
        .await
        .map_err(|e| format!("failed to spawn git clone: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "git clone failed (status {}): {}",
            output.status,
            stderr.trim()
        ));
    }
    Ok(())
}

/// Check the cloned tree has the critical repository structure.
fn validate_working_tree(target: &Path) -> Result<(), &'static str> {
    let git_dir = target.join(".git");
    if !git_dir.join("HEAD").is_file() {
        return Err(".git/HEAD");
    }
    if !git_dir.join("objects").is_dir() {
        return Err(".git/objects");
    }
    if !git_dir.join("refs").is_dir() {
        return Err(".git/refs");
    }
    Ok(())
}

/// Make every extracted entry owner-writable. Bundled trees can carry
/// read-only permission bits that later block deletion and editing,
/// particularly on filesystems that surface them as immutable.
fn normalize_permissions(root: &Path) -> StoreResult<()> {
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
        let metadata = entry.metadata().map_err(|e| StoreError::Io(e.into()))?;
        let mut perms = metadata.permissions();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = perms.mode();
            let want = if entry.file_type().is_dir() {
                mode | 0o700
            } else {
                mode | 0o200
            };
            if want != mode {
                perms.set_mode(want);
                fs::set_permissions(entry.path(), perms)?;
            }
        }

        #[cfg(not(unix))]
        {
            if perms.readonly() {
                #[allow(clippy::permissions_set_readonly_false)]
                perms.set_readonly(false);
                fs::set_permissions(entry.path(), perms)?;
            }
        }
    }
    Ok(())
}

/// Install companion LFS objects and check the tree out, or detect leftover
/// pointer files when no payload is available.
async fn settle_lfs(plan: &ExtractionPlan, target: &Path) -> StoreResult<ExtractionStatus> {
    if let Some(companion) = &plan.lfs_companion {
        let objects = companion.join("objects");
        if objects.is_dir() {
            copy_dir_all(&objects, &target.join(".git").join("lfs").join("objects"))?;
        }
        match lfs_checkout(target).await {
            Ok(()) => return Ok(ExtractionStatus::Complete),
            Err(e) => {
                warn!(repo = %plan.repo, error = %e, "git lfs checkout failed; leaving pointer files");
                return Ok(ExtractionStatus::LfsPending);
            }
        }
    }

    if has_pointer_files(target)? {
        Ok(ExtractionStatus::LfsPending)
    } else {
        Ok(ExtractionStatus::Complete)
    }
}

async fn lfs_checkout(target: &Path) -> Result<(), String> {
    let mut cmd = Command::new("git");
    cmd.arg("lfs").arg("checkout");
    cmd.current_dir(target);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = cmd
        .output()
        .await
        .map_err(|e| format!("failed to spawn git lfs: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "git lfs checkout failed (status {}): {}",
            output.status,
            stderr.trim()
        ));
    }
    Ok(())
}

/// Does any file outside `.git` start with the LFS pointer signature?
fn has_pointer_files(root: &Path) -> StoreResult<bool> {
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let mut head = vec![0u8; LFS_POINTER_PREFIX.len()];
        use std::io::Read;
        let mut file = fs::File::open(entry.path())?;
        let n = file.read(&mut head)?;
        if n == LFS_POINTER_PREFIX.len() && head == LFS_POINTER_PREFIX {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Recursively copy a directory tree.
pub fn copy_dir_all(src: &Path, dst: &Path) -> StoreResult<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let to = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &to)?;
        } else {
            fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RepoId;
    use tempfile::TempDir;

    fn plan_for(dir: &TempDir, bundle_bytes: &[u8]) -> (ExtractionPlan, StorageLayout) {
        let layout = StorageLayout::new(dir.path());
        fs::create_dir_all(layout.bundles_dir()).unwrap();
        fs::create_dir_all(layout.extracted_dir()).unwrap();
        let repo = RepoId::new("acme/model-a").unwrap();
        let bundle_path = layout.bundle_path(&repo);
        fs::write(&bundle_path, bundle_bytes).unwrap();
        let plan = ExtractionPlan {
            target_dir: layout.extraction_dir(&repo),
            repo,
            bundle_path,
            lfs_companion: None,
            already_extracted: false,
        };
        (plan, layout)
    }

    #[tokio::test]
    async fn failed_extraction_leaves_no_target_directory() {
        let dir = TempDir::new().unwrap();
        // Not a bundle at all; the clone must fail whichever way git is
        // installed (or absent) on the host.
        let (plan, layout) = plan_for(&dir, b"definitely not a git bundle");

        let err = extract(&plan, &layout).await.unwrap_err();
        assert!(matches!(err, StoreError::ExtractionFailed { .. }), "got {err:?}");
        assert!(
            !plan.target_dir.exists(),
            "failed extraction must not leave a partial tree"
        );
        assert!(!layout.extraction_record_path(&plan.repo).exists());
    }

    #[tokio::test]
    async fn refuses_nonempty_target() {
        let dir = TempDir::new().unwrap();
        let (plan, layout) = plan_for(&dir, b"x");
        fs::create_dir_all(&plan.target_dir).unwrap();
        fs::write(plan.target_dir.join("keep.txt"), b"user data").unwrap();

        let err = extract(&plan, &layout).await.unwrap_err();
        assert!(matches!(err, StoreError::ExtractionFailed { .. }));
        // Pre-existing data must survive the refusal.
        assert!(plan.target_dir.join("keep.txt").exists());
    }

    #[test]
    fn validate_working_tree_spots_missing_pieces() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        assert_eq!(validate_working_tree(root), Err(".git/HEAD"));

        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::create_dir_all(root.join(".git/refs")).unwrap();
        fs::write(root.join(".git/HEAD"), b"ref: refs/heads/main\n").unwrap();
        assert_eq!(validate_working_tree(root), Ok(()));
    }

    #[cfg(unix)]
    #[test]
    fn normalize_permissions_restores_owner_write() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let file = sub.join("weights.bin");
        fs::write(&file, b"data").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).unwrap();
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o555)).unwrap();

        normalize_permissions(dir.path()).unwrap();

        let file_mode = fs::metadata(&file).unwrap().permissions().mode();
        let dir_mode = fs::metadata(&sub).unwrap().permissions().mode();
        assert_ne!(file_mode & 0o200, 0, "file must be owner-writable");
        assert_eq!(dir_mode & 0o700, 0o700, "dir must be owner-accessible");
    }

    #[test]
    fn pointer_files_are_detected_outside_git_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("config.json"), b"{}").unwrap();
        assert!(!has_pointer_files(dir.path()).unwrap());

        fs::write(
            dir.path().join("model.safetensors"),
            b"version https://git-lfs.github.com/spec/v1\noid sha256:abc\nsize 10\n",
        )
        .unwrap();
        assert!(has_pointer_files(dir.path()).unwrap());
    }

    #[test]
    fn pointer_files_inside_git_dir_are_ignored() {
        let dir = TempDir::new().unwrap();
        let git = dir.path().join(".git");
        fs::create_dir_all(&git).unwrap();
        fs::write(
            git.join("lfs-thing"),
            b"version https://git-lfs.github.com/spec/v1\n",
        )
        .unwrap();
        assert!(!has_pointer_files(dir.path()).unwrap());
    }

    #[test]
    fn copy_dir_all_copies_nested_trees() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("aa/bb")).unwrap();
        fs::write(src.join("aa/bb/obj"), b"object bytes").unwrap();

        let dst = dir.path().join("dst");
        copy_dir_all(&src, &dst).unwrap();
        assert_eq!(fs::read(dst.join("aa/bb/obj")).unwrap(), b"object bytes");
    }
}
