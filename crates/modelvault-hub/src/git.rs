//! Git command wrappers using [`tokio::process::Command`].
//!
//! Every function shells out to the system `git` binary (and its `lfs`
//! subcommand) for the actual transport work. `GIT_TERMINAL_PROMPT=0` is
//! always set so a missing credential fails fast instead of hanging a
//! worker on an interactive prompt.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{HubError, HubResult};

async fn run(op: &str, mut cmd: Command) -> HubResult<std::process::Output> {
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!(op, "spawning git");
    let output = cmd.output().await?;
    if !output.status.success() {
        return Err(HubError::Git {
            op: op.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// `git --version`, trimmed.
pub async fn version() -> HubResult<String> {
    let mut cmd = Command::new("git");
    cmd.arg("--version");
    let output = run("--version", cmd).await?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// `git clone --bare <url> <dest>`, with LFS smudging disabled so pointer
/// files are never expanded during the clone.
pub async fn clone_bare(url: &str, dest: &Path) -> HubResult<()> {
    let mut cmd = Command::new("git");
    cmd.arg("clone").arg("--bare").arg(url).arg(dest);
    cmd.env("GIT_LFS_SKIP_SMUDGE", "1");
    run("clone --bare", cmd).await?;
    Ok(())
}

/// Name of the branch `HEAD` points at in a (bare) repository.
pub async fn default_branch(repo_dir: &Path) -> HubResult<String> {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(repo_dir)
        .arg("symbolic-ref")
        .arg("--short")
        .arg("HEAD");
    let output = run("symbolic-ref", cmd).await?;
    Ok(parse_single_line(&output.stdout))
}

/// `git bundle create <out> --all --tags`: a self-contained snapshot of
/// every ref in the repository.
pub async fn bundle_create(repo_dir: &Path, out: &Path) -> HubResult<()> {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(repo_dir)
        .arg("bundle")
        .arg("create")
        .arg(out)
        .arg("--all")
        .arg("--tags");
    run("bundle create", cmd).await?;
    Ok(())
}

/// `git lfs fetch --all <remote>`: pull every LFS object reachable from any
/// ref into the repository's `lfs/objects` store.
pub async fn lfs_fetch_all(repo_dir: &Path, remote: &str) -> HubResult<()> {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(repo_dir)
        .arg("lfs")
        .arg("fetch")
        .arg("--all")
        .arg(remote);
    run("lfs fetch --all", cmd).await?;
    Ok(())
}

/// `git lfs push --all <remote_url>`.
pub async fn lfs_push_all(repo_dir: &Path, remote_url: &str) -> HubResult<()> {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(repo_dir)
        .arg("lfs")
        .arg("push")
        .arg("--all")
        .arg(remote_url);
    run("lfs push --all", cmd).await?;
    Ok(())
}

/// `git remote add <name> <url>`.
pub async fn remote_add(repo_dir: &Path, name: &str, url: &str) -> HubResult<()> {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(repo_dir)
        .arg("remote")
        .arg("add")
        .arg(name)
        .arg(url);
    run("remote add", cmd).await?;
    Ok(())
}

/// `git push --mirror <remote>`: every ref, forced.
pub async fn push_mirror(repo_dir: &Path, remote: &str) -> HubResult<()> {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(repo_dir)
        .arg("push")
        .arg("--mirror")
        .arg(remote);
    run("push --mirror", cmd).await?;
    Ok(())
}

fn parse_single_line(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout).trim().to_string()
}
