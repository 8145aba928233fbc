#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use sha1::{Digest, Sha1};
use tempfile::TempDir;

use modelvault_store::{BundleStore, LfsInfo, RepoId, StorageLayout};

pub const OID: &str = "aabbccddeeff00112233445566778899aabbccdd";

/// Build the bytes of a structurally valid v2 bundle with a synthetic pack
/// payload and a correct SHA-1 trailer.
pub fn synth_bundle(refs: &[(&str, &str)], prereqs: &[&str], objects: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"# v2 git bundle\n");
    for p in prereqs {
        out.extend_from_slice(format!("-{p}\n").as_bytes());
    }
    for (oid, name) in refs {
        out.extend_from_slice(format!("{oid} {name}\n").as_bytes());
    }
    out.push(b'\n');

    let mut pack = Vec::new();
    pack.extend_from_slice(b"PACK");
    pack.extend_from_slice(&2u32.to_be_bytes());
    pack.extend_from_slice(&objects.to_be_bytes());
    pack.extend_from_slice(b"synthetic pack payload");
    let digest = Sha1::digest(&pack);
    out.extend_from_slice(&pack);
    out.extend_from_slice(&digest);
    out
}

pub fn open_store(dir: &TempDir) -> BundleStore {
    BundleStore::open(StorageLayout::new(dir.path())).unwrap()
}

/// Drop bundle bytes into the store's layout and register them.
pub fn seed_and_register(
    store: &BundleStore,
    id: &str,
    bytes: &[u8],
    object_count: Option<u32>,
    lfs: LfsInfo,
) -> RepoId {
    let repo = RepoId::new(id).unwrap();
    fs::write(store.layout().bundle_path(&repo), bytes).unwrap();
    store.register(&repo, "main", lfs, object_count, None).unwrap();
    repo
}

/// Create a real repository with `git` and bundle it. Returns `None` when
/// the git binary is unavailable so callers can skip gracefully.
pub fn real_bundle(workdir: &TempDir, files: &[(&str, &str)]) -> Option<PathBuf> {
    let repo_dir = workdir.path().join("src-repo");
    fs::create_dir_all(&repo_dir).unwrap();

    let git = |args: &[&str]| -> Option<()> {
        let status = Command::new("git")
            .args([
                "-c",
                "user.name=modelvault-test",
                "-c",
                "user.email=test@localhost",
                "-c",
                "init.defaultBranch=main",
            ])
            .args(args)
            .current_dir(&repo_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .ok()?
            .status;
        status.success().then_some(())
    };

    git(&["init", "-q"])?;
    for (name, contents) in files {
        fs::write(repo_dir.join(name), contents).unwrap();
    }
    git(&["add", "."])?;
    git(&["commit", "-q", "-m", "snapshot"])?;

    let bundle = workdir.path().join("real.bundle");
    git(&["bundle", "create", bundle.to_str().unwrap(), "--all"])?;
    Some(bundle)
}
