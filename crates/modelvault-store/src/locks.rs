//! Per-repository single-flight locks.
//!
//! Verification and extraction for one repository must never run
//! concurrently with each other; across different repositories they are
//! fully independent. Workers acquire the repository's lock before touching
//! its bundle or extraction directory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::record::RepoId;

#[derive(Debug, Default)]
pub struct RepoLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for one repository, created on first use.
    pub fn for_repo(&self, repo: &RepoId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("lock map poisoned");
        map.entry(repo.as_str().to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
