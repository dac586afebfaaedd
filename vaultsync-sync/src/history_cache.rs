//! Commit-diff cache: per-commit file change summaries for fast history
//! lookups.
//!
//! Persists a [`CommitsCacheFile`] JSON document at
//! `<cache_dir>/commits-diff-<settings_key>.json`, written with the same
//! atomic `.tmp` + rename pattern as the settings store. Loading is lazy and
//! happens at most once per key for the lifetime of a [`HistoryCache`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use vaultsync_core::SettingsKey;

use crate::engine::{ChangeKind, FileChange, GitRepository};
use crate::error::{io_err, SyncError};

/// Summary of one file's change inside a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub path: String,
    pub change: ChangeKind,
    pub insertions: usize,
    pub deletions: usize,
}

/// Commit id → ordered diff summaries.
pub type CommitsCache = BTreeMap<String, Vec<DiffSummary>>;

/// On-disk payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitsCacheFile {
    pub built_at: DateTime<Utc>,
    pub commits: CommitsCache,
}

#[derive(Debug)]
pub struct HistoryCache {
    dir: PathBuf,
    loaded: Mutex<HashMap<SettingsKey, CommitsCache>>,
}

impl HistoryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// `<dir>/commits-diff-<key>.json`
    pub fn cache_path(&self, key: &SettingsKey) -> PathBuf {
        self.dir.join(format!("commits-diff-{key}.json"))
    }

    pub fn exists(&self, key: &SettingsKey) -> bool {
        self.cache_path(key).exists()
    }

    /// Walk the repository history and replace the cache for `key`.
    ///
    /// Returns the number of commits cached.
    pub fn rebuild(&self, key: &SettingsKey, repo: &dyn GitRepository) -> Result<usize, SyncError> {
        let mut commits = CommitsCache::new();
        for commit in repo.history()? {
            let summaries = commit.changes.iter().map(summarize).collect();
            commits.insert(commit.id, summaries);
        }

        let file = CommitsCacheFile {
            built_at: Utc::now(),
            commits,
        };
        self.save(key, &file)?;

        let count = file.commits.len();
        self.remember(key, file.commits);
        Ok(count)
    }

    /// Cached mapping for `key`; reads the file only on first access.
    ///
    /// A missing file yields an empty mapping.
    pub fn load(&self, key: &SettingsKey) -> Result<CommitsCache, SyncError> {
        if let Some(cached) = self.lock().get(key) {
            return Ok(cached.clone());
        }

        let path = self.cache_path(key);
        let commits = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            serde_json::from_str::<CommitsCacheFile>(&contents)?.commits
        } else {
            CommitsCache::new()
        };

        self.remember(key, commits.clone());
        Ok(commits)
    }

    /// Delete the cache file and forget the in-memory copy.
    pub fn invalidate(&self, key: &SettingsKey) -> Result<(), SyncError> {
        self.lock().remove(key);
        let path = self.cache_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    fn save(&self, key: &SettingsKey, file: &CommitsCacheFile) -> Result<(), SyncError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let path = self.cache_path(key);
        let json = serde_json::to_string_pretty(file)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    fn remember(&self, key: &SettingsKey, commits: CommitsCache) {
        self.lock().insert(key.clone(), commits);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SettingsKey, CommitsCache>> {
        self.loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Line-level insert/delete counts for one file change.
pub fn summarize(change: &FileChange) -> DiffSummary {
    let old = change.old_text.as_deref().unwrap_or("");
    let new = change.new_text.as_deref().unwrap_or("");

    let (mut insertions, mut deletions) = (0, 0);
    for op in TextDiff::from_lines(old, new).iter_all_changes() {
        match op.tag() {
            ChangeTag::Insert => insertions += 1,
            ChangeTag::Delete => deletions += 1,
            ChangeTag::Equal => {}
        }
    }

    DiffSummary {
        path: change.path.clone(),
        change: change.kind,
        insertions,
        deletions,
    }
}
