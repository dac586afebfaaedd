//! In-memory git engine that records every call, for tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::auth::AuthenticationHandler;
use crate::engine::{ChangeKind, CommitChanges, FileChange, GitEngine, GitRepository, Signature};
use crate::error::GitError;

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub calls: Vec<String>,
    pub head: Option<String>,
    pub dirty: bool,
    pub branches: Vec<String>,
    pub remotes: Vec<(String, String)>,
    /// Message and work-tree files of every commit, oldest first.
    pub commits: Vec<(String, Vec<String>)>,
    pub pull_script: VecDeque<Result<(), GitError>>,
    pub push_script: VecDeque<Result<(), GitError>>,
    /// `Err` fails the clone; `Ok(false)` clones an empty remote.
    pub clone_outcome: Option<Result<bool, GitError>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeEngine {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state lock")
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn repo(&self, git_dir: PathBuf) -> Box<dyn GitRepository> {
        let work_tree = git_dir.parent().map(Path::to_path_buf).unwrap_or_default();
        Box::new(FakeRepository {
            git_dir,
            work_tree,
            state: self.state.clone(),
        })
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }
}

impl GitEngine for FakeEngine {
    fn open(&self, git_dir: &Path) -> Result<Box<dyn GitRepository>, GitError> {
        self.record("open".into());
        if !git_dir.exists() {
            return Err(GitError::engine("could not find repository", -3, git_dir.display().to_string()));
        }
        Ok(self.repo(git_dir.to_path_buf()))
    }

    fn init(&self, dir: &Path) -> Result<Box<dyn GitRepository>, GitError> {
        self.record("init".into());
        let git_dir = dir.join(".git");
        std::fs::create_dir_all(&git_dir).map_err(|e| GitError::engine(e.to_string(), -1, ""))?;
        Ok(self.repo(git_dir))
    }

    fn clone_repo(
        &self,
        origin: &str,
        dir: &Path,
        _auth: Option<&AuthenticationHandler>,
    ) -> Result<Box<dyn GitRepository>, GitError> {
        self.record(format!("clone {origin}"));
        let outcome = self.state().clone_outcome.clone().unwrap_or(Ok(true));
        let has_branch = outcome?;

        let git_dir = dir.join(".git");
        std::fs::create_dir_all(&git_dir).map_err(|e| GitError::engine(e.to_string(), -1, ""))?;
        std::fs::write(dir.join("remote.md"), "from remote\n")
            .map_err(|e| GitError::engine(e.to_string(), -1, ""))?;

        let mut state = self.state();
        state.remotes.push(("origin".into(), origin.to_string()));
        if has_branch {
            state.branches.push("master".into());
            state.head = Some("remote-head".into());
        }
        drop(state);
        Ok(self.repo(git_dir))
    }
}

pub(crate) struct FakeRepository {
    git_dir: PathBuf,
    work_tree: PathBuf,
    state: Arc<Mutex<FakeState>>,
}

impl FakeRepository {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state lock")
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }
}

impl GitRepository for FakeRepository {
    fn git_dir(&self) -> PathBuf {
        self.git_dir.clone()
    }

    fn set_work_tree(&mut self, path: &Path) -> Result<(), GitError> {
        self.record(format!("set_work_tree {}", path.display()));
        self.work_tree = path.to_path_buf();
        Ok(())
    }

    fn head_commit(&self) -> Result<Option<String>, GitError> {
        Ok(self.state().head.clone())
    }

    fn add_all(&mut self) -> Result<bool, GitError> {
        self.record("add_all".into());
        let state = self.state();
        Ok(state.dirty || (state.head.is_none() && !work_tree_files(&self.work_tree).is_empty()))
    }

    fn commit(&mut self, message: &str, _signature: &Signature) -> Result<String, GitError> {
        self.record(format!("commit {message}"));
        let files = work_tree_files(&self.work_tree);
        let mut state = self.state();
        state.commits.push((message.to_string(), files));
        let id = format!("c{}", state.commits.len());
        state.head = Some(id.clone());
        state.dirty = false;
        if state.branches.is_empty() {
            state.branches.push("master".into());
        }
        Ok(id)
    }

    fn is_clean(&self) -> Result<bool, GitError> {
        Ok(!self.state().dirty)
    }

    fn local_branches(&self) -> Result<Vec<String>, GitError> {
        Ok(self.state().branches.clone())
    }

    fn remote_names(&self) -> Result<Vec<String>, GitError> {
        Ok(self.state().remotes.iter().map(|(n, _)| n.clone()).collect())
    }

    fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        Ok(self
            .state()
            .remotes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, u)| u.clone()))
    }

    fn add_origin(&mut self, url: &str) -> Result<(), GitError> {
        let mut state = self.state();
        if !state.remotes.iter().any(|(n, _)| n == "origin") {
            state.calls.push(format!("add_origin {url}"));
            state.remotes.push(("origin".into(), url.to_string()));
        }
        Ok(())
    }

    fn push(&mut self, branch: &str, _auth: Option<&AuthenticationHandler>) -> Result<(), GitError> {
        let mut state = self.state();
        state.calls.push(format!("push {branch}"));
        state.push_script.pop_front().unwrap_or(Ok(()))
    }

    fn pull(
        &mut self,
        _signature: &Signature,
        _auth: Option<&AuthenticationHandler>,
    ) -> Result<(), GitError> {
        let mut state = self.state();
        state.calls.push("pull".into());
        state.pull_script.pop_front().unwrap_or(Ok(()))
    }

    fn checkout(&mut self, branch: &str, force: bool) -> Result<(), GitError> {
        self.record(format!("checkout {branch} force={force}"));
        Ok(())
    }

    fn history(&self) -> Result<Vec<CommitChanges>, GitError> {
        let state = self.state();
        Ok(state
            .commits
            .iter()
            .enumerate()
            .map(|(i, (_, files))| CommitChanges {
                id: format!("c{}", i + 1),
                changes: files
                    .iter()
                    .map(|f| FileChange {
                        path: f.clone(),
                        kind: ChangeKind::Added,
                        old_text: None,
                        new_text: Some("line\n".into()),
                    })
                    .collect(),
            })
            .collect())
    }
}

fn work_tree_files(root: &Path) -> Vec<String> {
    let mut out = Vec::new();
    collect(root, root, &mut out);
    out.sort();
    out
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if entry.file_name() == ".git" {
            continue;
        }
        if path.is_dir() {
            collect(root, &path, out);
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().into_owned());
        }
    }
}
