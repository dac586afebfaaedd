//! [`GitRepository`] over a `git2::Repository`.

use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Commit, Delta, DiffDelta, ErrorCode, FetchOptions, IndexAddOption, Oid,
    PushOptions, Repository, Sort, StatusOptions,
};

use vaultsync_sync::{
    AuthenticationHandler, ChangeKind, CommitChanges, FileChange, GitError, GitRepository,
    Signature,
};

use crate::credentials::remote_callbacks;
use crate::error::{map_git_error, GitResultExt};

const ORIGIN: &str = "origin";
const DEFAULT_BRANCH: &str = "master";
/// `GIT_EMERGECONFLICT`
const MERGE_CONFLICT_CODE: i32 = -24;

pub struct Git2Repository {
    repo: Repository,
    git_dir: PathBuf,
}

impl Git2Repository {
    pub(crate) fn new(repo: Repository, git_dir: PathBuf) -> Self {
        Self { repo, git_dir }
    }

    /// The wrapped libgit2 handle.
    pub fn inner(&self) -> &Repository {
        &self.repo
    }

    fn head_oid(&self) -> Result<Option<Oid>, GitError> {
        match self.repo.head() {
            Ok(head) => Ok(head.target()),
            Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(err) => Err(map_git_error(err)),
        }
    }

    /// Branch HEAD points at, even when it is still unborn.
    fn current_branch(&self) -> Result<String, GitError> {
        if let Ok(head) = self.repo.head() {
            if head.is_branch() {
                if let Some(name) = head.shorthand() {
                    return Ok(name.to_string());
                }
            }
        }
        if let Ok(head) = self.repo.find_reference("HEAD") {
            if let Some(name) = head.symbolic_target().and_then(|t| t.strip_prefix("refs/heads/")) {
                return Ok(name.to_string());
            }
        }
        Ok(self
            .local_branches()?
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string()))
    }

    fn signature(signature: &Signature) -> Result<git2::Signature<'static>, GitError> {
        git2::Signature::now(&signature.name, &signature.email).git()
    }

    fn fetch_origin(&self, auth: Option<&AuthenticationHandler>) -> Result<(), GitError> {
        let mut remote = self.repo.find_remote(ORIGIN).git()?;
        let mut options = FetchOptions::new();
        options.remote_callbacks(remote_callbacks(auth));
        remote
            .fetch(&["+refs/heads/*:refs/remotes/origin/*"], Some(&mut options), None)
            .git()
    }

    fn merge(
        &self,
        branch: &str,
        local: Oid,
        theirs: Oid,
        signature: &Signature,
    ) -> Result<(), GitError> {
        let ours = self.repo.find_commit(local).git()?;
        let theirs = self.repo.find_commit(theirs).git()?;
        let mut index = self.repo.merge_commits(&ours, &theirs, None).git()?;

        if index.has_conflicts() {
            let count = index.conflicts().git()?.count();
            return Err(GitError::engine(
                "merge conflict",
                MERGE_CONFLICT_CODE,
                format!("{count} file(s) changed on both sides"),
            ));
        }

        let tree_id = index.write_tree_to(&self.repo).git()?;
        let tree = self.repo.find_tree(tree_id).git()?;
        let sig = Self::signature(signature)?;
        let message = format!("Merge remote-tracking branch 'origin/{branch}'");
        self.repo
            .commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&ours, &theirs])
            .git()?;
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))
            .git()?;
        tracing::debug!(branch, "merged remote changes");
        Ok(())
    }

    fn file_change(&self, delta: &DiffDelta<'_>) -> Option<FileChange> {
        let kind = match delta.status() {
            Delta::Added | Delta::Copied => ChangeKind::Added,
            Delta::Deleted => ChangeKind::Deleted,
            Delta::Renamed => ChangeKind::Renamed,
            Delta::Modified | Delta::Typechange => ChangeKind::Modified,
            _ => return None,
        };
        let path = delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())?
            .to_string_lossy()
            .into_owned();

        Some(FileChange {
            path,
            kind,
            old_text: self.blob_text(delta.old_file().id()),
            new_text: self.blob_text(delta.new_file().id()),
        })
    }

    fn blob_text(&self, id: Oid) -> Option<String> {
        if id.is_zero() {
            return None;
        }
        let blob = self.repo.find_blob(id).ok()?;
        if blob.is_binary() {
            return None;
        }
        String::from_utf8(blob.content().to_vec()).ok()
    }
}

impl GitRepository for Git2Repository {
    fn git_dir(&self) -> PathBuf {
        self.git_dir.clone()
    }

    /// Bind the work tree in memory and record it as `core.worktree`, so a
    /// later open of the moved metadata finds the vault again.
    fn set_work_tree(&mut self, path: &Path) -> Result<(), GitError> {
        self.repo.set_workdir(path, false).git()?;
        let mut config = self.repo.config().git()?;
        config
            .set_str("core.worktree", &path.to_string_lossy())
            .git()?;
        config.set_bool("core.bare", false).git()
    }

    fn head_commit(&self) -> Result<Option<String>, GitError> {
        Ok(self.head_oid()?.map(|oid| oid.to_string()))
    }

    fn add_all(&mut self) -> Result<bool, GitError> {
        let mut index = self.repo.index().git()?;
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .git()?;
        index.update_all(["*"].iter(), None).git()?;
        index.write().git()?;
        let staged_tree = index.write_tree().git()?;

        match self.head_oid()? {
            Some(head) => {
                let head_tree = self.repo.find_commit(head).git()?.tree_id();
                Ok(head_tree != staged_tree)
            }
            None => Ok(!index.is_empty()),
        }
    }

    fn commit(&mut self, message: &str, signature: &Signature) -> Result<String, GitError> {
        let mut index = self.repo.index().git()?;
        let tree_id = index.write_tree().git()?;
        let tree = self.repo.find_tree(tree_id).git()?;
        let sig = Self::signature(signature)?;

        let parent = match self.head_oid()? {
            Some(oid) => Some(self.repo.find_commit(oid).git()?),
            None => None,
        };
        let parents: Vec<&Commit<'_>> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .git()?;
        Ok(oid.to_string())
    }

    fn is_clean(&self) -> Result<bool, GitError> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        Ok(self.repo.statuses(Some(&mut options)).git()?.is_empty())
    }

    fn local_branches(&self) -> Result<Vec<String>, GitError> {
        let mut names = Vec::new();
        for entry in self.repo.branches(Some(BranchType::Local)).git()? {
            let (branch, _) = entry.git()?;
            if let Some(name) = branch.name().git()? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn remote_names(&self) -> Result<Vec<String>, GitError> {
        Ok(self
            .repo
            .remotes()
            .git()?
            .iter()
            .flatten()
            .map(str::to_string)
            .collect())
    }

    fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(map_git_error(err)),
        }
    }

    fn add_origin(&mut self, url: &str) -> Result<(), GitError> {
        match self.repo.find_remote(ORIGIN) {
            Ok(_) => Ok(()),
            Err(err) if err.code() == ErrorCode::NotFound => {
                self.repo.remote(ORIGIN, url).git()?;
                Ok(())
            }
            Err(err) => Err(map_git_error(err)),
        }
    }

    fn push(&mut self, branch: &str, auth: Option<&AuthenticationHandler>) -> Result<(), GitError> {
        let mut remote = self.repo.find_remote(ORIGIN).git()?;
        let mut callbacks = remote_callbacks(auth);
        callbacks.push_update_reference(|reference, status| match status {
            Some(reason) => Err(git2::Error::from_str(&format!("{reference} rejected: {reason}"))),
            None => Ok(()),
        });
        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote.push(&[refspec.as_str()], Some(&mut options)).git()?;
        tracing::debug!(branch, "pushed");
        Ok(())
    }

    /// Fetch `origin`, then fast-forward or merge the tracking branch.
    ///
    /// A dirty work tree blocks any update with
    /// [`GitError::UncommittedConflict`].
    fn pull(&mut self, signature: &Signature, auth: Option<&AuthenticationHandler>) -> Result<(), GitError> {
        let branch = self.current_branch()?;
        self.fetch_origin(auth)?;

        let tracking = format!("refs/remotes/origin/{branch}");
        let theirs = match self.repo.find_reference(&tracking) {
            Ok(reference) => reference.peel_to_commit().git()?.id(),
            Err(err) if err.code() == ErrorCode::NotFound => return Err(GitError::RefNotFound(tracking)),
            Err(err) => return Err(map_git_error(err)),
        };
        let local_ref = format!("refs/heads/{branch}");

        let Some(local) = self.head_oid()? else {
            self.repo
                .reference(&local_ref, theirs, true, "pull: adopt remote history")
                .git()?;
            self.repo.set_head(&local_ref).git()?;
            return self
                .repo
                .checkout_head(Some(CheckoutBuilder::new().safe()))
                .git();
        };

        let annotated = self.repo.find_annotated_commit(theirs).git()?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated]).git()?;
        if analysis.is_up_to_date() {
            return Ok(());
        }
        if !self.is_clean()? {
            return Err(GitError::UncommittedConflict);
        }

        if analysis.is_fast_forward() {
            let mut reference = self.repo.find_reference(&local_ref).git()?;
            reference.set_target(theirs, "pull: fast-forward").git()?;
            self.repo.set_head(&local_ref).git()?;
            return self
                .repo
                .checkout_head(Some(CheckoutBuilder::new().force()))
                .git();
        }

        self.merge(&branch, local, theirs, signature)
    }

    fn checkout(&mut self, branch: &str, force: bool) -> Result<(), GitError> {
        let refname = format!("refs/heads/{branch}");
        match self.repo.find_reference(&refname) {
            Ok(_) => {}
            Err(err) if err.code() == ErrorCode::NotFound => return Err(GitError::RefNotFound(refname)),
            Err(err) => return Err(map_git_error(err)),
        }
        self.repo.set_head(&refname).git()?;

        let mut builder = CheckoutBuilder::new();
        if force {
            builder.force();
        } else {
            builder.safe();
        }
        self.repo.checkout_head(Some(&mut builder)).git()
    }

    /// Oldest commit first; each diffed against its first parent with rename
    /// detection.
    fn history(&self) -> Result<Vec<CommitChanges>, GitError> {
        let mut walk = self.repo.revwalk().git()?;
        if walk.push_head().is_err() {
            return Ok(Vec::new());
        }
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE).git()?;

        let mut out = Vec::new();
        for oid in walk {
            let commit = self.repo.find_commit(oid.git()?).git()?;
            let tree = commit.tree().git()?;
            let parent_tree = if commit.parent_count() > 0 {
                commit.parent(0).ok().and_then(|p| p.tree().ok())
            } else {
                None
            };

            let mut diff = self
                .repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
                .git()?;
            diff.find_similar(None).git()?;

            out.push(CommitChanges {
                id: commit.id().to_string(),
                changes: diff.deltas().filter_map(|d| self.file_change(&d)).collect(),
            });
        }
        Ok(out)
    }
}
