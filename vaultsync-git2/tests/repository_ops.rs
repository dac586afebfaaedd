use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use vaultsync_git2::Git2Engine;
use vaultsync_sync::{ChangeKind, GitEngine, GitError, GitRepository, Signature};

fn signature() -> Signature {
    Signature::new("Tester", "tester@example.com")
}

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).expect("write note");
}

fn bare_remote(root: &Path) -> PathBuf {
    let path = root.join("remote.git");
    git2::Repository::init_bare(&path).expect("bare remote");
    path
}

fn url(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Init `dir`, commit one note and return the open repository.
fn committed_repo(dir: &Path) -> Box<dyn GitRepository> {
    fs::create_dir_all(dir).expect("dir");
    write(dir, "todo.md", "- buy milk\n");
    let mut repo = Git2Engine::new().init(dir).expect("init");
    assert!(repo.add_all().expect("add"));
    repo.commit("FSNotes Init", &signature()).expect("commit");
    repo
}

fn current_branch(repo: &dyn GitRepository) -> String {
    repo.local_branches()
        .expect("branches")
        .into_iter()
        .next()
        .expect("a local branch")
}

#[test]
fn add_commit_and_history() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("notes");
    let mut repo = committed_repo(&dir);
    assert!(repo.head_commit().unwrap().is_some());

    assert!(!repo.add_all().unwrap(), "nothing changed since the commit");

    write(&dir, "todo.md", "- buy milk\n- call mum\n");
    write(&dir, "ideas.md", "# ideas\n");
    assert!(repo.add_all().unwrap());
    let second = repo.commit("Usual commit", &signature()).unwrap();

    let history = repo.history().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].id, second);

    let mut changes = history[1].changes.clone();
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    assert_eq!(changes[0].path, "ideas.md");
    assert_eq!(changes[0].kind, ChangeKind::Added);
    assert_eq!(changes[0].old_text, None);
    assert_eq!(changes[1].path, "todo.md");
    assert_eq!(changes[1].kind, ChangeKind::Modified);
    assert_eq!(changes[1].old_text.as_deref(), Some("- buy milk\n"));
    assert_eq!(changes[1].new_text.as_deref(), Some("- buy milk\n- call mum\n"));
}

#[test]
fn deleted_files_are_staged() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("notes");
    let mut repo = committed_repo(&dir);

    fs::remove_file(dir.join("todo.md")).unwrap();
    assert!(repo.add_all().unwrap());
    repo.commit("Usual commit", &signature()).unwrap();

    let history = repo.history().unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.changes.len(), 1);
    assert_eq!(last.changes[0].kind, ChangeKind::Deleted);
    assert_eq!(last.changes[0].new_text, None);
}

#[test]
fn empty_repository_has_no_history() {
    let tmp = TempDir::new().unwrap();
    let repo = Git2Engine::new().init(tmp.path()).unwrap();
    assert_eq!(repo.head_commit().unwrap(), None);
    assert!(repo.history().unwrap().is_empty());
    assert!(repo.local_branches().unwrap().is_empty());
}

#[test]
fn is_clean_tracks_untracked_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("notes");
    let repo = committed_repo(&dir);
    assert!(repo.is_clean().unwrap());

    write(&dir, "draft.md", "wip");
    assert!(!repo.is_clean().unwrap());
}

#[test]
fn metadata_moved_out_of_the_work_tree_reopens_bound_to_it() {
    let tmp = TempDir::new().unwrap();
    let vault = tmp.path().join("notes");
    fs::create_dir_all(&vault).unwrap();
    write(&vault, "todo.md", "- buy milk\n");

    let staging = tmp.path().join("storage").join("tmp");
    fs::create_dir_all(&staging).unwrap();
    let engine = Git2Engine::new();
    let mut repo = engine.init(&staging).unwrap();
    repo.set_work_tree(&vault).unwrap();
    drop(repo);

    let primary = tmp.path().join("storage").join("notes.git");
    fs::rename(staging.join(".git"), &primary).unwrap();

    let mut repo = engine.open(&primary).unwrap();
    assert_eq!(repo.git_dir(), primary);
    assert!(repo.add_all().unwrap());
    repo.commit("FSNotes Init", &signature()).unwrap();

    assert!(repo.is_clean().unwrap());
    assert!(!vault.join(".git").exists());
    assert_eq!(repo.history().unwrap()[0].changes[0].path, "todo.md");
}

#[test]
fn add_origin_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let mut repo = committed_repo(&tmp.path().join("notes"));
    assert_eq!(repo.remote_url("origin").unwrap(), None);

    repo.add_origin("git@example.com:me/notes.git").unwrap();
    repo.add_origin("git@example.com:me/other.git").unwrap();

    assert_eq!(repo.remote_names().unwrap(), vec!["origin".to_string()]);
    assert_eq!(
        repo.remote_url("origin").unwrap().as_deref(),
        Some("git@example.com:me/notes.git")
    );
}

#[test]
fn push_clone_and_fast_forward_pull() {
    let tmp = TempDir::new().unwrap();
    let remote = bare_remote(tmp.path());
    let a_dir = tmp.path().join("a");
    let mut a = committed_repo(&a_dir);
    let branch = current_branch(a.as_ref());
    a.add_origin(&url(&remote)).unwrap();
    a.push(&branch, None).unwrap();

    let b_dir = tmp.path().join("b");
    let mut b = Git2Engine::new().clone_repo(&url(&remote), &b_dir, None).unwrap();
    assert_eq!(current_branch(b.as_ref()), branch);
    assert_eq!(fs::read_to_string(b_dir.join("todo.md")).unwrap(), "- buy milk\n");

    write(&a_dir, "todo.md", "- buy milk\n- call mum\n");
    assert!(a.add_all().unwrap());
    let head = a.commit("Usual commit", &signature()).unwrap();
    a.push(&branch, None).unwrap();

    b.pull(&signature(), None).unwrap();
    assert_eq!(b.head_commit().unwrap().as_deref(), Some(head.as_str()));
    assert_eq!(
        fs::read_to_string(b_dir.join("todo.md")).unwrap(),
        "- buy milk\n- call mum\n"
    );

    b.pull(&signature(), None).expect("up to date pull is a no-op");
}

#[test]
fn diverged_histories_are_merged() {
    let tmp = TempDir::new().unwrap();
    let remote = bare_remote(tmp.path());
    let a_dir = tmp.path().join("a");
    let mut a = committed_repo(&a_dir);
    let branch = current_branch(a.as_ref());
    a.add_origin(&url(&remote)).unwrap();
    a.push(&branch, None).unwrap();

    let b_dir = tmp.path().join("b");
    let mut b = Git2Engine::new().clone_repo(&url(&remote), &b_dir, None).unwrap();

    write(&a_dir, "ideas.md", "# ideas\n");
    a.add_all().unwrap();
    a.commit("Usual commit", &signature()).unwrap();
    a.push(&branch, None).unwrap();

    write(&b_dir, "journal.md", "monday\n");
    b.add_all().unwrap();
    b.commit("Usual commit", &signature()).unwrap();

    b.pull(&signature(), None).unwrap();
    assert!(b_dir.join("ideas.md").exists());
    assert!(b_dir.join("journal.md").exists());

    let raw = git2::Repository::open(&b_dir).unwrap();
    let head = raw.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.parent_count(), 2);
    assert!(head.message().unwrap().starts_with("Merge remote-tracking branch"));
}

#[test]
fn pull_over_dirty_work_tree_is_uncommitted_conflict() {
    let tmp = TempDir::new().unwrap();
    let remote = bare_remote(tmp.path());
    let a_dir = tmp.path().join("a");
    let mut a = committed_repo(&a_dir);
    let branch = current_branch(a.as_ref());
    a.add_origin(&url(&remote)).unwrap();
    a.push(&branch, None).unwrap();

    let b_dir = tmp.path().join("b");
    let mut b = Git2Engine::new().clone_repo(&url(&remote), &b_dir, None).unwrap();

    write(&a_dir, "todo.md", "- remote edit\n");
    a.add_all().unwrap();
    a.commit("Usual commit", &signature()).unwrap();
    a.push(&branch, None).unwrap();

    write(&b_dir, "todo.md", "- local edit\n");
    assert_eq!(b.pull(&signature(), None), Err(GitError::UncommittedConflict));
    assert_eq!(fs::read_to_string(b_dir.join("todo.md")).unwrap(), "- local edit\n");
}

#[test]
fn pull_without_remote_branch_is_ref_not_found() {
    let tmp = TempDir::new().unwrap();
    let remote = bare_remote(tmp.path());
    let mut repo = committed_repo(&tmp.path().join("notes"));
    let branch = current_branch(repo.as_ref());
    repo.add_origin(&url(&remote)).unwrap();

    assert_eq!(
        repo.pull(&signature(), None),
        Err(GitError::RefNotFound(format!("refs/remotes/origin/{branch}")))
    );
}

#[test]
fn checkout_of_missing_branch_is_ref_not_found() {
    let tmp = TempDir::new().unwrap();
    let mut repo = committed_repo(&tmp.path().join("notes"));
    assert_eq!(
        repo.checkout("nope", true),
        Err(GitError::RefNotFound("refs/heads/nope".into()))
    );
}

#[test]
fn clone_of_empty_remote_has_no_branch() {
    let tmp = TempDir::new().unwrap();
    let remote = bare_remote(tmp.path());
    let repo = Git2Engine::new()
        .clone_repo(&url(&remote), &tmp.path().join("clone"), None)
        .unwrap();
    assert!(repo.local_branches().unwrap().is_empty());
    assert_eq!(repo.head_commit().unwrap(), None);
}
