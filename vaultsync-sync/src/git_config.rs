//! Minimal reader for on-disk git config files.
//!
//! Only what repository discovery needs: the origin URL of a vault's
//! `.git` (directory or `gitdir:` pointer file) and the `core.worktree` of a
//! repository kept outside the vault.

use std::path::{Component, Path, PathBuf};

/// Origin URL from raw config text.
///
/// A `url` inside `[remote "origin"]` wins. Otherwise the first non-empty
/// `url` anywhere in the file is returned.
pub fn parse_origin_url(text: &str) -> Option<String> {
    let mut in_origin = false;
    let mut first_url = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if is_section_header(trimmed) {
            in_origin = trimmed.to_lowercase() == "[remote \"origin\"]";
            continue;
        }

        let Some(value) = assignment_value(trimmed, "url") else {
            continue;
        };
        if in_origin {
            return Some(value);
        }
        first_url.get_or_insert(value);
    }

    first_url
}

/// `core.worktree` from raw config text, resolved against `repo_dir` when
/// relative.
pub fn parse_worktree(text: &str, repo_dir: &Path) -> Option<PathBuf> {
    let mut in_core = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if is_section_header(trimmed) {
            in_core = trimmed.to_lowercase() == "[core]";
            continue;
        }
        if !in_core {
            continue;
        }
        let Some(raw) = assignment_value(trimmed, "worktree") else {
            continue;
        };
        let path = Path::new(&raw);
        if path.is_absolute() {
            return Some(standardize(path));
        }
        let base = repo_dir.parent().unwrap_or(repo_dir);
        return Some(standardize(&base.join(path)));
    }

    None
}

/// Config file of the repository a vault's `.git` entry points at.
///
/// `.git` may be a directory or a file containing `gitdir: <path>`; a
/// relative gitdir is resolved against the vault.
pub fn dot_git_config_path(vault_path: &Path) -> Option<PathBuf> {
    let dot_git = vault_path.join(".git");
    let meta = std::fs::metadata(&dot_git).ok()?;
    if meta.is_dir() {
        return Some(dot_git.join("config"));
    }

    let pointer = std::fs::read_to_string(&dot_git).ok()?;
    let line = pointer
        .lines()
        .find(|l| l.to_lowercase().contains("gitdir:"))?;
    let (_, raw) = line.split_once(':')?;
    let raw = raw.trim();
    let git_dir = if raw.starts_with('/') {
        PathBuf::from(raw)
    } else {
        vault_path.join(raw)
    };
    Some(git_dir.join("config"))
}

/// Origin recorded in the vault's own `.git` config, if readable.
pub fn read_origin_from_dot_git(vault_path: &Path) -> Option<String> {
    let config = dot_git_config_path(vault_path)?;
    let text = std::fs::read_to_string(config).ok()?;
    parse_origin_url(&text)
}

/// Work tree recorded in `<repo_dir>/config`, if any.
pub fn read_worktree(repo_dir: &Path) -> Option<PathBuf> {
    let text = std::fs::read_to_string(repo_dir.join("config")).ok()?;
    parse_worktree(&text, repo_dir)
}

/// Compare two paths ignoring a leading device sandbox `/private/` prefix
/// and surrounding slashes.
pub fn paths_equivalent(lhs: &Path, rhs: &Path) -> bool {
    normalize_sandbox_path(lhs) == normalize_sandbox_path(rhs)
}

pub(crate) fn normalize_sandbox_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace("/private/", "/")
        .trim_matches('/')
        .to_string()
}

fn is_section_header(line: &str) -> bool {
    line.starts_with('[') && line.ends_with(']')
}

/// Value of `key = value` when `line` starts with `key` (case-insensitive).
fn assignment_value(line: &str, key: &str) -> Option<String> {
    if !line.to_lowercase().starts_with(key) {
        return None;
    }
    let (_, value) = line.split_once('=')?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Lexically resolve `.` and `..` components.
fn standardize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    const ORIGIN_CONFIG: &str = r#"
[core]
	repositoryformatversion = 0
[remote "upstream"]
	url = https://example.com/upstream.git
[Remote "Origin"]
	url = https://example.com/u/r.git
	fetch = +refs/heads/*:refs/remotes/origin/*
"#;

    #[rstest]
    #[case(ORIGIN_CONFIG, Some("https://example.com/u/r.git"))]
    #[case("[remote \"backup\"]\n url = git@host:a.git\n[remote \"other\"]\n url = git@host:b.git\n", Some("git@host:a.git"))]
    #[case("[core]\n bare = false\n", None)]
    #[case("[remote \"origin\"]\n url =   \n", None)]
    fn origin_parsing(#[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_origin_url(text).as_deref(), expected);
    }

    #[test]
    fn worktree_absolute_and_relative() {
        let repo = Path::new("/storage/abc123.git");
        assert_eq!(
            parse_worktree("[core]\n worktree = /private/var/notes/\n", repo),
            Some(PathBuf::from("/private/var/notes"))
        );
        assert_eq!(
            parse_worktree("[core]\n\tworktree = ../vaults/./notes\n", repo),
            Some(PathBuf::from("/vaults/notes"))
        );
        assert_eq!(
            parse_worktree("[remote \"origin\"]\n worktree = /x\n", repo),
            None
        );
    }

    #[test]
    fn sandbox_prefix_is_ignored() {
        assert!(paths_equivalent(
            Path::new("/private/var/mobile/notes/"),
            Path::new("/var/mobile/notes")
        ));
        assert!(!paths_equivalent(
            Path::new("/var/mobile/notes"),
            Path::new("/var/mobile/other")
        ));
    }

    #[test]
    fn reads_origin_through_gitdir_pointer() {
        let tmp = TempDir::new().expect("tmp");
        let vault = tmp.path().join("vault");
        let real = tmp.path().join("real.git");
        std::fs::create_dir_all(&vault).expect("vault");
        std::fs::create_dir_all(&real).expect("real");
        std::fs::write(real.join("config"), ORIGIN_CONFIG).expect("config");
        std::fs::write(vault.join(".git"), "gitdir: ../real.git\n").expect("pointer");

        assert_eq!(
            read_origin_from_dot_git(&vault).as_deref(),
            Some("https://example.com/u/r.git")
        );
    }

    #[test]
    fn reads_origin_from_inline_directory() {
        let tmp = TempDir::new().expect("tmp");
        std::fs::create_dir_all(tmp.path().join(".git")).expect("git dir");
        std::fs::write(
            tmp.path().join(".git").join("config"),
            "[remote \"origin\"]\n url = git@example.com:me/notes.git\n",
        )
        .expect("config");
        assert_eq!(
            read_origin_from_dot_git(tmp.path()).as_deref(),
            Some("git@example.com:me/notes.git")
        );
    }

    #[test]
    fn missing_dot_git_yields_none() {
        let tmp = TempDir::new().expect("tmp");
        assert_eq!(read_origin_from_dot_git(tmp.path()), None);
    }
}
