//! libgit2 error → [`GitError`] mapping.

use git2::ErrorCode;

use vaultsync_sync::GitError;

/// Missing references become [`GitError::RefNotFound`], checkout conflicts
/// with local edits become [`GitError::UncommittedConflict`], everything else
/// is an [`GitError::Engine`] carrying libgit2's code and class.
pub(crate) fn map_git_error(err: git2::Error) -> GitError {
    match err.code() {
        ErrorCode::NotFound | ErrorCode::UnbornBranch => match reference_name(err.message()) {
            Some(reference) => GitError::RefNotFound(reference),
            None => engine_error(&err),
        },
        ErrorCode::Conflict | ErrorCode::Uncommitted => GitError::UncommittedConflict,
        _ => engine_error(&err),
    }
}

/// `.git()` on libgit2 results, in place of `.map_err(map_git_error)`.
pub(crate) trait GitResultExt<T> {
    fn git(self) -> Result<T, GitError>;
}

impl<T> GitResultExt<T> for Result<T, git2::Error> {
    fn git(self) -> Result<T, GitError> {
        self.map_err(map_git_error)
    }
}

fn engine_error(err: &git2::Error) -> GitError {
    GitError::engine(err.message(), err.raw_code(), format!("{:?}", err.class()))
}

/// First `refs/...` token in a libgit2 message, quotes stripped.
fn reference_name(message: &str) -> Option<String> {
    message
        .split(|c: char| c.is_whitespace() || c == '\'' || c == '"')
        .find(|token| token.starts_with("refs/"))
        .map(|token| token.trim_end_matches(&[',', '.', ';'][..]).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::ErrorClass;
    use rstest::rstest;

    #[rstest]
    #[case("reference 'refs/heads/master' not found", Some("refs/heads/master"))]
    #[case("cannot locate remote-tracking branch refs/remotes/origin/main.", Some("refs/remotes/origin/main"))]
    #[case("remote 'origin' does not exist", None)]
    fn extracts_reference(#[case] message: &str, #[case] expected: Option<&str>) {
        assert_eq!(reference_name(message).as_deref(), expected);
    }

    #[test]
    fn not_found_with_ref_is_ref_not_found() {
        let err = git2::Error::new(
            ErrorCode::NotFound,
            ErrorClass::Reference,
            "reference 'refs/heads/master' not found",
        );
        assert_eq!(map_git_error(err), GitError::RefNotFound("refs/heads/master".into()));
    }

    #[test]
    fn checkout_conflict_is_uncommitted_conflict() {
        let err = git2::Error::new(ErrorCode::Conflict, ErrorClass::Checkout, "1 conflict prevents checkout");
        assert_eq!(map_git_error(err), GitError::UncommittedConflict);
    }

    #[test]
    fn other_codes_keep_message() {
        let err = git2::Error::new(ErrorCode::Auth, ErrorClass::Net, "authentication required");
        match map_git_error(err) {
            GitError::Engine { message, description, .. } => {
                assert_eq!(message, "authentication required");
                assert_eq!(description, "Net");
            }
            other => panic!("expected Engine, got {other:?}"),
        }
    }
}
