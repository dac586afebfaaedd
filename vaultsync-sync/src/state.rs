//! Which repository action a vault needs right now.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryAction {
    InitCommit,
    Commit,
    ClonePush,
    PullPush,
}

impl RepositoryAction {
    /// Recomputed on every sync request; never persisted.
    pub fn decide(has_repository: bool, has_origin: bool) -> Self {
        match (has_repository, has_origin) {
            (false, false) => RepositoryAction::InitCommit,
            (false, true) => RepositoryAction::ClonePush,
            (true, false) => RepositoryAction::Commit,
            (true, true) => RepositoryAction::PullPush,
        }
    }

    /// Button-style label.
    pub fn label(&self) -> &'static str {
        match self {
            RepositoryAction::InitCommit => "Init/commit",
            RepositoryAction::Commit => "Commit",
            RepositoryAction::ClonePush => "Clone/Push",
            RepositoryAction::PullPush => "Pull/Push",
        }
    }

    /// Whether the action talks to the remote.
    pub fn needs_remote(&self) -> bool {
        matches!(self, RepositoryAction::ClonePush | RepositoryAction::PullPush)
    }
}

impl fmt::Display for RepositoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepositoryAction::InitCommit => "initCommit",
            RepositoryAction::Commit => "commit",
            RepositoryAction::ClonePush => "clonePush",
            RepositoryAction::PullPush => "pullPush",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(false, false, RepositoryAction::InitCommit)]
    #[case(false, true, RepositoryAction::ClonePush)]
    #[case(true, false, RepositoryAction::Commit)]
    #[case(true, true, RepositoryAction::PullPush)]
    fn decision_table(
        #[case] has_repository: bool,
        #[case] has_origin: bool,
        #[case] expected: RepositoryAction,
    ) {
        assert_eq!(RepositoryAction::decide(has_repository, has_origin), expected);
    }

    #[rstest]
    #[case(RepositoryAction::InitCommit, "Init/commit", false)]
    #[case(RepositoryAction::Commit, "Commit", false)]
    #[case(RepositoryAction::ClonePush, "Clone/Push", true)]
    #[case(RepositoryAction::PullPush, "Pull/Push", true)]
    fn labels_and_remote_need(
        #[case] action: RepositoryAction,
        #[case] label: &str,
        #[case] remote: bool,
    ) {
        assert_eq!(action.label(), label);
        assert_eq!(action.needs_remote(), remote);
    }
}
