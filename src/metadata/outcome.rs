use derive_more::Display;

/// Result of a mutation that did not hit a transport error.
///
/// Lost races are values, not errors: the caller shows the message and may retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MutationOutcome {
    Applied(Applied),
    Rejected(Rejection),
}

impl MutationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MutationOutcome::Applied(_))
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Applied {
    #[display("file saved")]
    Saved,
    /// Contents landed, but a concurrent writer owns the size bookkeeping.
    #[display("file saved (size will be refreshed by the next save)")]
    SavedMetadataStale,
    #[display("file created")]
    FileCreated,
    #[display("directory created")]
    DirectoryCreated,
    #[display("directory already exists")]
    DirectoryExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Rejection {
    #[display("remote changes would be overwritten")]
    RemoteChanged,
    #[display("file already exists")]
    FileExists,
    #[display("a directory with that name already exists")]
    DirectoryExists,
    #[display("unable to create file")]
    UnableToCreateFile,
    #[display("unable to create directory")]
    UnableToCreateDirectory,
}

/// What happened when linking a name into its parent's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LinkOutcome {
    #[display("linked")]
    Linked,
    #[display("already listed")]
    AlreadyListed,
    #[display("parent directory does not exist")]
    ParentMissing,
    #[display("parent is not a directory")]
    ParentNotDirectory,
    #[display("gave up after {attempts} attempts")]
    Exhausted { attempts: usize },
}

impl LinkOutcome {
    pub fn is_listed(&self) -> bool {
        matches!(self, LinkOutcome::Linked | LinkOutcome::AlreadyListed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(
            MutationOutcome::Rejected(Rejection::RemoteChanged).message(),
            "remote changes would be overwritten"
        );
        assert_eq!(
            MutationOutcome::Rejected(Rejection::UnableToCreateFile).message(),
            "unable to create file"
        );
        assert_eq!(MutationOutcome::Applied(Applied::Saved).message(), "file saved");
        assert_eq!(
            LinkOutcome::Exhausted { attempts: 4 }.to_string(),
            "gave up after 4 attempts"
        );
    }

    #[test]
    fn partial_success_counts_as_success() {
        assert!(MutationOutcome::Applied(Applied::SavedMetadataStale).is_success());
        assert!(!MutationOutcome::Rejected(Rejection::FileExists).is_success());
    }

    #[test]
    fn only_listed_link_outcomes_are_listed() {
        assert!(LinkOutcome::Linked.is_listed());
        assert!(LinkOutcome::AlreadyListed.is_listed());
        assert!(!LinkOutcome::ParentMissing.is_listed());
        assert!(!LinkOutcome::ParentNotDirectory.is_listed());
        assert!(!LinkOutcome::Exhausted { attempts: 1 }.is_listed());
    }
}
