use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The remote side offered no confirmation for this item, usually because
    /// the actor is not allowed to delete it.
    NoConfirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    Stopped,
}

/// Terminal result of driving one candidate through the delete protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    Skipped(SkipReason),
    Failed(FailReason),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoConfirmation => write!(f, "no-confirmation"),
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::Stopped => write!(f, "stopped"),
        }
    }
}

impl fmt::Display for DeletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionOutcome::Deleted => write!(f, "deleted"),
            DeletionOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            DeletionOutcome::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}
