/// Error taxonomy for the whole crate.
///
/// The split matters for the CLI: user validation failures exit with 1,
/// everything that is not the user's fault (lock contention, validator
/// misuse, I/O faults) exits with 2. Per-project branch outcomes are *not*
/// errors and never appear here; see [`crate::workspace::BranchOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A precondition the user can fix: feature or project missing or
    /// already present, no active feature, a path outside the workspace.
    #[error("{0}")]
    Validation(String),

    /// Another process holds the workspace lock.
    #[error("simultaneous operation detected: lock held by pid {holder_pid} ({lock_path}); remove the file if the holder is gone")]
    Contention {
        holder_pid: String,
        lock_path: String,
    },

    /// A defect in the caller, not user input: e.g. a validator invoked
    /// with an empty name and no permission to default to the active feature.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("corrupt state file: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Process exit code for the CLI surface.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 1,
            Self::Contention { .. } | Self::Internal(_) | Self::Io(_) | Self::Json(_) => 2,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
