//! Error types shared by the command runner and the bridge

use thiserror::Error;

/// Command runner errors
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command line had no program
    #[error("Empty command line")]
    EmptyCommand,

    /// Failed to launch process
    #[error("Failed to launch '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    /// Process ran and returned a failure status
    #[error("{message}")]
    NonZeroExit { code: i32, message: String },

    /// Process was killed before it could report an exit code
    #[error("Process '{program}' was terminated by a signal")]
    Terminated { program: String },

    /// Failure reported back by the privileged counterpart
    #[error("{message}")]
    Remote { code: Option<i32>, message: String },

    /// Exit requested from a restricted context with nobody to forward it to
    #[error("No privileged process available to handle the exit request")]
    NoPrivilegedTarget,

    /// Request could not be delivered or answered
    #[error("Bridge channel error: {0}")]
    Channel(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    pub(crate) fn spawn_failed(program: &str, err: impl std::fmt::Display) -> Self {
        CommandError::SpawnFailed {
            program: program.to_string(),
            reason: err.to_string(),
        }
    }

    /// Exit code carried by this error, if the process got far enough to report one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::NonZeroExit { code, .. } => Some(*code),
            CommandError::Remote { code, .. } => *code,
            _ => None,
        }
    }
}
