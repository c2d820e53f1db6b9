//! Error types for program execution.
//!
//! Every failure the engine can hit is one of these variants. Each variant
//! belongs to an [`ErrorCategory`], and the category decides whether the
//! failure is fatal to the lifecycle operation or only worth a warning.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of the engine an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Staging directory or staged file could not be created.
    Setup,
    /// Environment requested before the staging area was open.
    Environment,
    /// Program failed to spawn, exited non-zero or was cancelled.
    Execution,
    /// Result file missing, unreadable, or rejected by the record.
    ResultRead,
    /// Staging directory could not be removed.
    Cleanup,
}

impl ErrorCategory {
    /// Whether an error of this category fails the whole operation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Cleanup)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Setup => "Staging setup failed",
            Self::Environment => "Environment not available",
            Self::Execution => "Program execution failed",
            Self::ResultRead => "Reading program results failed",
            Self::Cleanup => "Staging cleanup failed",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Setup => "Check that the staging directory is writable",
            Self::Environment => "The staging area must be opened before building the environment",
            Self::Execution => "Check the program output for details",
            Self::ResultRead => "The program must leave readable id and state files behind",
            Self::Cleanup => "Remove the leftover staging directory by hand",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while running a lifecycle program.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A program spec with no executable.
    #[error("program for {verb} is empty")]
    EmptyProgram {
        /// Lifecycle verb the program belongs to.
        verb: String,
    },

    /// The current working directory could not be determined.
    #[error("error retrieving current working directory")]
    WorkingDir(#[source] io::Error),

    /// Base or staging directory could not be created.
    #[error("error creating staging directory in {}", parent.display())]
    CreateDir {
        /// Parent the directory was created in.
        parent: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A staged file could not be written.
    #[error("error writing file {}", path.display())]
    WriteFile {
        /// File being written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The staging area has no directory.
    #[error("staging area is not open")]
    NotStaged,

    /// The program could not be started.
    #[error("error starting {command}")]
    Spawn {
        /// Printable form of the command.
        command: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Waiting on the program failed.
    #[error("error waiting for {command}")]
    Wait {
        /// Printable form of the command.
        command: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The program finished unsuccessfully.
    #[error("{command} failed with {status}")]
    ExitStatus {
        /// Printable form of the command.
        command: String,
        /// Exit status description, e.g. `exit status: 7`.
        status: String,
    },

    /// The program was killed because the operation was cancelled.
    #[error("{command} was cancelled")]
    Cancelled {
        /// Printable form of the command.
        command: String,
    },

    /// The program was killed because its deadline passed.
    #[error("{command} timed out after {after:?}")]
    TimedOut {
        /// Printable form of the command.
        command: String,
        /// Configured timeout.
        after: Duration,
    },

    /// A result file could not be read.
    #[error("error opening file {}", path.display())]
    ReadResult {
        /// Result file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The record refused a value read back from the program.
    #[error("error when setting {field:?} attribute during {verb}")]
    ApplyResult {
        /// Attribute being set.
        field: &'static str,
        /// Lifecycle verb being run.
        verb: String,
        /// Rejection reported by the record.
        #[source]
        source: anyhow::Error,
    },

    /// The staging directory could not be removed.
    #[error("error when cleaning up staging directory {}", path.display())]
    Cleanup {
        /// Directory that was left behind.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Get the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyProgram { .. }
            | Self::WorkingDir(_)
            | Self::CreateDir { .. }
            | Self::WriteFile { .. } => ErrorCategory::Setup,
            Self::NotStaged => ErrorCategory::Environment,
            Self::Spawn { .. }
            | Self::Wait { .. }
            | Self::ExitStatus { .. }
            | Self::Cancelled { .. }
            | Self::TimedOut { .. } => ErrorCategory::Execution,
            Self::ReadResult { .. } | Self::ApplyResult { .. } => ErrorCategory::ResultRead,
            Self::Cleanup { .. } => ErrorCategory::Cleanup,
        }
    }

    /// Whether this error fails the operation it occurred in.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_is_not_fatal() {
        let err = Error::Cleanup {
            path: PathBuf::from("/tmp/x"),
            source: io::Error::other("busy"),
        };
        assert_eq!(err.category(), ErrorCategory::Cleanup);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::NotStaged.category(), ErrorCategory::Environment);
        assert!(Error::NotStaged.is_fatal());

        let err = Error::ExitStatus {
            command: "sh -c 'exit 7'".into(),
            status: "exit status: 7".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Execution);
        assert_eq!(err.to_string(), "sh -c 'exit 7' failed with exit status: 7");

        let err = Error::EmptyProgram {
            verb: "create".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Setup);
    }

    #[test]
    fn test_timed_out_message() {
        let err = Error::TimedOut {
            command: "sleep 10".into(),
            after: Duration::from_secs(3),
        };
        assert_eq!(err.to_string(), "sleep 10 timed out after 3s");
    }
}
