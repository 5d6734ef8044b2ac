//! Top-level error type for syncrclone.
//!
//! Every fatal condition a run can hit is a variant of [`SyncError`]. Each
//! variant's [`Display`] states what happened and, where one exists, how to
//! fix it — callers at the CLI boundary print the message directly rather
//! than formatting their own.

use std::fmt;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::side::Side;

/// Unified error type for syncrclone run operations.
#[derive(Debug)]
pub enum SyncError {
    /// The configuration is invalid or internally contradictory.
    Config(ConfigError),

    /// The agent binary is older than the minimum supported version.
    VersionError {
        found: String,
        minimum: String,
    },

    /// A side's lock sentinel is already present.
    LockedRemoteError {
        side: Side,
        path: String,
    },

    /// An agent invocation exited non-zero and the exit code was not in the
    /// tolerated set for that call.
    AgentCallError {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// No config file could be located.
    NotADirectoryError {
        path: PathBuf,
    },

    /// A current listing (freshly fetched from the agent) failed to parse,
    /// or contained a duplicate `Path`. Unlike a missing *prior* listing,
    /// this is always fatal — the agent's own `lsjson` output is assumed
    /// well-formed.
    ListingError {
        side: Side,
        message: String,
    },

    /// Wrapped I/O failure (state push/pull, lock files, template writes).
    Io(std::io::Error),

    /// A side's prior listing was absent and `--require-prior-state` was
    /// passed, so the ordinary "treat it as a first run" tolerance does
    /// not apply.
    MissingPriorState {
        side: Side,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Config(e) => write!(f, "{e}"),
            SyncError::VersionError { found, minimum } => write!(
                f,
                "rclone version {found} is below the minimum supported version {minimum}.\n\
                 To fix: upgrade rclone, or lower `min_rclone_version` in the job config."
            ),
            SyncError::LockedRemoteError { side, path } => write!(
                f,
                "side {side} is locked ({path} exists).\n\
                 To fix: wait for the other run to finish, or pass --break-lock {side}."
            ),
            SyncError::AgentCallError {
                command,
                exit_code,
                stderr,
                ..
            } => write!(
                f,
                "agent call failed (exit {exit_code}): {command}\n{stderr}"
            ),
            SyncError::NotADirectoryError { path } => write!(
                f,
                "no syncrclone job config found at {}.\n\
                 To fix: pass a path to a job config file, or run with --new to create one.",
                path.display()
            ),
            SyncError::ListingError { side, message } => {
                write!(f, "could not read the current listing for side {side}: {message}")
            }
            SyncError::Io(e) => write!(f, "i/o error: {e}"),
            SyncError::MissingPriorState { side } => write!(
                f,
                "no prior listing found for side {side}, and --require-prior-state was passed.\n\
                 To fix: drop --require-prior-state to allow a first-run union, or restore the \
                 missing `{side}-*_fl.json.xz` state file."
            ),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Config(e) => Some(e),
            SyncError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Io(e)
    }
}

impl From<ConfigError> for SyncError {
    fn from(e: ConfigError) -> Self {
        SyncError::Config(e)
    }
}
