//! Harness setup errors.

use std::fmt;
use std::path::PathBuf;

/// Failures that happen before an authorization call can be made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Engine configuration could not be loaded.
    Config { reason: String },
    /// The snapshot file could not be read.
    ReadSnapshot { path: PathBuf, reason: String },
    /// The snapshot file is not a valid grants snapshot.
    ParseSnapshot { path: PathBuf, reason: String },
    /// The result could not be written.
    Output { reason: String },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { reason } => write!(f, "failed to load configuration: {reason}"),
            Self::ReadSnapshot { path, reason } => {
                write!(f, "failed to read snapshot '{}': {reason}", path.display())
            }
            Self::ParseSnapshot { path, reason } => {
                write!(f, "invalid snapshot '{}': {reason}", path.display())
            }
            Self::Output { reason } => write!(f, "failed to write result: {reason}"),
        }
    }
}

impl std::error::Error for SetupError {}
