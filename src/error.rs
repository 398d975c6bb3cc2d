use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Whole-run failures. Per-file and per-fix problems are recorded in the
/// report instead of surfacing here.
#[derive(Debug, Error)]
pub enum FixerError {
    /// Bad root/src paths or contradictory options. Aborts before any scan.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Error collection failed and no fallback was allowed.
    #[error(transparent)]
    Collection(#[from] CollectionError),

    /// A rewrite or stub could not be persisted.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FixerError {
    pub fn config(message: impl Into<String>) -> Self {
        FixerError::Configuration(message.into())
    }
}

/// Failures of the live-build and saved-log strategies.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("build command is empty")]
    EmptyCommand,

    #[error("failed to start build command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("build command `{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("build failed (exit code {exit_code:?}) but no unresolved imports could be parsed from its output")]
    Unparsable { exit_code: Option<i32> },

    #[error("failed to read build log {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
