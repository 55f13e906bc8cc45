// ============================================================================
// src/error.rs – Error type shared by the library modules
// ============================================================================

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DrbdError>;

#[derive(Debug, Error)]
pub enum DrbdError {
    #[error("Command '{0}' not in allowlist")]
    NotAllowlisted(String),

    #[error("{tool} not found (looked in {})", .candidates.join(", "))]
    ToolNotFound {
        tool: &'static str,
        candidates: Vec<String>,
    },

    #[error("spawn {path} failed")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: writing stdin failed")]
    WriteInput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: command timed out after {after:?}")]
    Timeout { path: String, after: Duration },

    /// A wrapped tool exited non-zero. `output` is stdout followed by stderr.
    #[error("{prefix}: exit status {status}\n{output}")]
    CommandFailed {
        prefix: String,
        status: i32,
        output: String,
    },

    #[error("drbdsetup show: scanning failure (unexpected end of input after '{keyword}')")]
    UnexpectedEof { keyword: String },

    #[error("drbdsetup show: line {line}: expected a number after '{keyword}', found '{token}'")]
    BadNumber {
        keyword: String,
        token: String,
        line: usize,
    },

    #[error("drbdsetup show: line {line}: {msg}")]
    Syntax { line: usize, msg: String },

    #[error("resource {0} not found in drbdsetup show all")]
    ResourceNotFound(String),

    #[error("resource {0}: minor not yet set up")]
    MinorUnset(String),

    #[error("resource {0}: meta device not created")]
    MetaDevUnset(String),

    #[error("invalid endpoint '{input}': {reason}")]
    InvalidEndpoint { input: String, reason: String },
}
