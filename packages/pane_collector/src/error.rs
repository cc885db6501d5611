use std::process::ExitStatus;

/// Errors from invoking the external multiplexer.
///
/// Malformed output lines are never reported here; they are dropped while
/// parsing.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// The tool could not be started (missing binary, permissions, I/O).
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but exited unsuccessfully.
    #[error("{subcommand} exited with {status}: {stderr}")]
    CommandFailed {
        subcommand: &'static str,
        status: ExitStatus,
        stderr: String,
    },
}

/// The session filter pattern is not a valid glob.
#[derive(Debug, thiserror::Error)]
#[error("invalid session filter {pattern:?}: {source}")]
pub struct FilterError {
    pub pattern: String,
    #[source]
    pub source: globset::Error,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectorError {
    #[error("collector already started")]
    AlreadyStarted,
}
