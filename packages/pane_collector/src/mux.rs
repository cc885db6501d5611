//! Access to the external terminal multiplexer.

use std::future::Future;
use std::path::PathBuf;

use tracing::trace;

use crate::error::MuxError;
use crate::filter::SessionFilter;
use crate::pane::{LIST_PANES_FORMAT, PaneIdentity, PaneInfo, parse_pane_line};

/// Source of pane listings and pane captures.
///
/// Implementations are stateless from the collector's point of view; each
/// call is independent and may fail without affecting later calls.
pub trait MuxAdapter: Send + Sync + 'static {
    /// List every pane admitted by the session filter, in tool order.
    fn list_panes(&self) -> impl Future<Output = Result<Vec<PaneInfo>, MuxError>> + Send;

    /// Capture the visible screen of one pane as the raw bytes the tool
    /// printed. Decoding is left to the caller so invalid UTF-8 still
    /// fingerprints distinctly.
    fn capture_pane(
        &self,
        id: &PaneIdentity,
    ) -> impl Future<Output = Result<Vec<u8>, MuxError>> + Send;
}

/// [`MuxAdapter`] backed by the `tmux` command-line tool.
#[derive(Clone, Debug)]
pub struct TmuxAdapter {
    binary: String,
    socket_path: Option<PathBuf>,
    filter: SessionFilter,
}

impl TmuxAdapter {
    pub fn new(
        binary: impl Into<String>,
        socket_path: Option<PathBuf>,
        filter: SessionFilter,
    ) -> Self {
        Self {
            binary: binary.into(),
            // An empty path means "use the tool's default socket".
            socket_path: socket_path.filter(|p| !p.as_os_str().is_empty()),
            filter,
        }
    }

    /// Full argument vector for a subcommand, with `-S <socket>` prepended
    /// when a socket is configured.
    fn command_args(&self, subcommand: &[&str]) -> Vec<String> {
        let mut args = Vec::with_capacity(subcommand.len() + 2);
        if let Some(socket) = &self.socket_path {
            args.push("-S".to_string());
            args.push(socket.display().to_string());
        }
        args.extend(subcommand.iter().map(|s| s.to_string()));
        args
    }

    /// Run a subcommand and return its stdout.
    async fn run(&self, name: &'static str, subcommand: &[&str]) -> Result<Vec<u8>, MuxError> {
        let args = self.command_args(subcommand);
        trace!(binary = %self.binary, ?args, "running multiplexer command");

        let output = tokio::process::Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|source| MuxError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(MuxError::CommandFailed {
                subcommand: name,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }

    /// Parse `list-panes` output, dropping malformed lines and sessions the
    /// filter rejects.
    pub fn parse_listing(&self, stdout: &str) -> Vec<PaneInfo> {
        stdout
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(parse_pane_line)
            .filter(|pane| self.filter.matches(&pane.id.session))
            .collect()
    }
}

impl MuxAdapter for TmuxAdapter {
    async fn list_panes(&self) -> Result<Vec<PaneInfo>, MuxError> {
        let stdout = self
            .run("list-panes", &["list-panes", "-a", "-F", LIST_PANES_FORMAT])
            .await?;
        Ok(self.parse_listing(&String::from_utf8_lossy(&stdout)))
    }

    async fn capture_pane(&self, id: &PaneIdentity) -> Result<Vec<u8>, MuxError> {
        let target = id.to_string();
        self.run("capture-pane", &["capture-pane", "-p", "-t", &target])
            .await
    }
}
