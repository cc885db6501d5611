use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// File config (figment-deserialized from defaults / watchtower.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   watchtower.toml:  [collector]
//                     session_filter = "agent-*"
//
//   env var:          WATCHTOWER_COLLECTOR__SESSION_FILTER=agent-*
//
//   flag:             --session-filter 'agent-*'
//
// Flags beat env vars, env vars beat the file, the file beats defaults.

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub collector: CollectorFileConfig,
}

/// HTTP server knobs (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served at `/`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// Pane sampling knobs (lives under `[collector]`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CollectorFileConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Glob over session names; empty admits every session
    #[serde(default = "default_session_filter")]
    pub session_filter: String,
    /// Multiplexer socket; empty uses the tool's default
    #[serde(default)]
    pub socket_path: String,
    #[serde(default = "default_tmux_binary")]
    pub tmux_binary: String,
}

impl Default for CollectorFileConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            session_filter: default_session_filter(),
            socket_path: String::new(),
            tmux_binary: default_tmux_binary(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("web/dist")
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_session_filter() -> String {
    "gt-*".to_string()
}
fn default_tmux_binary() -> String {
    "tmux".to_string()
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub static_dir: Option<PathBuf>,
    pub poll_interval_ms: Option<u64>,
    pub session_filter: Option<String>,
    pub socket_path: Option<String>,
}

impl CliOverrides {
    fn apply(self, fc: &mut FileConfig) {
        if let Some(host) = self.host {
            fc.server.host = host;
        }
        if let Some(port) = self.port {
            fc.server.port = port;
        }
        if let Some(dir) = self.static_dir {
            fc.server.static_dir = dir;
        }
        if let Some(ms) = self.poll_interval_ms {
            fc.collector.poll_interval_ms = ms;
        }
        if let Some(filter) = self.session_filter {
            fc.collector.session_filter = filter;
        }
        if let Some(socket) = self.socket_path {
            fc.collector.socket_path = socket;
        }
    }
}

/// Build a figment that layers: defaults → config file → WATCHTOWER_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `WATCHTOWER_SERVER__PORT=9000`  →  `server.port = 9000`
///   `WATCHTOWER_COLLECTOR__SOCKET_PATH=/tmp/s`  →  `collector.socket_path = "/tmp/s"`
pub fn load_config(config_file: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_file))
        .merge(Env::prefixed("WATCHTOWER_").split("__"))
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct WatchtowerConfig {
    pub listen_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub poll_interval: Duration,
    pub session_filter: String,
    pub socket_path: Option<PathBuf>,
    pub tmux_binary: String,
}

impl WatchtowerConfig {
    pub fn from_file(fc: &FileConfig) -> Result<Self> {
        if fc.collector.poll_interval_ms == 0 {
            bail!("collector.poll_interval_ms must be greater than zero");
        }

        let listen_addr = format!("{}:{}", fc.server.host, fc.server.port)
            .parse::<SocketAddr>()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    fc.server.host, fc.server.port
                )
            })?;

        let socket_path = if fc.collector.socket_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&fc.collector.socket_path))
        };

        Ok(Self {
            listen_addr,
            static_dir: fc.server.static_dir.clone(),
            poll_interval: Duration::from_millis(fc.collector.poll_interval_ms),
            session_filter: fc.collector.session_filter.clone(),
            socket_path,
            tmux_binary: fc.collector.tmux_binary.clone(),
        })
    }

    /// Resolve every layer, command line last.
    pub fn load(config_file: &Path, overrides: CliOverrides) -> Result<Self> {
        let mut fc: FileConfig = load_config(config_file)
            .extract()
            .with_context(|| format!("Failed to load configuration from {:?}", config_file))?;
        overrides.apply(&mut fc);
        Self::from_file(&fc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_file_config_defaults() {
        let fc = FileConfig::default();
        assert_eq!(fc.server.port, 8080);
        assert_eq!(fc.server.host, "0.0.0.0");
        assert_eq!(fc.collector.poll_interval_ms, 100);
        assert_eq!(fc.collector.session_filter, "gt-*");
        assert_eq!(fc.collector.socket_path, "");
        assert_eq!(fc.collector.tmux_binary, "tmux");
    }

    // ── WatchtowerConfig::from_file ─────────────────────────────────────

    #[test]
    fn test_runtime_config_from_defaults() {
        let wc = WatchtowerConfig::from_file(&FileConfig::default()).unwrap();
        assert_eq!(wc.listen_addr.port(), 8080);
        assert_eq!(wc.poll_interval, Duration::from_millis(100));
        assert!(wc.socket_path.is_none());
    }

    #[test]
    fn test_socket_path_set() {
        let mut fc = FileConfig::default();
        fc.collector.socket_path = "/tmp/tmux.sock".to_string();
        let wc = WatchtowerConfig::from_file(&fc).unwrap();
        assert_eq!(wc.socket_path, Some(PathBuf::from("/tmp/tmux.sock")));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut fc = FileConfig::default();
        fc.collector.poll_interval_ms = 0;
        assert!(WatchtowerConfig::from_file(&fc).is_err());
    }

    #[test]
    fn test_bad_host_rejected() {
        let mut fc = FileConfig::default();
        fc.server.host = "not a host".to_string();
        assert!(WatchtowerConfig::from_file(&fc).is_err());
    }

    // ── load_config ─────────────────────────────────────────────────────

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: FileConfig = load_config(&tmp.path().join("watchtower.toml"))
            .extract()
            .unwrap();
        assert_eq!(fc, FileConfig::default());
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("watchtower.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9001\n\n[collector]\nsession_filter = \"agent-*\"\npoll_interval_ms = 250\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(&path).extract().unwrap();
        assert_eq!(fc.server.port, 9001);
        assert_eq!(fc.server.host, "0.0.0.0");
        assert_eq!(fc.collector.session_filter, "agent-*");
        assert_eq!(fc.collector.poll_interval_ms, 250);
    }

    #[test]
    fn test_cli_overrides_beat_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("watchtower.toml");
        std::fs::write(&path, "[server]\nport = 9001\n").unwrap();

        let wc = WatchtowerConfig::load(
            &path,
            CliOverrides {
                port: Some(7000),
                session_filter: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(wc.listen_addr.port(), 7000);
        assert_eq!(wc.session_filter, "");
    }
}
