use crate::fingerprint::ContentFingerprint;

/// Output template passed to `list-panes -F`.
///
/// Produces `session:window.pane:title:width:height` per line.
pub const LIST_PANES_FORMAT: &str =
    "#{session_name}:#{window_index}.#{pane_index}:#{pane_title}:#{pane_width}:#{pane_height}";

/// Identity of a pane: (session, window, pane).
///
/// Displays as the canonical target form `session:window.pane`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneIdentity {
    pub session: String,
    pub window: String,
    pub pane: String,
}

impl PaneIdentity {
    pub fn new(
        session: impl Into<String>,
        window: impl Into<String>,
        pane: impl Into<String>,
    ) -> Self {
        Self {
            session: session.into(),
            window: window.into(),
            pane: pane.into(),
        }
    }
}

impl std::fmt::Display for PaneIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}.{}", self.session, self.window, self.pane)
    }
}

/// Metadata for a pane as of the last sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaneInfo {
    pub id: PaneIdentity,
    pub title: String,
    pub cols: u16,
    pub rows: u16,
}

impl PaneInfo {
    /// Render in the same shape `list-panes` produces with [`LIST_PANES_FORMAT`].
    pub fn to_list_line(&self) -> String {
        format!("{}:{}:{}:{}", self.id, self.title, self.cols, self.rows)
    }
}

/// A changed pane: metadata, full captured content, and its fingerprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaneUpdate {
    pub info: PaneInfo,
    pub content: String,
    pub fingerprint: ContentFingerprint,
}

/// Parse one line of `list-panes` output.
///
/// Returns `None` for malformed lines. Titles may contain `:`, so the session
/// and `window.pane` fields are taken from the left and width/height from the
/// right; whatever remains in between is the title.
pub fn parse_pane_line(line: &str) -> Option<PaneInfo> {
    let mut head = line.splitn(3, ':');
    let session = head.next()?;
    let window_pane = head.next()?;
    let rest = head.next()?;

    let mut tail = rest.rsplitn(3, ':');
    let height = tail.next()?;
    let width = tail.next()?;
    let title = tail.next()?;

    let (window, pane) = window_pane.split_once('.')?;

    let cols = parse_dimension(width)?;
    let rows = parse_dimension(height)?;

    Some(PaneInfo {
        id: PaneIdentity::new(session, window, pane),
        title: title.to_string(),
        cols,
        rows,
    })
}

fn parse_dimension(s: &str) -> Option<u16> {
    s.trim().parse::<u16>().ok().filter(|n| *n > 0)
}
