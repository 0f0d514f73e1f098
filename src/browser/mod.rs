//! Browser seam used by the login, navigation and download stages.
//!
//! The portal exposes no stable ids or classes, so controls are located by
//! their visible text. [`LabelQuery`] is the single place that describes
//! such a lookup; every stage builds its steps out of label queries and a
//! handful of page primitives, each bounded by a timeout.

#[cfg(feature = "browser")]
pub mod chrome;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Failure of a single browser primitive.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("no element matching {label}")]
    LabelNotFound { label: String },

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BrowserError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        BrowserError::Timeout {
            what: what.into(),
            after,
        }
    }
}

/// How a label is compared against an element's visible text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Whitespace-normalized text equals the label.
    Exact,
    /// Whitespace-normalized text contains the label, ignoring case.
    Contains,
}

impl MatchMode {
    pub fn matches(self, visible_text: &str, label: &str) -> bool {
        let text = normalize_whitespace(visible_text);
        let label = normalize_whitespace(label);
        match self {
            MatchMode::Exact => text == label,
            MatchMode::Contains => text.to_lowercase().contains(&label.to_lowercase()),
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Locates an interactive element by its visible label.
///
/// `tag` narrows candidates to one element type (e.g. `a`, `button`); when
/// unset any element qualifies, which is how a control that renders either as
/// a link or as a button is matched. `within` scopes the search to the first
/// element matching a CSS selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelQuery {
    pub text: String,
    pub mode: MatchMode,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub within: Option<String>,
}

impl LabelQuery {
    pub fn exact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: MatchMode::Exact,
            tag: None,
            within: None,
        }
    }

    pub fn contains(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: MatchMode::Contains,
            tag: None,
            within: None,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn within(mut self, selector: impl Into<String>) -> Self {
        self.within = Some(selector.into());
        self
    }

    /// Whether an element with this tag, visible text and ancestry satisfies the query.
    ///
    /// `ancestors` holds the selectors the element sits inside; scripted pages
    /// use it to emulate `within`.
    pub fn accepts(&self, tag: &str, visible_text: &str, ancestors: &[&str]) -> bool {
        if let Some(want) = &self.tag {
            if !want.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(scope) = &self.within {
            if !ancestors.iter().any(|a| a == scope) {
                return false;
            }
        }
        self.mode.matches(visible_text, &self.text)
    }
}

impl fmt::Display for LabelQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            MatchMode::Exact => "exact",
            MatchMode::Contains => "contains",
        };
        write!(f, "{} '{}'", mode, self.text)?;
        if let Some(tag) = &self.tag {
            write!(f, " in <{tag}>")?;
        }
        if let Some(scope) = &self.within {
            write!(f, " within {scope}")?;
        }
        Ok(())
    }
}

/// Window geometry reported by a page, used for popup diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowMetrics {
    pub outer_width: u32,
    pub outer_height: u32,
    pub inner_width: u32,
    pub inner_height: u32,
    pub screen_width: u32,
    pub screen_height: u32,
}

/// A file the browser finished downloading into a staging directory.
///
/// The staging directory is removed when this value drops, so callers must
/// copy the file out before letting it go.
#[derive(Debug)]
pub struct DownloadedFile {
    pub path: PathBuf,
    _staging: tempfile::TempDir,
}

impl DownloadedFile {
    pub fn in_staging(path: impl Into<PathBuf>, staging: tempfile::TempDir) -> Self {
        Self {
            path: path.into(),
            _staging: staging,
        }
    }
}

/// One browsing context: the primary tab or a popup it spawned.
#[async_trait]
pub trait PortalPage: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until the document has finished loading.
    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), BrowserError>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), BrowserError>;

    /// Wait until the current URL contains `fragment`.
    async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until an element matching `query` is present and visible.
    async fn wait_for_label(&self, query: &LabelQuery, timeout: Duration)
        -> Result<(), BrowserError>;

    /// Click the first (innermost) visible element matching `query`.
    async fn click_label(&self, query: &LabelQuery, timeout: Duration) -> Result<(), BrowserError>;

    async fn fill(&self, selector: &str, value: &str, timeout: Duration)
        -> Result<(), BrowserError>;

    /// Non-empty inner texts of every visible element, in document order.
    async fn visible_texts(&self) -> Result<Vec<String>, BrowserError>;

    async fn bring_to_front(&self) -> Result<(), BrowserError>;

    async fn window_metrics(&self) -> Result<Option<WindowMetrics>, BrowserError> {
        Ok(None)
    }

    async fn resize_window(&self, _width: u32, _height: u32) -> Result<(), BrowserError> {
        Ok(())
    }

    /// Start listening for a new browsing context opened by this page.
    ///
    /// Must be called before the action that opens the popup.
    async fn arm_popup(&self) -> Result<Box<dyn PopupWatch>, BrowserError>;

    /// Start listening for a download started from this page.
    ///
    /// Must be called before the action that triggers the download.
    async fn arm_download(&self) -> Result<Box<dyn DownloadWatch>, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// An armed wait for a popup window.
#[async_trait]
pub trait PopupWatch: Send {
    async fn wait(self: Box<Self>, timeout: Duration) -> Result<Box<dyn PortalPage>, BrowserError>;
}

/// An armed wait for a completed download.
#[async_trait]
pub trait DownloadWatch: Send {
    async fn wait(self: Box<Self>, timeout: Duration) -> Result<DownloadedFile, BrowserError>;
}
