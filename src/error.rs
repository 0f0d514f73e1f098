//! Stage-level failure taxonomy.
//!
//! Each stage of a run fails with exactly one variant so the caller can tell
//! a rejected login apart from a portal layout change or a missing download.

use std::path::PathBuf;

use crate::browser::BrowserError;
use crate::login::LoginStep;
use crate::navigation::NavState;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// A login step timed out or the post-login marker never appeared.
    #[error("authentication failed at step '{step}': {source}")]
    Authentication {
        step: LoginStep,
        #[source]
        source: BrowserError,
    },

    /// An expected menu element or page state was never reached.
    #[error("navigation failed after reaching state '{state}': {reason}")]
    Navigation { state: NavState, reason: String },

    /// The export trigger failed or no file materialized at the destination.
    #[error("download failed: {reason}")]
    Download { reason: String },

    /// The export file is unreadable or held no transactions after filtering.
    #[error("failed to parse export {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
}

impl ScrapeError {
    /// Short stage name used in log fields and the CLI's failure line.
    pub fn stage(&self) -> &'static str {
        match self {
            ScrapeError::Authentication { .. } => "login",
            ScrapeError::Navigation { .. } => "navigation",
            ScrapeError::Download { .. } => "download",
            ScrapeError::Parse { .. } => "parse",
        }
    }

    pub(crate) fn download(reason: impl Into<String>) -> Self {
        ScrapeError::Download {
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ScrapeError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn messages_name_the_failed_stage() {
        let err = ScrapeError::Navigation {
            state: NavState::CardSection,
            reason: "label 'MAX 2711' not found".to_string(),
        };
        assert_eq!(err.stage(), "navigation");
        assert!(err.to_string().contains("CardSection"));

        let err = ScrapeError::Authentication {
            step: LoginStep::PostLoginMarker,
            source: BrowserError::Timeout {
                what: "selector 'app-nav-menu'".to_string(),
                after: Duration::from_secs(15),
            },
        };
        assert_eq!(err.stage(), "login");
        assert!(err.to_string().contains("post-login marker"));
    }
}
