//! Authenticated browser session and the popups it spawns.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::browser::{BrowserError, PortalPage};

/// One browser context bound to one persistent profile.
///
/// Owns the primary page; popups opened from it are handed out as [`Popup`]
/// values that the caller closes when done.
pub struct Session {
    profile_dir: PathBuf,
    page: Box<dyn PortalPage>,
    authenticated: bool,
}

impl Session {
    pub fn new(profile_dir: impl Into<PathBuf>, page: Box<dyn PortalPage>) -> Self {
        Self {
            profile_dir: profile_dir.into(),
            page,
            authenticated: false,
        }
    }

    /// Launch Chrome on `profile_dir` and wrap its first tab.
    #[cfg(feature = "browser")]
    pub async fn launch(options: &crate::browser::chrome::LaunchOptions) -> anyhow::Result<Self> {
        let page = crate::browser::chrome::launch(options).await?;
        Ok(Self::new(options.profile_dir.clone(), Box::new(page)))
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    pub fn page(&self) -> &dyn PortalPage {
        self.page.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub(crate) fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }

    /// Close the primary page. Popups must be closed by their owners first.
    pub async fn close(self) -> Result<(), BrowserError> {
        debug!(profile = %self.profile_dir.display(), "Closing session");
        self.page.close().await
    }
}

/// A secondary browsing context spawned by an action in a [`Session`].
pub struct Popup {
    page: Box<dyn PortalPage>,
}

impl Popup {
    /// Adopt a freshly opened context: bring it forward and wait for its DOM.
    pub async fn adopt(page: Box<dyn PortalPage>, ready_timeout: Duration) -> Result<Self, BrowserError> {
        page.wait_until_ready(ready_timeout).await?;
        page.bring_to_front().await?;
        Ok(Self { page })
    }

    pub fn page(&self) -> &dyn PortalPage {
        self.page.as_ref()
    }

    pub async fn close(self) {
        if let Err(err) = self.page.close().await {
            warn!(error = %err, "Failed to close popup");
        }
    }
}
