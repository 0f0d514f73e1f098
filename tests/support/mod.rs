#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use money_monitor::browser::{
    BrowserError, DownloadWatch, DownloadedFile, LabelQuery, PopupWatch, PortalPage,
};
use money_monitor::config::TimeoutConfig;
use money_monitor::credentials::PortalCredentials;
use money_monitor::session::Session;

pub const LANDED_URL: &str = "https://hb2.bankleumi.co.il/eBanking/SPA.aspx#/home";

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fast_timeouts() -> TimeoutConfig {
    let short = Duration::from_millis(50);
    TimeoutConfig {
        navigation: short,
        element: short,
        form_field: short,
        popup: short,
        download: short,
        export_ready: short,
        settle: Duration::from_millis(1),
    }
}

pub fn credentials() -> PortalCredentials {
    PortalCredentials::new("user1", "hunter2")
}

#[derive(Default)]
struct PortalState {
    url: String,
    /// Every query with this text is missing.
    missing_labels: HashSet<String>,
    /// Only these exact queries (text, tag and scope) are missing.
    missing_queries: Vec<LabelQuery>,
    missing_selectors: HashSet<String>,
    /// Clicking a label with this exact query text moves the page to the URL.
    redirects: HashMap<String, String>,
    popup_opens: bool,
    popup_armed: bool,
    popup_opened: bool,
    popup_closed: bool,
    download: Option<Vec<u8>>,
    download_file_name: String,
    download_armed: bool,
    download_started: bool,
    visible_texts: Vec<String>,
    actions: Vec<String>,
}

/// In-memory stand-in for the bank portal.
///
/// Every label and selector exists unless removed, a popup opens on the
/// first click after one is armed, and a download starts on the first click
/// after one is armed. Actions are recorded per window for assertions.
#[derive(Clone)]
pub struct ScriptedPortal {
    state: Arc<Mutex<PortalState>>,
}

impl Default for ScriptedPortal {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPortal {
    pub fn new() -> Self {
        let mut state = PortalState {
            url: "about:blank".to_string(),
            popup_opens: true,
            download: Some(b"exported bytes".to_vec()),
            download_file_name: "Export.xlsx".to_string(),
            visible_texts: vec![
                "max executive".to_string(),
                "כל הכרטיסים".to_string(),
                "  ".to_string(),
                "יצוא לאקסל".to_string(),
            ],
            ..Default::default()
        };
        state
            .redirects
            .insert("כניסה לחשבון".to_string(), LANDED_URL.to_string());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn update(self, f: impl FnOnce(&mut PortalState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn without_label(self, text: &str) -> Self {
        self.update(|s| {
            s.missing_labels.insert(text.to_string());
        })
    }

    /// Hide one specific control while others with the same text stay visible.
    pub fn without_query(self, query: LabelQuery) -> Self {
        self.update(|s| s.missing_queries.push(query))
    }

    pub fn without_selector(self, selector: &str) -> Self {
        self.update(|s| {
            s.missing_selectors.insert(selector.to_string());
        })
    }

    /// Submitting the form leaves the browser on the login page.
    pub fn rejecting_login(self) -> Self {
        self.update(|s| s.redirects.clear())
    }

    pub fn without_popup(self) -> Self {
        self.update(|s| s.popup_opens = false)
    }

    pub fn with_download(self, name: &str, bytes: Vec<u8>) -> Self {
        self.update(|s| {
            s.download_file_name = name.to_string();
            s.download = Some(bytes);
        })
    }

    /// The export trigger works but the file never arrives.
    pub fn without_download(self) -> Self {
        self.update(|s| s.download = None)
    }

    pub fn page(&self) -> Box<dyn PortalPage> {
        Box::new(ScriptedPage {
            window: "main",
            state: Arc::clone(&self.state),
        })
    }

    pub fn session(&self) -> Session {
        Session::new("/tmp/profile", self.page())
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    pub fn popup_closed(&self) -> bool {
        self.state.lock().unwrap().popup_closed
    }

    pub fn position(&self, action: &str) -> Option<usize> {
        self.actions().iter().position(|a| a == action)
    }
}

struct ScriptedPage {
    window: &'static str,
    state: Arc<Mutex<PortalState>>,
}

impl PortalState {
    fn hides(&self, query: &LabelQuery) -> bool {
        self.missing_labels.contains(&query.text) || self.missing_queries.contains(query)
    }
}

impl ScriptedPage {
    fn record(&self, state: &mut PortalState, action: String) {
        state.actions.push(format!("{}: {action}", self.window));
    }
}

#[async_trait]
impl PortalPage for ScriptedPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("goto {url}"));
        state.url = url.to_string();
        Ok(())
    }

    async fn wait_until_ready(&self, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let state = self.state.lock().unwrap();
        if state.missing_selectors.contains(selector) {
            return Err(BrowserError::timeout(format!("selector '{selector}'"), timeout));
        }
        Ok(())
    }

    async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<(), BrowserError> {
        let state = self.state.lock().unwrap();
        if !state.url.contains(fragment) {
            return Err(BrowserError::timeout(format!("url containing '{fragment}'"), timeout));
        }
        Ok(())
    }

    async fn wait_for_label(
        &self,
        query: &LabelQuery,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let state = self.state.lock().unwrap();
        if state.hides(query) {
            return Err(BrowserError::timeout(query.to_string(), timeout));
        }
        Ok(())
    }

    async fn click_label(&self, query: &LabelQuery, _timeout: Duration) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        if state.hides(query) {
            return Err(BrowserError::LabelNotFound {
                label: query.to_string(),
            });
        }
        self.record(&mut state, format!("click {}", query.text));

        if let Some(url) = state.redirects.get(&query.text).cloned() {
            state.url = url;
        }
        if state.popup_armed && state.popup_opens {
            state.popup_armed = false;
            state.popup_opened = true;
        }
        if state.download_armed {
            state.download_armed = false;
            state.download_started = true;
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, _value: &str, timeout: Duration) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        if state.missing_selectors.contains(selector) {
            return Err(BrowserError::timeout(format!("selector '{selector}'"), timeout));
        }
        self.record(&mut state, format!("fill {selector}"));
        Ok(())
    }

    async fn visible_texts(&self) -> Result<Vec<String>, BrowserError> {
        Ok(self.state.lock().unwrap().visible_texts.clone())
    }

    async fn bring_to_front(&self) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "bring to front".to_string());
        Ok(())
    }

    async fn resize_window(&self, width: u32, height: u32) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("resize {width}x{height}"));
        Ok(())
    }

    async fn arm_popup(&self) -> Result<Box<dyn PopupWatch>, BrowserError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "arm popup".to_string());
        state.popup_armed = true;
        Ok(Box::new(ScriptedPopupWatch {
            state: Arc::clone(&self.state),
        }))
    }

    async fn arm_download(&self) -> Result<Box<dyn DownloadWatch>, BrowserError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "arm download".to_string());
        state.download_armed = true;
        Ok(Box::new(ScriptedDownloadWatch {
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "close".to_string());
        if self.window == "popup" {
            state.popup_closed = true;
        }
        Ok(())
    }
}

struct ScriptedPopupWatch {
    state: Arc<Mutex<PortalState>>,
}

#[async_trait]
impl PopupWatch for ScriptedPopupWatch {
    async fn wait(self: Box<Self>, timeout: Duration) -> Result<Box<dyn PortalPage>, BrowserError> {
        let opened = std::mem::take(&mut self.state.lock().unwrap().popup_opened);
        if !opened {
            return Err(BrowserError::timeout("popup window", timeout));
        }
        Ok(Box::new(ScriptedPage {
            window: "popup",
            state: self.state,
        }))
    }
}

struct ScriptedDownloadWatch {
    state: Arc<Mutex<PortalState>>,
}

#[async_trait]
impl DownloadWatch for ScriptedDownloadWatch {
    async fn wait(self: Box<Self>, timeout: Duration) -> Result<DownloadedFile, BrowserError> {
        let (started, bytes, name) = {
            let mut state = self.state.lock().unwrap();
            (
                std::mem::take(&mut state.download_started),
                state.download.clone(),
                state.download_file_name.clone(),
            )
        };
        let bytes = match (started, bytes) {
            (true, Some(bytes)) => bytes,
            _ => return Err(BrowserError::timeout("download", timeout)),
        };

        let staging = tempfile::TempDir::new()?;
        let path = staging.path().join(name);
        std::fs::write(&path, bytes)?;
        Ok(DownloadedFile::in_staging(path, staging))
    }
}
