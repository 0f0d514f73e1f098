//! Chrome DevTools implementation of [`PortalPage`].
//!
//! Launches a headed Chrome bound to a persistent profile directory so the
//! portal recognizes the device between runs. Labels are resolved in the page
//! with a small script that mirrors [`MatchMode::matches`].

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::BringToFrontParams;
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{
    BrowserError, DownloadWatch, DownloadedFile, LabelQuery, MatchMode, PopupWatch, PortalPage,
    WindowMetrics,
};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const DOWNLOAD_POLL_INTERVAL: Duration = Duration::from_millis(500);

impl From<CdpError> for BrowserError {
    fn from(err: CdpError) -> Self {
        BrowserError::Protocol(err.to_string())
    }
}

/// Options for launching the automated browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub profile_dir: PathBuf,
    pub download_dir: PathBuf,
    pub headless: bool,
}

/// Browser process plus the task driving its DevTools connection.
struct ChromeShared {
    browser: Browser,
    handler_task: JoinHandle<()>,
    download_dir: PathBuf,
}

impl Drop for ChromeShared {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// A tab (or popup) of the automated browser.
pub struct ChromePage {
    page: Page,
    shared: Arc<ChromeShared>,
}

/// Launch Chrome with a persistent profile and return its first blank tab.
///
/// The browser lives as long as any page handed out from it.
pub async fn launch(options: &LaunchOptions) -> Result<ChromePage> {
    std::fs::create_dir_all(&options.profile_dir).with_context(|| {
        format!(
            "Failed to create profile dir: {}",
            options.profile_dir.display()
        )
    })?;
    std::fs::create_dir_all(&options.download_dir).with_context(|| {
        format!(
            "Failed to create download dir: {}",
            options.download_dir.display()
        )
    })?;

    let chrome_path = find_chrome().context(
        "Chrome/Chromium not found. Please install Chrome or Chromium to fetch exports.",
    )?;
    debug!(chrome = %chrome_path, profile = %options.profile_dir.display(), "Launching browser");

    let mut builder = BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .viewport(None)
        .user_data_dir(&options.profile_dir)
        .arg("--start-maximized")
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--no-first-run")
        .arg("--no-default-browser-check");
    if !options.headless {
        builder = builder.with_head();
    }
    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to configure browser: {e}"))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .context("Failed to launch browser")?;
    let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

    let page = browser
        .new_page("about:blank")
        .await
        .context("Failed to open initial tab")?;

    Ok(ChromePage {
        page,
        shared: Arc::new(ChromeShared {
            browser,
            handler_task,
            download_dir: options.download_dir.clone(),
        }),
    })
}

impl ChromePage {
    async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, BrowserError> {
        let result = self.page.evaluate(script).await?;
        result
            .into_value::<T>()
            .map_err(|e| BrowserError::Protocol(format!("unexpected script result: {e}")))
    }

    /// Evaluate a boolean script, treating script failures (e.g. a context
    /// destroyed mid-navigation) as "not yet".
    async fn eval_flag(&self, script: &str) -> Result<bool, BrowserError> {
        match self.evaluate::<bool>(script).await {
            Ok(found) => Ok(found),
            Err(err) => {
                debug!(error = %err, "Probe failed; retrying");
                Ok(false)
            }
        }
    }
}

async fn poll_until<F, Fut>(timeout: Duration, what: &str, mut check: F) -> Result<(), BrowserError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, BrowserError>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::timeout(what, timeout));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Script that finds the innermost visible element matching `query` and
/// either reports its presence or clicks it.
fn label_script(query: &LabelQuery, click: bool) -> String {
    let scope = query
        .within
        .as_deref()
        .map(js_string)
        .unwrap_or_else(|| "null".to_string());
    let tag = js_string(query.tag.as_deref().unwrap_or("*"));
    let exact = matches!(query.mode, MatchMode::Exact);
    format!(
        r#"(() => {{
  const scopeSel = {scope};
  const root = scopeSel ? document.querySelector(scopeSel) : document;
  if (!root) return false;
  const norm = s => (s || '').replace(/\s+/g, ' ').trim();
  const want = norm({text});
  const exact = {exact};
  const visible = el => el.getClientRects().length > 0;
  const hit = el => {{
    const t = norm(el.innerText);
    return exact ? t === want : t.toLowerCase().includes(want.toLowerCase());
  }};
  const found = Array.from(root.querySelectorAll({tag})).filter(el => visible(el) && hit(el));
  const innermost = found.filter(el => !found.some(o => o !== el && el.contains(o)));
  const target = innermost[0];
  if (!target) return false;
  if ({click}) {{
    target.scrollIntoView({{ block: 'center' }});
    target.click();
  }}
  return true;
}})()"#,
        text = js_string(&query.text),
    )
}

#[async_trait]
impl PortalPage for ChromePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        debug!(url, "Navigating");
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| BrowserError::timeout(format!("navigation to {url}"), timeout))??;
        Ok(())
    }

    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), BrowserError> {
        poll_until(timeout, "document ready state", || {
            self.eval_flag("document.readyState === 'complete'")
        })
        .await
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return !!el && el.getClientRects().length > 0; }})()",
            js_string(selector)
        );
        poll_until(timeout, &format!("selector '{selector}'"), || {
            self.eval_flag(&script)
        })
        .await
    }

    async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<(), BrowserError> {
        poll_until(timeout, &format!("URL containing '{fragment}'"), || async move {
            let url = self.page.url().await?.unwrap_or_default();
            Ok(url.contains(fragment))
        })
        .await
    }

    async fn wait_for_label(
        &self,
        query: &LabelQuery,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let script = label_script(query, false);
        poll_until(timeout, &query.to_string(), || self.eval_flag(&script)).await
    }

    async fn click_label(&self, query: &LabelQuery, timeout: Duration) -> Result<(), BrowserError> {
        debug!(label = %query, "Clicking");
        let script = label_script(query, true);
        poll_until(timeout, &query.to_string(), || self.eval_flag(&script))
            .await
            .map_err(|err| match err {
                BrowserError::Timeout { .. } => BrowserError::LabelNotFound {
                    label: query.to_string(),
                },
                other => other,
            })
    }

    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.wait_for_selector(selector, timeout).await?;
        let element = self.page.find_element(selector).await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await?;
        element.click().await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn visible_texts(&self) -> Result<Vec<String>, BrowserError> {
        self.evaluate(
            "Array.from(document.querySelectorAll('body *')).filter(el => el.getClientRects().length > 0).map(el => (el.innerText || '').trim()).filter(t => t.length > 0)",
        )
        .await
    }

    async fn bring_to_front(&self) -> Result<(), BrowserError> {
        self.page.execute(BringToFrontParams::default()).await?;
        Ok(())
    }

    async fn window_metrics(&self) -> Result<Option<WindowMetrics>, BrowserError> {
        let metrics = self
            .evaluate::<WindowMetrics>(
                "({ outerWidth: window.outerWidth, outerHeight: window.outerHeight, innerWidth: window.innerWidth, innerHeight: window.innerHeight, screenWidth: screen.width, screenHeight: screen.height })",
            )
            .await?;
        Ok(Some(metrics))
    }

    async fn resize_window(&self, width: u32, height: u32) -> Result<(), BrowserError> {
        self.page
            .evaluate(format!("window.resizeTo({width}, {height});"))
            .await?;
        Ok(())
    }

    async fn arm_popup(&self) -> Result<Box<dyn PopupWatch>, BrowserError> {
        let known = self
            .shared
            .browser
            .pages()
            .await?
            .iter()
            .map(|p| p.target_id().clone())
            .collect();
        Ok(Box::new(ChromePopupWatch {
            shared: Arc::clone(&self.shared),
            known,
        }))
    }

    async fn arm_download(&self) -> Result<Box<dyn DownloadWatch>, BrowserError> {
        std::fs::create_dir_all(&self.shared.download_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.shared.download_dir)?;

        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(staging.path().display().to_string())
            .build()
            .map_err(|e| BrowserError::Protocol(format!("invalid download params: {e}")))?;
        self.page.execute(params).await?;
        debug!(staging = %staging.path().display(), "Download watch armed");

        Ok(Box::new(ChromeDownloadWatch { staging }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page.clone().close().await?;
        Ok(())
    }
}

struct ChromePopupWatch {
    shared: Arc<ChromeShared>,
    known: HashSet<TargetId>,
}

#[async_trait]
impl PopupWatch for ChromePopupWatch {
    async fn wait(self: Box<Self>, timeout: Duration) -> Result<Box<dyn PortalPage>, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            let pages = self.shared.browser.pages().await?;
            if let Some(page) = pages
                .into_iter()
                .find(|p| !self.known.contains(p.target_id()))
            {
                debug!(target = ?page.target_id(), "Popup opened");
                return Ok(Box::new(ChromePage {
                    page,
                    shared: Arc::clone(&self.shared),
                }));
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::timeout("popup window", timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

struct ChromeDownloadWatch {
    staging: tempfile::TempDir,
}

#[async_trait]
impl DownloadWatch for ChromeDownloadWatch {
    async fn wait(self: Box<Self>, timeout: Duration) -> Result<DownloadedFile, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            tokio::time::sleep(DOWNLOAD_POLL_INTERVAL).await;
            if let Some(path) = completed_download(self.staging.path())? {
                debug!(path = %path.display(), "Download completed");
                return Ok(DownloadedFile::in_staging(path, self.staging));
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::timeout("download", timeout));
            }
        }
    }
}

/// The finished download in `dir`, if any.
///
/// Chrome keeps in-flight downloads under a `.crdownload` name and may
/// reserve the final name as an empty file first, so nothing counts as done
/// while a partial entry remains or the candidate is still empty.
fn completed_download(dir: &Path) -> Result<Option<PathBuf>, BrowserError> {
    let mut candidate = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        if name.ends_with(".crdownload") || name.ends_with(".tmp") {
            return Ok(None);
        }
        let metadata = entry.metadata()?;
        if metadata.is_file() && metadata.len() > 0 && candidate.is_none() {
            candidate = Some(path);
        }
    }
    Ok(candidate)
}

/// Find Chrome/Chromium executable.
fn find_chrome() -> Option<String> {
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    ];

    candidates
        .into_iter()
        .find(|candidate| Path::new(candidate).exists())
        .map(str::to_string)
}
