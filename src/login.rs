//! Portal login: a single fail-fast pass through the credential form.
//!
//! Failures are not retried: a second submission with a bad password
//! counts toward the portal's lockout limit.

use std::fmt;

use secrecy::ExposeSecret;
use tracing::info;

use crate::browser::{BrowserError, LabelQuery};
use crate::config::TimeoutConfig;
use crate::credentials::PortalCredentials;
use crate::error::ScrapeError;
use crate::session::Session;

/// The stages of a login attempt, reported when one of them fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    OpenLanding,
    OpenLoginEntry,
    AwaitForm,
    FillCredentials,
    Submit,
    PostLoginMarker,
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginStep::OpenLanding => "open landing page",
            LoginStep::OpenLoginEntry => "open login entry",
            LoginStep::AwaitForm => "await credential form",
            LoginStep::FillCredentials => "fill credentials",
            LoginStep::Submit => "submit",
            LoginStep::PostLoginMarker => "post-login marker",
        };
        f.write_str(name)
    }
}

/// Selectors and labels for one portal's login sequence.
#[derive(Debug, Clone)]
pub struct LoginPlan {
    pub landing_url: String,
    pub entry: LabelQuery,
    pub username_selector: String,
    pub password_selector: String,
    pub submit: LabelQuery,
    /// Fragment the URL must contain once logged in.
    pub landed_url_fragment: String,
    /// Selector of an element only rendered for authenticated users.
    pub landed_marker: String,
}

impl LoginPlan {
    /// Login sequence of the Leumi portal.
    pub fn leumi(landing_url: impl Into<String>) -> Self {
        Self {
            landing_url: landing_url.into(),
            entry: LabelQuery::contains("כניסה לחשבונך"),
            username_selector: "input[type='text']".to_string(),
            password_selector: "input[type='password']".to_string(),
            // The entry link text also contains this label; only the button submits.
            submit: LabelQuery::contains("כניסה לחשבון").tag("button"),
            landed_url_fragment: "SPA.aspx".to_string(),
            landed_marker: "app-nav-menu".to_string(),
        }
    }
}

fn at(step: LoginStep) -> impl FnOnce(BrowserError) -> ScrapeError {
    move |source| ScrapeError::Authentication { step, source }
}

/// Drive `session` from a blank page to the authenticated landing page.
///
/// On failure the page is left wherever it stopped; the caller decides
/// whether to abort or start over.
pub async fn login(
    session: &mut Session,
    plan: &LoginPlan,
    credentials: &PortalCredentials,
    timeouts: &TimeoutConfig,
) -> Result<(), ScrapeError> {
    let page = session.page();

    info!(url = %plan.landing_url, "Opening portal");
    page.goto(&plan.landing_url, timeouts.navigation)
        .await
        .map_err(at(LoginStep::OpenLanding))?;

    page.click_label(&plan.entry, timeouts.element)
        .await
        .map_err(at(LoginStep::OpenLoginEntry))?;

    page.wait_until_ready(timeouts.navigation)
        .await
        .map_err(at(LoginStep::AwaitForm))?;
    page.wait_for_selector(&plan.username_selector, timeouts.form_field)
        .await
        .map_err(at(LoginStep::AwaitForm))?;
    page.wait_for_selector(&plan.password_selector, timeouts.form_field)
        .await
        .map_err(at(LoginStep::AwaitForm))?;

    info!("Filling in credentials");
    page.fill(
        &plan.username_selector,
        credentials.username.expose_secret(),
        timeouts.form_field,
    )
    .await
    .map_err(at(LoginStep::FillCredentials))?;
    page.fill(
        &plan.password_selector,
        credentials.password.expose_secret(),
        timeouts.form_field,
    )
    .await
    .map_err(at(LoginStep::FillCredentials))?;

    page.click_label(&plan.submit, timeouts.element)
        .await
        .map_err(at(LoginStep::Submit))?;

    page.wait_until_ready(timeouts.navigation)
        .await
        .map_err(at(LoginStep::PostLoginMarker))?;
    page.wait_for_url(&plan.landed_url_fragment, timeouts.navigation)
        .await
        .map_err(at(LoginStep::PostLoginMarker))?;
    page.wait_for_selector(&plan.landed_marker, timeouts.element)
        .await
        .map_err(at(LoginStep::PostLoginMarker))?;

    session.mark_authenticated();
    info!("Logged in");
    Ok(())
}
