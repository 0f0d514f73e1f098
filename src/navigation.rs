//! Menu traversal from the authenticated home page to an export control.
//!
//! One state machine serves every export flow; flows differ only in the
//! [`NavigationPlan`] they pass in. Each transition clicks one or more
//! labelled controls and then waits for an element that only exists in the
//! next state. Any miss aborts the traversal with the last state reached;
//! there is no resume, a new attempt always starts from the home page.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::browser::{BrowserError, LabelQuery, PortalPage};
use crate::config::{PortalConfig, TimeoutConfig};
use crate::error::ScrapeError;
use crate::session::{Popup, Session};

/// Size the export popup is resized to before interacting with it.
pub const POPUP_WINDOW_SIZE: (u32, u32) = (1200, 1000);

/// Traversal states, in the order a flow passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NavState {
    AuthenticatedHome,
    CardSection,
    CardDetail,
    ActionsMenu,
    ExportPage,
    ExportPageReady,
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One action within a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Click(LabelQuery),
    /// Click a control that opens a new window; the rest of the traversal
    /// continues in that window.
    OpenPopup(LabelQuery),
    /// Give a just-opened dropdown time to render its options.
    Settle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub to: NavState,
    pub steps: Vec<Step>,
    /// Element whose presence confirms `to` was reached.
    pub ready: Option<LabelQuery>,
}

#[derive(Debug, Clone)]
pub struct NavigationPlan {
    pub name: String,
    pub transitions: Vec<Transition>,
    /// Control that starts the download once `ExportPageReady` is reached.
    pub export_trigger: LabelQuery,
}

impl NavigationPlan {
    /// Credit-card statements: card page, actions menu, then the export popup.
    pub fn max(portal: &PortalConfig) -> Self {
        let statements = "דפי פירוט";
        let card_actions = LabelQuery::contains("פעולות בכרטיס").tag("button");
        let popup_link = LabelQuery::contains(statements).tag("a").within("#main");
        let export = LabelQuery::exact("יצוא לאקסל");

        Self {
            name: "max".to_string(),
            transitions: vec![
                Transition {
                    to: NavState::CardSection,
                    steps: vec![
                        Step::Click(LabelQuery::contains("כרטיסי אשראי").within("app-nav-menu")),
                        Step::Click(LabelQuery::contains(statements).tag("a")),
                    ],
                    ready: Some(LabelQuery::exact(&portal.card_label)),
                },
                Transition {
                    to: NavState::CardDetail,
                    steps: vec![Step::Click(LabelQuery::exact(&portal.card_label))],
                    ready: Some(card_actions.clone()),
                },
                Transition {
                    to: NavState::ActionsMenu,
                    steps: vec![Step::Click(card_actions)],
                    ready: Some(popup_link.clone()),
                },
                Transition {
                    to: NavState::ExportPage,
                    steps: vec![Step::OpenPopup(popup_link)],
                    ready: None,
                },
                Transition {
                    to: NavState::ExportPageReady,
                    steps: vec![
                        Step::Settle,
                        // Rendered as a link on some visits and a button on others.
                        Step::Click(LabelQuery::contains(&portal.card_selector_label)),
                        Step::Settle,
                        Step::Click(LabelQuery::exact("כל הכרטיסים")),
                    ],
                    ready: Some(export.clone()),
                },
            ],
            export_trigger: export,
        }
    }

    /// Checking-account activity: stays in the main window.
    pub fn leumi() -> Self {
        let save = LabelQuery::contains("שמירה").tag("button");
        let proceed = LabelQuery::contains("המשך");

        Self {
            name: "leumi".to_string(),
            transitions: vec![
                Transition {
                    to: NavState::ActionsMenu,
                    steps: vec![
                        Step::Click(LabelQuery::contains("עובר ושב").within("app-nav-menu")),
                        Step::Click(LabelQuery::contains("תנועות בחשבון").tag("a")),
                    ],
                    ready: Some(save.clone()),
                },
                Transition {
                    to: NavState::ExportPageReady,
                    steps: vec![Step::Click(save)],
                    ready: Some(proceed.clone()),
                },
            ],
            export_trigger: proceed,
        }
    }

    /// Check that states only move forward, end at `ExportPageReady`, and
    /// that at most one popup is opened.
    pub fn validate(&self) -> Result<()> {
        let mut previous = NavState::AuthenticatedHome;
        for transition in &self.transitions {
            if transition.to <= previous {
                anyhow::bail!(
                    "plan '{}' moves from {} back to {}",
                    self.name,
                    previous,
                    transition.to
                );
            }
            if transition.steps.is_empty() {
                anyhow::bail!("plan '{}' has no steps into {}", self.name, transition.to);
            }
            previous = transition.to;
        }
        if previous != NavState::ExportPageReady {
            anyhow::bail!("plan '{}' ends at {} instead of ExportPageReady", self.name, previous);
        }
        let popups = self
            .transitions
            .iter()
            .flat_map(|t| &t.steps)
            .filter(|s| matches!(s, Step::OpenPopup(_)))
            .count();
        if popups > 1 {
            anyhow::bail!("plan '{}' opens {} popups", self.name, popups);
        }
        Ok(())
    }
}

/// Where the export control lives once the traversal finished.
pub struct ExportContext {
    popup: Option<Popup>,
}

impl ExportContext {
    pub fn page<'a>(&'a self, session: &'a Session) -> &'a dyn PortalPage {
        match &self.popup {
            Some(popup) => popup.page(),
            None => session.page(),
        }
    }

    pub fn in_popup(&self) -> bool {
        self.popup.is_some()
    }

    /// Close the popup, if the export happened in one.
    pub async fn close(self) {
        if let Some(popup) = self.popup {
            popup.close().await;
        }
    }
}

/// Options that only affect diagnostics, never the traversal outcome.
#[derive(Debug, Clone, Default)]
pub struct NavigationDiagnostics {
    /// Where to dump visible popup text once `ExportPage` is reached.
    pub debug_dump: Option<PathBuf>,
    /// Resize the popup to this size before interacting with it.
    pub popup_window_size: Option<(u32, u32)>,
}

fn failed_at(state: NavState) -> impl FnOnce(BrowserError) -> ScrapeError {
    move |err| ScrapeError::Navigation {
        state,
        reason: err.to_string(),
    }
}

/// Run `plan` from the authenticated home page to `ExportPageReady`.
///
/// A popup opened along the way is closed again if a later transition fails.
pub async fn navigate(
    session: &Session,
    plan: &NavigationPlan,
    timeouts: &TimeoutConfig,
    diagnostics: &NavigationDiagnostics,
) -> Result<ExportContext, ScrapeError> {
    if let Err(err) = plan.validate() {
        return Err(ScrapeError::Navigation {
            state: NavState::AuthenticatedHome,
            reason: err.to_string(),
        });
    }
    if !session.is_authenticated() {
        return Err(ScrapeError::Navigation {
            state: NavState::AuthenticatedHome,
            reason: "session is not authenticated".to_string(),
        });
    }

    let mut popup: Option<Popup> = None;
    match traverse(session, plan, timeouts, diagnostics, &mut popup).await {
        Ok(()) => Ok(ExportContext { popup }),
        Err(err) => {
            if let Some(popup) = popup {
                popup.close().await;
            }
            Err(err)
        }
    }
}

async fn traverse(
    session: &Session,
    plan: &NavigationPlan,
    timeouts: &TimeoutConfig,
    diagnostics: &NavigationDiagnostics,
    popup: &mut Option<Popup>,
) -> Result<(), ScrapeError> {
    let mut state = NavState::AuthenticatedHome;

    for transition in &plan.transitions {
        debug!(plan = %plan.name, from = %state, to = %transition.to, "Transition");

        for step in &transition.steps {
            let page = popup.as_ref().map_or(session.page(), |p| p.page());
            match step {
                Step::Click(query) => {
                    page.click_label(query, timeouts.element)
                        .await
                        .map_err(failed_at(state))?;
                }
                Step::Settle => tokio::time::sleep(timeouts.settle).await,
                Step::OpenPopup(query) => {
                    let watch = page.arm_popup().await.map_err(failed_at(state))?;
                    page.click_label(query, timeouts.element)
                        .await
                        .map_err(failed_at(state))?;
                    let child = watch.wait(timeouts.popup).await.map_err(failed_at(state))?;
                    let adopted = Popup::adopt(child, timeouts.popup)
                        .await
                        .map_err(failed_at(state))?;
                    if let Some(previous) = popup.replace(adopted) {
                        previous.close().await;
                    }
                }
            }
        }

        let page = popup.as_ref().map_or(session.page(), |p| p.page());
        if let Some(ready) = &transition.ready {
            let wait = if transition.to == NavState::ExportPageReady {
                timeouts.export_ready
            } else {
                timeouts.element
            };
            page.wait_for_label(ready, wait)
                .await
                .map_err(failed_at(state))?;
        }

        state = transition.to;
        info!(plan = %plan.name, state = %state, "Reached state");

        if state == NavState::ExportPage {
            if let Some(size) = diagnostics.popup_window_size {
                tune_window(page, size).await;
            }
            if let Some(path) = &diagnostics.debug_dump {
                write_debug_dump(page, path).await;
            }
        }
    }

    Ok(())
}

async fn tune_window(page: &dyn PortalPage, (width, height): (u32, u32)) {
    match page.window_metrics().await {
        Ok(Some(m)) => info!(
            outer = %format!("{}x{}", m.outer_width, m.outer_height),
            inner = %format!("{}x{}", m.inner_width, m.inner_height),
            screen = %format!("{}x{}", m.screen_width, m.screen_height),
            "Popup window size"
        ),
        Ok(None) => {}
        Err(err) => warn!(error = %err, "Failed to read popup window size"),
    }
    if let Err(err) = page.resize_window(width, height).await {
        warn!(error = %err, "Failed to resize popup window");
    }
}

/// Dump visible page text for diagnosing label drift. Failures are logged
/// and otherwise ignored.
pub async fn write_debug_dump(page: &dyn PortalPage, path: &Path) {
    let texts = match page.visible_texts().await {
        Ok(texts) => texts,
        Err(err) => {
            warn!(error = %err, "Failed to collect visible texts for debug dump");
            return;
        }
    };

    let mut content = String::new();
    for text in texts.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        content.push_str(text);
        content.push('\n');
    }

    match tokio::fs::write(path, content).await {
        Ok(()) => debug!(path = %path.display(), lines = texts.len(), "Wrote debug dump"),
        Err(err) => warn!(path = %path.display(), error = %err, "Failed to write debug dump"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_plans_are_valid() {
        NavigationPlan::max(&PortalConfig::default()).validate().unwrap();
        NavigationPlan::leumi().validate().unwrap();
    }

    #[test]
    fn max_plan_uses_configured_card_labels() {
        let portal = PortalConfig {
            card_label: "MAX 1234".to_string(),
            card_selector_label: "max family".to_string(),
            ..Default::default()
        };
        let plan = NavigationPlan::max(&portal);
        assert_eq!(
            plan.transitions[1].steps,
            vec![Step::Click(LabelQuery::exact("MAX 1234"))]
        );
        assert!(plan.transitions[4]
            .steps
            .contains(&Step::Click(LabelQuery::contains("max family"))));
        assert_eq!(plan.export_trigger, LabelQuery::exact("יצוא לאקסל"));
    }

    #[test]
    fn validate_rejects_backwards_transition() {
        let mut plan = NavigationPlan::leumi();
        plan.transitions.swap(0, 1);
        assert!(plan.validate().is_err());
    }

    #[test]
    fn validate_rejects_plan_ending_early() {
        let mut plan = NavigationPlan::max(&PortalConfig::default());
        plan.transitions.pop();
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("ExportPage"));
    }

    #[test]
    fn validate_rejects_second_popup() {
        let mut plan = NavigationPlan::max(&PortalConfig::default());
        plan.transitions[4]
            .steps
            .push(Step::OpenPopup(LabelQuery::exact("עוד")));
        assert!(plan.validate().is_err());
    }

    #[test]
    fn state_names_display_as_variants() {
        assert_eq!(NavState::ExportPageReady.to_string(), "ExportPageReady");
    }
}
