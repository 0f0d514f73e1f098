use anyhow::Result;
use money_monitor::login::{login, LoginPlan, LoginStep};
use money_monitor::ScrapeError;

mod support;
use support::{credentials, fast_timeouts, ScriptedPortal};

const LANDING: &str = "https://www.leumi.co.il/he";

#[tokio::test]
async fn login_walks_the_form_and_marks_session_authenticated() -> Result<()> {
    let portal = ScriptedPortal::new();
    let mut session = portal.session();

    login(&mut session, &LoginPlan::leumi(LANDING), &credentials(), &fast_timeouts()).await?;

    assert!(session.is_authenticated());
    assert_eq!(
        portal.actions(),
        vec![
            format!("main: goto {LANDING}"),
            "main: click כניסה לחשבונך".to_string(),
            "main: fill input[type='text']".to_string(),
            "main: fill input[type='password']".to_string(),
            "main: click כניסה לחשבון".to_string(),
        ]
    );
    assert!(portal.url().contains("SPA.aspx"));
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_fail_at_post_login_marker() {
    let portal = ScriptedPortal::new().rejecting_login();
    let mut session = portal.session();

    let err = login(&mut session, &LoginPlan::leumi(LANDING), &credentials(), &fast_timeouts())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScrapeError::Authentication {
            step: LoginStep::PostLoginMarker,
            ..
        }
    ));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn missing_marker_element_fails_even_on_the_right_url() {
    let portal = ScriptedPortal::new().without_selector("app-nav-menu");
    let mut session = portal.session();

    let err = login(&mut session, &LoginPlan::leumi(LANDING), &credentials(), &fast_timeouts())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScrapeError::Authentication {
            step: LoginStep::PostLoginMarker,
            ..
        }
    ));
}

#[tokio::test]
async fn missing_entry_link_fails_before_any_credentials_are_typed() {
    let portal = ScriptedPortal::new().without_label("כניסה לחשבונך");
    let mut session = portal.session();

    let err = login(&mut session, &LoginPlan::leumi(LANDING), &credentials(), &fast_timeouts())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScrapeError::Authentication {
            step: LoginStep::OpenLoginEntry,
            ..
        }
    ));
    assert!(!portal.actions().iter().any(|a| a.contains("fill")));
}

#[tokio::test]
async fn missing_password_field_fails_while_awaiting_form() {
    let portal = ScriptedPortal::new().without_selector("input[type='password']");
    let mut session = portal.session();

    let err = login(&mut session, &LoginPlan::leumi(LANDING), &credentials(), &fast_timeouts())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), "login");
    assert!(matches!(
        err,
        ScrapeError::Authentication {
            step: LoginStep::AwaitForm,
            ..
        }
    ));
}

#[tokio::test]
async fn login_is_attempted_once() {
    let portal = ScriptedPortal::new().rejecting_login();
    let mut session = portal.session();

    let _ = login(&mut session, &LoginPlan::leumi(LANDING), &credentials(), &fast_timeouts()).await;

    let submits = portal
        .actions()
        .iter()
        .filter(|a| *a == "main: click כניסה לחשבון")
        .count();
    assert_eq!(submits, 1);
}
