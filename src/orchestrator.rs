//! Top-level run: log in once, then run each configured export flow.
//!
//! Stages run strictly in order and the first failure ends the run. The
//! checking-account flow runs before the card flow when both are enabled.

use anyhow::Result;
use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::credentials::PortalCredentials;
use crate::download::{capture_download, ExportArtifact};
use crate::error::ScrapeError;
use crate::login::{login, LoginPlan};
use crate::models::TransactionRecord;
use crate::navigation::{navigate, NavigationDiagnostics, NavigationPlan, POPUP_WINDOW_SIZE};
use crate::normalize::TransactionNormalizer;
use crate::session::Session;

/// Card export saved and parsed.
#[derive(Debug)]
pub struct CardExport {
    pub artifact: ExportArtifact,
    pub records: Vec<TransactionRecord>,
}

/// What a run produced, per enabled flow.
#[derive(Debug, Default)]
pub struct RunReport {
    pub leumi: Option<ExportArtifact>,
    pub max: Option<CardExport>,
}

pub struct Orchestrator {
    config: ResolvedConfig,
    normalizer: TransactionNormalizer,
}

impl Orchestrator {
    /// Build an orchestrator, loading translation overrides if configured.
    pub fn new(config: ResolvedConfig) -> Result<Self> {
        let normalizer = TransactionNormalizer::from_config(&config)?;
        Ok(Self { config, normalizer })
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &TransactionNormalizer {
        &self.normalizer
    }

    /// Launch the browser on the configured profile and run every enabled flow.
    ///
    /// The browser is closed whether or not the run succeeds.
    #[cfg(feature = "browser")]
    pub async fn run(&self, credentials: &PortalCredentials) -> Result<RunReport> {
        use crate::browser::chrome::LaunchOptions;

        let options = LaunchOptions {
            profile_dir: self.config.profile_dir.clone(),
            download_dir: self.config.download_dir.clone(),
            headless: self.config.headless,
        };
        let mut session = Session::launch(&options).await?;

        let outcome = self.run_with_session(&mut session, credentials).await;
        if let Err(err) = session.close().await {
            warn!(error = %err, "Failed to close browser");
        }
        Ok(outcome?)
    }

    /// Run every enabled flow on an already launched session.
    pub async fn run_with_session(
        &self,
        session: &mut Session,
        credentials: &PortalCredentials,
    ) -> Result<RunReport, ScrapeError> {
        let mut report = RunReport::default();
        if !self.config.do_leumi_flow && !self.config.do_max_flow {
            warn!("No flows enabled; nothing to do");
            return Ok(report);
        }

        info!(
            profile = %session.profile_dir().display(),
            leumi = self.config.do_leumi_flow,
            max = self.config.do_max_flow,
            "Starting run"
        );
        let timeouts = &self.config.timeouts;
        login(
            session,
            &LoginPlan::leumi(&self.config.portal.url),
            credentials,
            timeouts,
        )
        .await?;

        std::fs::create_dir_all(&self.config.download_dir).map_err(|e| {
            ScrapeError::download(format!(
                "could not create {}: {e}",
                self.config.download_dir.display()
            ))
        })?;

        if self.config.do_leumi_flow {
            report.leumi = Some(self.leumi_flow(session).await?);
        }
        if self.config.do_max_flow {
            report.max = Some(self.max_flow(session).await?);
        }
        Ok(report)
    }

    async fn leumi_flow(&self, session: &Session) -> Result<ExportArtifact, ScrapeError> {
        info!("Starting checking-account export");
        let plan = NavigationPlan::leumi();
        let context = navigate(
            session,
            &plan,
            &self.config.timeouts,
            &NavigationDiagnostics::default(),
        )
        .await?;

        let result = capture_download(
            context.page(session),
            &plan.export_trigger,
            &self.config.leumi_export_path(),
            &self.config.timeouts,
        )
        .await;
        context.close().await;
        result
    }

    async fn max_flow(&self, session: &Session) -> Result<CardExport, ScrapeError> {
        info!("Starting card statement export");
        let plan = NavigationPlan::max(&self.config.portal);
        let diagnostics = NavigationDiagnostics {
            debug_dump: Some(self.config.popup_debug_path()),
            popup_window_size: Some(POPUP_WINDOW_SIZE),
        };
        let context = navigate(session, &plan, &self.config.timeouts, &diagnostics).await?;

        let result = capture_download(
            context.page(session),
            &plan.export_trigger,
            &self.config.max_export_path(),
            &self.config.timeouts,
        )
        .await;
        context.close().await;
        let artifact = result?;

        let records = self.normalizer.normalize_file(&artifact.destination)?;
        info!(records = records.len(), "Card export normalized");
        Ok(CardExport { artifact, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn missing_translations_file_is_reported() {
        let mut config = Config::default().resolve(Path::new("/tmp/money"));
        config.translations_file = Some("/nonexistent/translations.toml".into());
        let err = Orchestrator::new(config).err().unwrap();
        assert!(err.to_string().contains("translations"));
    }

    #[test]
    fn translation_overrides_reach_the_normalizer() -> Result<()> {
        let dir = TempDir::new()?;
        let overrides = dir.path().join("translations.toml");
        std::fs::write(&overrides, "[merchants]\n\"מכולת השכונה\" = \"Corner Store\"\n")?;

        let mut config = Config::default().resolve(dir.path());
        config.translations_file = Some(overrides);
        let orchestrator = Orchestrator::new(config)?;

        assert_eq!(
            orchestrator.normalizer().translations().merchant("מכולת השכונה"),
            "Corner Store"
        );
        Ok(())
    }
}
