use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use money_monitor::config::{default_config_path, ResolvedConfig};
use money_monitor::credentials::{EnvCredentialStore, PortalCredentials};
use money_monitor::duration::format_duration;
use money_monitor::models::{PeriodKey, TransactionRecord};
use money_monitor::normalize::TransactionNormalizer;
use money_monitor::orchestrator::Orchestrator;
use money_monitor::summary::{self, MonthlySummary, DEFAULT_TOP_MERCHANTS};
use money_monitor::ScrapeError;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Prefix of the environment variables holding the portal login.
const CREDENTIALS_ENV_PREFIX: &str = "LEUMI";

#[derive(Parser)]
#[command(name = "money-monitor")]
#[command(about = "Fetch card statement exports and summarize monthly spending")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")"))]
struct Cli {
    /// Path to config file (defaults to ./money-monitor.toml, then the data directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and download the enabled exports
    Fetch,

    /// Parse a card statement export and print its transactions
    Normalize {
        file: PathBuf,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Monthly spending breakdown of a card statement export
    Summary {
        /// Export to read (defaults to the last fetched card export)
        file: Option<PathBuf>,

        /// Month to summarize, YYYY-MM (defaults to the latest in the file)
        #[arg(long)]
        month: Option<PeriodKey>,

        /// Number of merchants to list
        #[arg(long, default_value_t = DEFAULT_TOP_MERCHANTS)]
        top: usize,

        #[arg(long)]
        json: bool,
    },

    /// Show current configuration
    Config,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,chromiumoxide=warn,chromiumoxide::conn=off,chromiumoxide::handler=off")
    });
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ScrapeError>() {
                Some(scrape) => error!(stage = scrape.stage(), "{scrape}"),
                None => error!("{err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = ResolvedConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;

    match cli.command {
        Command::Fetch => fetch(config).await,
        Command::Normalize { file, json } => {
            let records = TransactionNormalizer::from_config(&config)?.normalize_file(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_records(&records);
            }
            Ok(())
        }
        Command::Summary {
            file,
            month,
            top,
            json,
        } => {
            let file = file.unwrap_or_else(|| config.max_export_path());
            let records = TransactionNormalizer::from_config(&config)?.normalize_file(&file)?;
            let period = match month {
                Some(month) => month,
                None => summary::latest_period(&records).context("Export has no transactions")?,
            };
            let monthly = summary::summarize_month(&records, period, top);
            if json {
                let output = serde_json::json!({
                    "available_periods": summary::available_periods(&records),
                    "summary": monthly,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_summary(&file, &summary::available_periods(&records), &monthly);
            }
            Ok(())
        }
        Command::Config => {
            println!("Config file: {}", config_path.display());
            println!("Profile directory: {}", config.profile_dir.display());
            println!("Download directory: {}", config.download_dir.display());
            println!("Portal: {}", config.portal.url);
            println!("Card: {}", config.portal.card_label);
            println!("Leumi flow: {}", on_off(config.do_leumi_flow));
            println!("Max flow: {}", on_off(config.do_max_flow));
            println!("Headless: {}", on_off(config.headless));
            if let Some(path) = &config.translations_file {
                println!("Translations: {}", path.display());
            }
            let t = &config.timeouts;
            println!(
                "Timeouts: navigation {}, element {}, form field {}, popup {}, download {}, export ready {}, settle {}",
                format_duration(t.navigation),
                format_duration(t.element),
                format_duration(t.form_field),
                format_duration(t.popup),
                format_duration(t.download),
                format_duration(t.export_ready),
                format_duration(t.settle)
            );
            Ok(())
        }
    }
}

async fn fetch(config: ResolvedConfig) -> Result<()> {
    // Checked before launching so a missing variable never opens a browser.
    let store = EnvCredentialStore::new(CREDENTIALS_ENV_PREFIX);
    let credentials = PortalCredentials::load(&store).await.with_context(|| {
        format!("Set {CREDENTIALS_ENV_PREFIX}_USERNAME and {CREDENTIALS_ENV_PREFIX}_PASSWORD")
    })?;

    let orchestrator = Orchestrator::new(config)?;
    let report = orchestrator.run(&credentials).await?;

    if let Some(leumi) = &report.leumi {
        info!(path = %leumi.destination.display(), bytes = leumi.bytes, "Checking-account export saved");
        println!("Saved {} ({} bytes)", leumi.destination.display(), leumi.bytes);
    }
    if let Some(max) = &report.max {
        println!(
            "Saved {} ({} bytes, {} transactions)",
            max.artifact.destination.display(),
            max.artifact.bytes,
            max.records.len()
        );
    }
    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn print_records(records: &[TransactionRecord]) {
    for record in records {
        println!(
            "{}  {:>10}  {:<4}  {}  [{}]",
            record.date,
            record.amount,
            record.card.as_deref().unwrap_or("-"),
            record.business_translated,
            record.category_translated
        );
    }
    println!("{} transactions", records.len());
}

fn print_summary(file: &Path, periods: &[PeriodKey], monthly: &MonthlySummary) {
    let periods: Vec<String> = periods.iter().map(ToString::to_string).collect();
    println!("Export: {}", file.display());
    println!("Months: {}", periods.join(", "));
    println!();
    println!(
        "{}: {} across {} transactions",
        monthly.period, monthly.total, monthly.transaction_count
    );

    println!("\nDaily");
    for day in &monthly.daily {
        println!("  {}  {:>10}  ({})", day.date, day.total, day.transaction_count);
    }

    println!("\nBy category");
    for entry in &monthly.by_category {
        println!("  {:>10}  {}", entry.total, entry.key);
    }

    println!("\nTop merchants");
    for entry in &monthly.top_merchants {
        println!("  {:>10}  {}", entry.total, entry.key);
    }

    println!("\nBy card");
    for card in &monthly.by_card {
        println!(
            "  {:>10}  {}",
            card.total,
            card.card.as_deref().unwrap_or("(none)")
        );
    }
}
