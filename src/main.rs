use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use lead_ack::clock::SystemClock;
use lead_ack::config::{self, AppConfig, FollowupConfig, StoreConfig};
use lead_ack::notify::{AcknowledgementTemplate, SmtpNotifier};
use lead_ack::personalize::PolishSalutations;
use lead_ack::pipeline::lifecycle::LifecycleEngine;
use lead_ack::pipeline::runner::{run_ack_pass, run_followup_pass};
use lead_ack::store::{LibSqlBackend, RecordStore};

/// Acknowledge new sales leads and flag overdue follow-ups.
#[derive(Parser)]
#[command(name = "lead-ack", version, about)]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile leads and send pending acknowledgements.
    Ack {
        /// Create missing status rows and list actionable leads, send nothing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Flag sent leads whose follow-up deadline has passed.
    Followups,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let _log_guard = init_tracing(&cli.log_level)?;

    match cli.command {
        Command::Ack { dry_run } => ack(dry_run).await,
        Command::Followups => followups().await,
    }
}

/// Console logging, plus a daily file under `LEADS_LOG_DIR` when set.
fn init_tracing(default_level: &str) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .with_context(|| format!("Invalid log level: {default_level}"))?;

    let (file_layer, guard) = match config::log_dir(&config::env_lookup) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "lead-ack.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn open_store(store: &StoreConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    let backend = LibSqlBackend::new_local(&store.db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", store.db_path.display()))?;
    Ok(Arc::new(backend))
}

async fn ack(dry_run: bool) -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    info!(
        env = %config.app_env,
        db = %config.store.db_path.display(),
        timezone = %config.schedule.timezone,
        dry_run,
        "Starting acknowledgement pass"
    );

    let template = AcknowledgementTemplate::new(
        config.message.calendar_link.clone(),
        config.message.attachments.clone(),
    )?;
    let notifier = SmtpNotifier::new(&config.smtp).context("Invalid SMTP configuration")?;
    let store = open_store(&config.store).await?;

    let engine = LifecycleEngine::new(
        Arc::clone(&store),
        Arc::new(notifier),
        Arc::new(PolishSalutations),
        template,
        Arc::new(SystemClock),
        config.schedule,
        config.store.status_table.clone(),
    );

    let summary = run_ack_pass(store.as_ref(), &engine, &config.store, dry_run).await?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

async fn followups() -> anyhow::Result<()> {
    let config = FollowupConfig::from_env().context("Invalid configuration")?;
    info!(
        env = %config.app_env,
        db = %config.store.db_path.display(),
        timezone = %config.schedule.timezone,
        "Starting follow-up scan"
    );

    let store = open_store(&config.store).await?;
    let summary =
        run_followup_pass(store, Arc::new(SystemClock), &config.schedule, &config.store).await?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
