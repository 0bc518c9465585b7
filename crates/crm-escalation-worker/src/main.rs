//! OpenSASE CRM Escalation Worker - Main Entry Point

use std::sync::Arc;

use anyhow::Context;
use crm_support::infrastructure::{SystemClock, TracingAuditLog, TracingNotificationService};
use crm_support::{ConfigError, SupportConfig, SupportEngine};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ENV_CONFIG_PATH: &str = "CRM_SUPPORT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "/etc/crm/support.json";

fn load_config() -> anyhow::Result<SupportConfig> {
    let path = std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

    let config = match SupportConfig::load(&path) {
        Ok(config) => config,
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(%path, "Config not found, using defaults");
            SupportConfig::default()
        }
        Err(e) => return Err(e).with_context(|| format!("loading {}", path)),
    };

    config.with_env_overrides().context("applying environment overrides")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("OpenSASE CRM escalation worker v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    tracing::info!(
        system_user = %config.system_user_id,
        page_size = config.sweep.page_size,
        interval_secs = config.sweep.interval_secs,
        deadline_secs = config.sweep.deadline_secs,
        "Configuration loaded"
    );

    let engine = SupportEngine::in_memory(
        config.clone(),
        Arc::new(SystemClock),
        Arc::new(TracingNotificationService),
        Arc::new(TracingAuditLog),
    );
    if config.seed.is_empty() {
        tracing::warn!("No seed data configured; the sweep has nothing to escalate");
    }
    engine.seed(&config.seed).await.context("loading seed data")?;
    let scheduler = engine.scheduler();

    let cancel = CancellationToken::new();
    let worker = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    tracing::info!("Shutdown requested");
    cancel.cancel();
    worker.await.context("scheduler task panicked")?;

    Ok(())
}
