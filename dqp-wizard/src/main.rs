//! dqp-wizard - Headless driver for the DQPilot processing wizard
//!
//! Runs one scripted wizard pass against a live pipeline backend: discover
//! columns, select all of them, fetch profiles, apply the default preset,
//! submit, and poll the job to a terminal outcome while logging snapshots.

use anyhow::Result;
use clap::Parser;
use dqp_common::config;
use dqp_wizard::services::HttpBackend;
use dqp_wizard::wizard::poller::PollState;
use dqp_wizard::{PollerConfig, WizardController};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "dqp-wizard", version, about = "DQPilot processing wizard (headless)")]
struct Args {
    /// Upload to configure and process
    #[arg(long)]
    upload_id: Uuid,

    /// Display name of the uploaded file
    #[arg(long, default_value = "upload.csv")]
    file_name: String,

    /// Backend base URL (overrides DQP_BACKEND_URL and the config file)
    #[arg(long)]
    backend_url: Option<String>,

    /// Bearer auth token (overrides DQP_AUTH_TOKEN and the config file)
    #[arg(long)]
    auth_token: Option<String>,

    /// Rows sampled per column when profiling
    #[arg(long, default_value_t = 1000)]
    sample_size: usize,

    /// Use the long-running polling variant (10s interval, list fallback)
    #[arg(long)]
    smart: bool,

    /// Explicit config file path
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = match &args.config {
        Some(path) => config::load_toml_config(path)
            .map_err(|e| anyhow::anyhow!("Config load failed: {}", e))?,
        None => config::load_default_config(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(toml_config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting dqp-wizard (headless driver)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let backend_url = config::resolve_backend_url(args.backend_url.as_deref(), &toml_config);
    let auth_token = config::resolve_auth_token(args.auth_token.as_deref(), &toml_config);
    info!("Backend: {}", backend_url);

    let backend = Arc::new(
        HttpBackend::new(backend_url, auth_token)
            .map_err(|e| anyhow::anyhow!("Backend client creation failed: {}", e))?,
    );

    let poller_config = if args.smart {
        PollerConfig::smart()
    } else {
        PollerConfig::interactive()
    };

    let mut controller = WizardController::open_discovered(
        backend,
        poller_config,
        args.upload_id,
        args.file_name.clone(),
    )
    .await?;

    let column_count = controller.session().all_columns.len();
    if column_count == 0 {
        anyhow::bail!("Upload {} has no discoverable columns", args.upload_id);
    }
    info!(columns = column_count, "Columns discovered");

    // Columns step: take everything
    controller.select_all_columns();
    controller.next_step();

    // Profiling step
    controller.fetch_profiles(args.sample_size).await?;
    info!(
        profiles = controller.session().column_profiles.len(),
        "Profiles cached"
    );
    controller.next_step();

    // Settings step: apply the resolved default preset
    match controller.load_presets().await {
        Ok(_) => {
            let default_id = controller
                .available_presets()
                .iter()
                .find(|p| p.is_default)
                .map(|p| p.preset_id.clone());
            if let Some(preset_id) = default_id {
                controller.select_preset(&preset_id).await?;
                info!(preset_id = %preset_id, "Default preset applied");
            }
        }
        Err(e) => warn!("Preset store unavailable, continuing with raw defaults: {}", e),
    }
    controller.next_step();

    // Rules step: keep the suggested defaults
    controller.next_step();

    // Process step: submit and watch
    let mut snapshots = controller.poll_snapshots();
    let observer = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow().clone();
            info!(
                state = ?snapshot.state,
                progress = snapshot.progress,
                "{}",
                snapshot.message
            );
            if matches!(snapshot.state, PollState::Closed | PollState::Error) {
                break;
            }
        }
    });

    let outcome = controller.submit().await;
    observer.abort();

    match outcome {
        Ok(dqp_wizard::wizard::PollOutcome::Completed(report)) => {
            info!(
                status = ?report.status,
                total_rows = ?report.total_rows,
                clean_rows = ?report.clean_rows,
                quarantined_rows = ?report.quarantined_rows,
                dq_score = ?report.dq_score,
                "Processing finished"
            );
            Ok(())
        }
        Ok(dqp_wizard::wizard::PollOutcome::Cancelled) => {
            info!("Observation cancelled; the job continues server-side");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Processing failed: {}", e)),
    }
}
