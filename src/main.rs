// =============================================================================
// Crypto Audit — Main Entry Point
// =============================================================================
//
// Runs the multi-signal audit on a fixed interval: resolve the symbol
// universe, audit every symbol, rank, publish the report and print its
// narrative.  Ctrl-C stops the current run before its next symbol.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod app_state;
mod audit;
mod binance;
mod error;
mod features;
mod indicators;
mod inference;
mod market_data;
mod report;
mod runtime_config;
mod sentiment;
mod signals;
mod types;

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::audit::BatchOrchestrator;
use crate::binance::BinanceClient;
use crate::runtime_config::AuditConfig;
use crate::sentiment::ConfiguredSentiment;

const CONFIG_PATH: &str = "audit_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Crypto Audit — Starting Up                       ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = AuditConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        let defaults = AuditConfig::default();
        if !Path::new(CONFIG_PATH).exists() {
            if let Err(e) = defaults.save(CONFIG_PATH) {
                warn!(error = %e, "Could not write default config");
            }
        }
        defaults
    });
    config.apply_env_overrides();
    config.validate()?;

    info!(
        quote_asset = %config.quote_asset,
        explicit_symbols = config.symbols.len(),
        universe_size = config.universe_size,
        interval = %config.candle_interval,
        every_secs = config.audit_interval_secs,
        "Audit configured"
    );

    // ── 2. Collaborators ─────────────────────────────────────────────────
    let sentiment = Arc::new(ConfiguredSentiment::from_url(config.sentiment_url.as_deref())?);
    let binance_client = Arc::new(BinanceClient::new()?);
    let audit_interval = config.audit_interval();
    let model_path = config.model_path.clone();

    // ── 3. Shared state ──────────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));
    if let Err(e) = state.models.load_from_path(&model_path) {
        // Retried at the start of every run.
        warn!(error = %e, path = %model_path.display(), "Model not loaded at startup");
    }

    let orchestrator = BatchOrchestrator::new(binance_client.clone(), sentiment, state.clone());

    // ── 4. Shutdown signal ───────────────────────────────────────────────
    let cancel = orchestrator.cancel_handle();
    let shutdown = Arc::new(Notify::new());
    {
        let cancel = cancel.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Shutdown signal received — finishing current symbol");
                cancel.store(true, Ordering::SeqCst);
                shutdown.notify_one();
            }
        });
    }

    // ── 5. Audit loop ────────────────────────────────────────────────────
    info!("Audit loop running. Press Ctrl+C to stop.");
    let mut interval = tokio::time::interval(audit_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.notified() => break,
        }

        match orchestrator.run_scheduled().await {
            Ok(report) => println!("{}", report.narrative()),
            Err(e) => error!(error = %e, "Audit run failed"),
        }

        let snapshot = state.build_snapshot();
        info!(
            version = snapshot.report_version,
            rows = snapshot.last_row_count,
            errors = snapshot.last_error_count,
            model_loaded = snapshot.model_loaded,
            used_weight_1m = binance_client.rate_limit().snapshot().used_weight_1m,
            uptime_secs = snapshot.uptime_secs,
            "status"
        );

        if cancel.load(Ordering::SeqCst) {
            break;
        }
    }

    info!("Crypto Audit shut down complete.");
    Ok(())
}
