use super::HandlerUtils;
use crate::config::IndexerConfig;
use crate::context::IndexerContext;
use crate::metrics::IndexerMetrics;
use crate::monitor::RpcMonitor;
use anyhow::{Context, Result};
use common::logging::init_logging;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub async fn handle_start(config_path: Option<&Path>) -> Result<()> {
    let config = prepare(config_path)?;
    HandlerUtils::print_info("Starting RPC Indexer...");

    IndexerMetrics::new(config.metrics.clone()).start_server()?;

    let context = IndexerContext::open(config).await?;
    let monitor = RpcMonitor::new(&context);
    let result = monitor.run(shutdown_signal()).await;

    context.close().await;
    result.context("Measurement loop stopped")?;

    HandlerUtils::print_success("RPC Indexer shutdown complete");
    Ok(())
}

pub async fn handle_run_once(config_path: Option<&Path>) -> Result<()> {
    let config = prepare(config_path)?;

    let context = IndexerContext::open(config).await?;
    let monitor = RpcMonitor::new(&context);
    let result = monitor.run_once().await;
    context.close().await;

    let summary = result.context("Measurement cycle failed")?;
    HandlerUtils::print_success(&format!(
        "Cycle {} recorded: {} elected, {} reachable, {} unreachable ({} without endpoint)",
        summary.measurement_id,
        summary.elected,
        summary.reachable,
        summary.unreachable,
        summary.unresolved
    ));
    Ok(())
}

pub async fn handle_gen_config(output: PathBuf) -> Result<()> {
    let config = IndexerConfig::default();
    let toml_content = toml::to_string_pretty(&config)?;
    std::fs::write(&output, toml_content)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    HandlerUtils::print_success(&format!(
        "Generated configuration file: {}",
        output.display()
    ));
    HandlerUtils::print_info("Set schedule.migration_block before starting");
    Ok(())
}

pub async fn handle_check_config(config_path: Option<&Path>) -> Result<()> {
    let config = HandlerUtils::load_config(config_path)?;
    HandlerUtils::validate_config(&config)?;
    HandlerUtils::print_success(&format!(
        "Configuration valid: network {} via {}",
        config.network.name, config.network.node_url
    ));
    Ok(())
}

/// Load, validate and start logging
fn prepare(config_path: Option<&Path>) -> Result<IndexerConfig> {
    let config = HandlerUtils::load_config(config_path)?;
    HandlerUtils::validate_config(&config)?;
    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;
    info!(version = env!("CARGO_PKG_VERSION"), "Configuration loaded");
    Ok(config)
}

/// Resolves on ctrl-c or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}
