//! Drowsiness Monitor - Main Entry Point

use alerting::{
    AlertArbiter, CannedTextService, HttpTextService, NotificationDispatcher, TerminalBell, TextBackend,
};
use anyhow::Context;
use camera_capture::open_source;
use dms::{DmsModule, ScriptedPerception};
use metrics_exporter_prometheus::PrometheusBuilder;
use monitor::{init_logging, run_server, AppState, DetectionSession, MonitorConfig, Pipeline};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = MonitorConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    init_logging(&config.logging)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Configuration loaded from {}", path.display());
    }

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    let source = open_source(&config.camera).context("failed to open frame source")?;

    warn!(
        "No perception model backend configured; using scripted perception ({} segments)",
        config.scenario.segments.len()
    );
    let perception = ScriptedPerception::new(
        config.scenario.segments.clone(),
        config.dms.eye_classes,
        config.dms.mouth_classes,
    );
    let dms = DmsModule::new(
        config.dms.clone(),
        Box::new(perception.clone()),
        Box::new(perception.clone()),
        Box::new(perception),
    )
    .context("failed to initialise driver monitoring")?;

    let text = match &config.notify.api_key {
        Some(key) => TextBackend::Http(
            HttpTextService::new(&config.notify, key.clone()).context("failed to build text service client")?,
        ),
        None => {
            warn!("No text service API key; alerts use the fallback message");
            TextBackend::Canned(CannedTextService::new(config.notify.fallback_message.clone()))
        }
    };
    let dispatcher = NotificationDispatcher::new(text, TerminalBell, config.notify.clone(), Handle::current());

    let session = DetectionSession::new(
        dms,
        AlertArbiter::new(config.alert.clone()),
        dispatcher,
        config.notify.vehicle_speed_kmh,
    );
    let pipeline = Pipeline::spawn(source, session, &config.relay)?;

    let shutdown = shutdown_signal(pipeline.stopped());
    if config.server.enabled {
        let state = Arc::new(AppState::new(pipeline.status(), pipeline.commands(), Some(metrics)));
        run_server(&config.server.bind, state, shutdown).await?;
    } else {
        shutdown.await;
    }

    let summary = tokio::task::spawn_blocking(move || pipeline.shutdown())
        .await
        .context("shutdown task failed")??;
    info!(
        "Exiting: {} frames read, {} dropped, {} processed",
        summary.capture.frames_read, summary.capture.frames_dropped, summary.processing.frames_processed
    );

    Ok(())
}

/// Resolves on Ctrl-C or when the pipeline stops by itself
async fn shutdown_signal(stopped: impl Future<Output = ()>) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Ctrl-C received"),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        },
        _ = stopped => info!("Pipeline stopped"),
    }
}
