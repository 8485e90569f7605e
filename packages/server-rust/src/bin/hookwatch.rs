//! `hookwatch` server binary.
//!
//! Startup order: configuration, tracing, monitoring (fail-fast), pipeline,
//! HTTP. On Ctrl-C the listener drains, the batcher is flushed and
//! destroyed, and monitoring shuts down last.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hookwatch_core::{ClockSource, SystemClock};
use hookwatch_server::cli::Cli;
use hookwatch_server::logging::{init_tracing, TracingLogger};
use hookwatch_server::monitoring::{HttpNodeProbe, MonitoringOrchestrator};
use hookwatch_server::network::NetworkModule;
use hookwatch_server::service::batcher::EventBatcher;
use hookwatch_server::service::pipeline::ChainhookPipeline;
use hookwatch_server::service::router::{LoggingHandler, OperationRouter};
use hookwatch_server::storage::MemoryStore;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;
    init_tracing(config.log_format)?;

    let clock: Arc<dyn ClockSource> = Arc::new(SystemClock);

    let monitor = Arc::new(MonitoringOrchestrator::new(
        config.monitor.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(HttpNodeProbe::default()),
        Arc::clone(&clock),
        TracingLogger::shared("monitoring"),
    ));
    monitor
        .initialize()
        .await
        .context("monitoring failed to initialize")?;

    let router = Arc::new(OperationRouter::new(TracingLogger::shared("router")));
    router.set_default_route(Arc::new(LoggingHandler::new(TracingLogger::shared(
        "operations",
    ))));

    let batcher = EventBatcher::new(
        config.batcher.clone(),
        TracingLogger::shared("batcher"),
        Arc::clone(&clock),
    )?;
    let pipeline = Arc::new(ChainhookPipeline::new(
        batcher,
        router,
        &monitor,
        clock,
        TracingLogger::shared("pipeline"),
    ));

    let mut network = NetworkModule::new(
        config.network.clone(),
        Arc::clone(&pipeline),
        Arc::clone(&monitor),
    );
    let port = network.start().await?;
    info!(port, node_url = %config.monitor.node_url, "hookwatch ready");

    network
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for Ctrl-C: {e}");
            }
            info!("shutdown requested");
        })
        .await?;

    let flushed = pipeline.batcher().flush().await;
    pipeline.batcher().destroy();
    info!(flushed, "batcher drained");

    monitor.shutdown().await?;
    info!("hookwatch stopped");
    Ok(())
}
