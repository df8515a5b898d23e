use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use harvest_bus::{AmqpBus, BaseConsumer, MessageBus, QueueBinding};
use harvest_common::BrokerConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use harvest_supervisor::{ProcessSupervisor, StreamController};

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("harvest=info".parse()?))
        .init();

    info!("harvest stream controller starting");

    let broker_config = BrokerConfig::from_env();
    broker_config.log_redacted();

    let working_dir = required_env("HARVEST_WORKING_DIR");
    let watched_dir = required_env("HARVEST_CONF_DIR");
    let harvester_command =
        std::env::var("HARVESTER_COMMAND").unwrap_or_else(|_| "sfm-harvester".to_string());

    let bus: Arc<dyn MessageBus> = Arc::new(AmqpBus::connect(&broker_config).await?);

    let supervisor = Arc::new(ProcessSupervisor::new(Duration::from_secs(30)));
    let controller = StreamController::new(supervisor.clone(), watched_dir, harvester_command);

    let consumer = BaseConsumer::new(bus, working_dir, controller);
    let stop_queue = format!("harvest_stop.{}", hostname());
    consumer
        .declare_queues(&[
            QueueBinding::new("harvest_start", &["harvest.start.*.*"]),
            QueueBinding::new(stop_queue, &["harvest.stop.*.*"]),
        ])
        .await?;
    consumer.resume_from_file().await?;

    let stop_token = consumer.stop_token();
    let run_handle = tokio::spawn(async move { consumer.run().await });

    wait_for_terminate().await?;
    info!("shutdown signal received, pausing then stopping every managed process");
    supervisor.pause_all().await;
    stop_token.cancel();
    run_handle.await??;
    supervisor.stop_all().await;

    info!("harvest stream controller stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_terminate() -> Result<()> {
    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    term.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_terminate() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
