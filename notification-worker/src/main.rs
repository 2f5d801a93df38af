use metrics_exporter_dogstatsd::DogStatsDBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use notification_worker::health;
use notification_worker::types::environment::Environment;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = Environment::from_env();

    // Use JSON format for staging/production, regular format for development
    if env.json_logs() {
        fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        fmt().with_env_filter(EnvFilter::from_default_env()).init();
    }

    info!("Starting Notification Worker in {} environment", env);

    // Without an agent the counters stay no-ops
    if let Some(agent) = env.metrics_agent_address() {
        DogStatsDBuilder::default()
            .with_remote_address(agent.as_str())?
            .install()?;
        info!(%agent, "Initialized DogStatsD metrics");
    }

    // Single shutdown token for everything
    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
                signal_token.cancel();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });

    // Storefront hosts call `notification_worker::start` in-process and hand
    // `notifier` to their checkout path; standalone, the process only drains
    // and reports through /health.
    let service = notification_worker::start(&env, shutdown_token.clone())?;

    let health_handle = {
        let queue = service.queue.clone();
        let token = shutdown_token.clone();
        let port = env.health_port();
        tokio::spawn(async move {
            if let Err(e) = health::start_health_server(queue, port, token).await {
                error!("Health server error: {}", e);
            }
        })
    };

    shutdown_token.cancelled().await;
    service.worker.shutdown().await?;
    health_handle.await.ok();

    info!("Notification Worker stopped");
    Ok(())
}
