//! ER wait-time capture: long-running entrypoint.
//! Starts one poller per supported city and runs until Ctrl-C / SIGTERM.

use anyhow::Result;
use er_wait_capture::{telemetry, Settings, Supervisor};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("ctrl-c handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    // Missing env / bad config is a deployment error: fail fast.
    let settings = Settings::from_env()?;
    if let Some(addr) = telemetry::init_metrics_from_env()? {
        info!(%addr, "prometheus exporter listening");
    }
    let supervisor = Supervisor::from_settings(&settings)?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested; pollers stop at their next pause");
        trigger.cancel();
    });

    info!("data capturing starting");
    supervisor.run_all(cancel).await;
    Ok(())
}
