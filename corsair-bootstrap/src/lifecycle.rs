use anyhow::Result;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::gateway_bridge::spawn_gateway_bridge;

pub async fn run() -> Result<()> {
    let context = AppContext::new().await?;
    let state = context.state;

    // Warm the price table up front; a failure is survivable because the
    // cache retries on first use.
    if let Err(err) = state.pricing.ensure_ready().await {
        warn!(error = %err, "price table warm-up failed, will retry on demand");
    }

    spawn_gateway_bridge(state.clone());
    info!("corsair is up, waiting for gateway traffic");

    shutdown_signal().await;
    info!(
        "shutting down; final counters:\n{}",
        state.metrics.render_prometheus()
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("sigterm handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
