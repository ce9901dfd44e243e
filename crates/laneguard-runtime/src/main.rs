//! laneguard - roadway accident response service

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use laneguard_core::{LaneguardError, LaneguardResult};
use laneguard_runtime::{
    init_logging, router, spawn_liveness_sweep, Orchestrator, RuntimeConfig,
};

#[tokio::main]
async fn main() {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("laneguard: {}", e);
            std::process::exit(2);
        }
    };
    if let Err(e) = init_logging(&config.log) {
        eprintln!("laneguard: {}", e);
        std::process::exit(2);
    }

    if let Err(e) = run(config).await {
        error!(error = %e, fatal = e.is_fatal(), "laneguard stopped");
        std::process::exit(1);
    }
}

async fn run(config: RuntimeConfig) -> LaneguardResult<()> {
    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    let sweeper = spawn_liveness_sweep(Arc::clone(&orchestrator), config.sweep_interval);

    let listener = TcpListener::bind(config.bind_addr).await.map_err(|e| {
        LaneguardError::Configuration(format!("cannot bind {}: {}", config.bind_addr, e))
    })?;
    info!(
        addr = %config.bind_addr,
        decision_timeout = %humantime::format_duration(config.decision_timeout),
        liveness_threshold = %humantime::format_duration(config.liveness_threshold),
        notify = config.notify.endpoint.as_deref().unwrap_or("disabled"),
        "laneguard listening"
    );

    let app = router(Arc::clone(&orchestrator));
    let shutdown = {
        let orchestrator = Arc::clone(&orchestrator);
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            let closed = orchestrator.shutdown();
            info!(closed, "shutting down");
        }
    };

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;
    sweeper.abort();
    served.map_err(|e| LaneguardError::Configuration(format!("server error: {}", e)))
}
