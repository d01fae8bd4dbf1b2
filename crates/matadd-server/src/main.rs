//! matadd server
//!
//! - `GET  /health`   : liveness
//! - `GET  /gpu-info` : device inventory via `nvidia-smi`
//! - `POST /add`      : element-wise sum of two `.npz` uploads
//! - `GET  /metrics`  : Prometheus scrape

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use matadd_core::error::{MatAddError, Result};
use matadd_server::{app_state, config, router};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "matadd-server exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let (cfg, source) = config::load()?;
    let listen = cfg.server.listen_addr()?;

    let state = app_state::AppState::new(cfg);
    let app = router::build_router(state);

    tracing::info!(%listen, config = %source, "matadd-server starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| MatAddError::Internal(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MatAddError::Internal(format!("server failed: {e}")))?;

    tracing::info!("matadd-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, draining");
}
