//! `parley serve`: run the HTTP server until Ctrl+C / SIGTERM.

use std::time::Duration;

use anyhow::Result;
use console::style;
use tracing::{info, warn};

use crate::http::router::build_router;
use crate::state::AppState;

/// How often idle per-session locks are dropped.
const LOCK_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

pub async fn serve(state: AppState, quiet: bool) -> Result<()> {
    let addr = format!("{}:{}", state.settings.server.host, state.settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        %addr,
        client = state.chat.client_name(),
        model = state.chat.model(),
        store = state.chat.sync().backend_name().unwrap_or("memory"),
        "Server listening"
    );
    if !quiet {
        println!(
            "  {} Parley listening on {}",
            style("⚡").bold(),
            style(format!("http://{addr}")).cyan()
        );
        println!("  {}", style("Press Ctrl+C to stop").dim());
    }

    let pruner = {
        let chat = state.chat.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LOCK_PRUNE_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                chat.prune_idle_locks();
            }
        })
    };

    let chat = state.chat.clone();
    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pruner.abort();
    let pending = chat.sync().pending();
    if pending > 0 {
        info!(pending, "Waiting for background syncs to finish");
    }
    chat.shutdown().await;
    info!("Server stopped");
    if !quiet {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
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
