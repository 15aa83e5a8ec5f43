//! The `serve` subcommand.

use std::{net::SocketAddr, sync::Arc};

use clap::Args;
use tokio::net::TcpListener;

use crate::{
    engine::{EngineOpts, EngineProvider},
    prelude::*,
    server::{AppState, create_router},
    ui::Ui,
};

/// Server command line arguments.
#[derive(Debug, Args)]
pub struct ServeOpts {
    /// Address to listen on.
    #[clap(long, env = "OCR_LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,
}

/// The `serve` subcommand.
///
/// We load the engine before we start listening, so the first request doesn't
/// pay for it, and so a broken install fails at startup.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_serve(
    ui: Ui,
    engine_opts: &EngineOpts,
    serve_opts: &ServeOpts,
) -> Result<()> {
    let provider = Arc::new(EngineProvider::new(engine_opts.clone()));
    let spinner = ui.new_spinner("Loading OCR engine", "OCR engine ready");
    let loaded = provider.acquire().await;
    spinner.finish_and_clear();
    loaded?;
    info!("OCR engine loaded");

    let app = create_router(AppState { engine: provider });
    let listener = TcpListener::bind(serve_opts.listen)
        .await
        .with_context(|| format!("cannot listen on {}", serve_opts.listen))?;
    info!("Listening on http://{}", serve_opts.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl-C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(err) => error!("cannot listen for Ctrl-C: {}", err),
    }
}
