//! The `serve` subcommand.

use std::{net::SocketAddr, sync::Arc};

use clap::Args;

use crate::{
    config::AzureConfig,
    ocr::azure::AzureDocumentAnalyzer,
    prelude::*,
    server::{self, AppState},
};

/// Server command line arguments.
#[derive(Debug, Args)]
pub struct ServeOpts {
    /// Address to listen on.
    #[clap(long, default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Directory for per-request temporary files. Defaults to the system
    /// temporary directory.
    #[clap(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Largest accepted upload, in megabytes.
    #[clap(long, default_value = "50")]
    pub max_upload_mb: usize,
}

/// The `serve` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_serve(opts: &ServeOpts) -> Result<()> {
    let config = AzureConfig::from_env()?;
    info!(?config, "Loaded Azure Document Intelligence configuration");
    let analyzer = Arc::new(AzureDocumentAnalyzer::new(config)?);
    let state = AppState::new(analyzer, opts.scratch_dir.clone());
    let app = server::router(state, opts.max_upload_mb.saturating_mul(1024 * 1024));

    let listener = tokio::net::TcpListener::bind(opts.listen)
        .await
        .with_context(|| format!("failed to listen on {}", opts.listen))?;
    info!("Listening on http://{}", opts.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await
        .context("server failed")?;
    info!("Server shutdown complete");
    Ok(())
}
