//! Server command

use anyhow::{Context, Result};
use console::style;
use tokengate::config::TokengateConfig;
use tokengate::state::AuthState;
use tokio::net::TcpListener;

/// Run the HTTP server until Ctrl-C
pub struct ServeCommand {
    config: TokengateConfig,
    bind: Option<String>,
}

impl ServeCommand {
    /// Create a new command instance
    #[must_use]
    pub const fn new(config: TokengateConfig, bind: Option<String>) -> Self {
        Self { config, bind }
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if logging, the store or the listener cannot be set
    /// up, or if the server fails while running.
    pub async fn execute(self) -> Result<()> {
        tokengate::observability::init()?;

        let address = self
            .bind
            .unwrap_or_else(|| self.config.server.bind_address.clone());
        let mode = self.config.auth.mode;

        let state = AuthState::from_config(self.config)
            .await
            .context("Failed to initialize authentication state")?;
        let app = tokengate::app(state);

        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {address}"))?;

        if mode.allows_bypass() {
            tracing::warn!(?mode, "fake-id bypass is enabled");
        }
        tracing::info!(%address, ?mode, "listening");
        println!(
            "{} {}",
            style("Listening on").green().bold(),
            style(format!("http://{address}")).cyan()
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        tracing::info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
