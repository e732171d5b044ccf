//! Token secret rotation

use anyhow::{Context, Result};
use console::style;
use tokengate::config::StoreSettings;
use tokengate::secrets::{RetryPolicy, SecretCache};
use tokengate::store;

/// Replace the token secret
pub struct RotateCommand {
    settings: StoreSettings,
}

impl RotateCommand {
    /// Create a new command instance
    #[must_use]
    pub const fn new(settings: StoreSettings) -> Self {
        Self { settings }
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or written.
    pub async fn execute(self) -> Result<()> {
        let store = store::open(&self.settings)
            .await
            .context("Failed to open store")?;
        SecretCache::new(store, RetryPolicy::from(&self.settings))
            .rotate_token_secret()
            .await
            .context("Failed to rotate token secret")?;

        println!("{}", style("✓ Token secret rotated").green().bold());
        println!(
            "  {} every issued token is now invalid; restart running servers to pick up the new secret",
            style("!").yellow().bold()
        );
        Ok(())
    }
}
