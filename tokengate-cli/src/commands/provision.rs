//! OAuth client credential provisioning

use anyhow::{bail, Context, Result};
use console::style;
use tokengate::config::StoreSettings;
use tokengate::error::AuthError;
use tokengate::secrets::{ClientCredentials, RetryPolicy, SecretCache};
use tokengate::store;

/// Store the OAuth2 client credentials
///
/// Credentials are write-once: a second provisioning against the same store
/// fails with "OAuth already configured".
pub struct ProvisionCommand {
    settings: StoreSettings,
    credentials: ClientCredentials,
}

impl ProvisionCommand {
    /// Create a new command instance
    #[must_use]
    pub const fn new(settings: StoreSettings, credentials: ClientCredentials) -> Self {
        Self {
            settings,
            credentials,
        }
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if credentials already exist or the store fails.
    pub async fn execute(self) -> Result<()> {
        let store = store::open(&self.settings)
            .await
            .context("Failed to open store")?;
        let secrets = SecretCache::new(store, RetryPolicy::from(&self.settings));

        let client_id = self.credentials.client_id.clone();
        match secrets.provision_client_credentials(self.credentials).await {
            Ok(()) => {}
            Err(AuthError::AlreadyConfigured) => bail!("OAuth already configured"),
            Err(e) => return Err(e).context("Failed to provision credentials"),
        }

        println!(
            "{} {}",
            style("✓ Provisioned OAuth client").green().bold(),
            style(client_id).cyan()
        );
        Ok(())
    }
}
