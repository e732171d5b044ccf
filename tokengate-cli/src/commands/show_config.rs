//! Effective configuration dump

use anyhow::Result;
use tokengate::config::TokengateConfig;

/// Print the configuration after all sources are merged
pub struct ShowConfigCommand {
    config: TokengateConfig,
}

impl ShowConfigCommand {
    /// Create a new command instance
    #[must_use]
    pub const fn new(config: TokengateConfig) -> Self {
        Self { config }
    }

    /// Render the configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String> {
        self.config.to_toml()
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn execute(&self) -> Result<()> {
        print!("{}", self.render()?);
        Ok(())
    }
}
