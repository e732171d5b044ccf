//! Configuration management for tokengate
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `TOKENGATE_` prefix, `__` for nesting)
//! 2. `./config.toml` (development)
//! 3. `~/.config/tokengate/{service_name}/config.toml` (user config, XDG)
//! 4. `/etc/tokengate/{service_name}/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! Environment variable format: `TOKENGATE_SECTION__FIELD_NAME`
//! - Example: `TOKENGATE_AUTH__MODE=development`
//! - Example: `TOKENGATE_STORE__DATABASE_URL=sqlite:///var/lib/tokengate/auth.db`
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:8080"
//!
//! [auth]
//! mode = "production"
//! session_lifetime_secs = 86400
//! public_base_url = "https://api.example.com"
//!
//! [provider]
//! scopes = ["openid", "profile", "email"]
//! timeout_secs = 10
//!
//! [store]
//! database_url = "sqlite://tokengate.db"
//! max_attempts = 3
//! retry_backoff_ms = 10
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to listen on
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Deployment mode
///
/// The `fake-id` bypass is only honoured outside production.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Real deployments
    #[default]
    Production,
    /// Local development
    Development,
    /// Automated tests
    Test,
}

impl AuthMode {
    /// Whether synthetic identities may be requested with `fake-id`
    #[must_use]
    pub const fn allows_bypass(self) -> bool {
        matches!(self, Self::Development | Self::Test)
    }
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Deployment mode
    pub mode: AuthMode,

    /// How long an issued token stays valid, in seconds
    pub session_lifetime_secs: u64,

    /// Route of the login handler
    pub login_path: String,

    /// Route of the logout handler
    pub logout_path: String,

    /// Route the identity provider redirects back to
    pub callback_path: String,

    /// Route of the current-user resource
    pub me_path: String,

    /// Externally visible base url (`https://host[:port]`), overrides the
    /// scheme and host derived from each request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            session_lifetime_secs: 86400, // 24 hours
            login_path: "/Auth/Login".to_string(),
            logout_path: "/Auth/Logout".to_string(),
            callback_path: "/Auth/OAuth2Callback".to_string(),
            me_path: "/Auth/Me".to_string(),
            public_base_url: None,
        }
    }
}

impl AuthSettings {
    /// Token lifetime, or `None` when it does not fit a [`TimeDelta`]
    #[must_use]
    pub fn session_lifetime(&self) -> Option<TimeDelta> {
        i64::try_from(self.session_lifetime_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
    }

    /// Expiry for a token issued at `now`, or `None` on overflow
    #[must_use]
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.session_lifetime()
            .and_then(|lifetime| now.checked_add_signed(lifetime))
    }

    /// Reject lifetimes that are zero or overflow the calendar
    ///
    /// # Errors
    ///
    /// Returns an error if `session_lifetime_secs` is zero or too large.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.session_lifetime_secs == 0 {
            anyhow::bail!("auth.session_lifetime_secs must be greater than zero");
        }
        if self.expiry_from(Utc::now()).is_none() {
            anyhow::bail!(
                "auth.session_lifetime_secs is out of range: {}",
                self.session_lifetime_secs
            );
        }
        Ok(())
    }
}

/// Identity provider settings, Google endpoints by default
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Authorization endpoint
    pub auth_url: String,

    /// Token endpoint
    pub token_url: String,

    /// Profile endpoint queried with the access token
    pub userinfo_url: String,

    /// Requested scopes
    pub scopes: Vec<String>,

    /// Per-request timeout for provider calls, in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
            timeout_secs: 10,
        }
    }
}

impl ProviderSettings {
    /// Provider call timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Secret store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// `sqlite://...` url, or `memory://` for a process-local store
    pub database_url: String,

    /// Attempts at a conflicting provisioning commit before giving up
    pub max_attempts: u32,

    /// Backoff before the first retry, doubled on each further retry
    pub retry_backoff_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://tokengate.db".to_string(),
            max_attempts: 3,
            retry_backoff_ms: 10,
        }
    }
}

impl StoreSettings {
    /// Initial retry backoff
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Complete tokengate configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokengateConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Authentication settings
    #[serde(default)]
    pub auth: AuthSettings,

    /// Identity provider settings
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Secret store settings
    #[serde(default)]
    pub store: StoreSettings,
}

impl TokengateConfig {
    /// Load configuration for a specific service
    ///
    /// Searches for configuration in XDG-compliant locations with the
    /// precedence described in the module docs.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be read or parsed
    /// - Configuration values fail type conversion
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tokengate::config::TokengateConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = TokengateConfig::load_for_service("tokengate")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new()
            // 5. Start with defaults (lowest priority)
            .merge(Toml::string(&toml::to_string(&Self::default())?));

        // 4. System config
        let system_config = PathBuf::from("/etc/tokengate")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        // 3. User config
        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        // 2. Local config
        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        // 1. Environment variables
        figment = figment.merge(Env::prefixed("TOKENGATE_").split("__").lowercase(true));

        let config: Self = figment.extract()?;
        config.auth.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file is not an error; defaults and environment variables
    /// still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file contains invalid TOML or values of the
    /// wrong type.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("TOKENGATE_").split("__").lowercase(true))
            .extract()?;

        config.auth.validate()?;
        Ok(config)
    }

    /// Get the recommended XDG config path for a service
    ///
    /// # Example
    ///
    /// ```rust
    /// use tokengate::config::TokengateConfig;
    ///
    /// let path = TokengateConfig::recommended_path("my-api");
    /// // Returns: ~/.config/tokengate/my-api/config.toml
    /// ```
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| {
                config_dir
                    .join("tokengate")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }

    /// Render the configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
