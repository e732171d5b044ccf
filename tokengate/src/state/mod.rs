//! Application state management
//!
//! [`AuthState`] is the composition root: it owns the configuration, the
//! secret store, the secret cache, the token codec, the identity provider and
//! the clock. It is cheap to clone and is shared by every handler and layer.

use std::sync::Arc;

use axum::http::{HeaderMap, Uri};

use crate::clock::{Clock, SystemClock};
use crate::config::TokengateConfig;
use crate::extractors::RequestOrigin;
use crate::provider::{IdentityProvider, OAuth2Provider};
use crate::secrets::{RetryPolicy, SecretCache};
use crate::store::{self, Store};
use crate::token::TokenCodec;

/// Shared authentication state
///
/// # Example
///
/// ```rust,no_run
/// use tokengate::{config::TokengateConfig, state::AuthState};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = TokengateConfig::load_for_service("tokengate")?;
/// let state = AuthState::from_config(config).await?;
/// let app = tokengate::app(state);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AuthState {
    config: Arc<TokengateConfig>,
    store: Arc<dyn Store>,
    secrets: Arc<SecretCache>,
    codec: TokenCodec,
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("secrets", &self.secrets)
            .finish_non_exhaustive()
    }
}

impl AuthState {
    /// Assemble state from its parts, using the wall clock
    #[must_use]
    pub fn new(
        config: TokengateConfig,
        store: Arc<dyn Store>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self::with_clock(config, store, provider, Arc::new(SystemClock))
    }

    /// Assemble state with an explicit clock
    #[must_use]
    pub fn with_clock(
        config: TokengateConfig,
        store: Arc<dyn Store>,
        provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let secrets = Arc::new(SecretCache::new(
            Arc::clone(&store),
            RetryPolicy::from(&config.store),
        ));
        let codec = TokenCodec::new(Arc::clone(&secrets), Arc::clone(&clock));

        Self {
            config: Arc::new(config),
            store,
            secrets,
            codec,
            provider,
            clock,
        }
    }

    /// Open the configured store and build the OAuth2 provider
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or the provider's HTTP
    /// client cannot be built.
    pub async fn from_config(config: TokengateConfig) -> anyhow::Result<Self> {
        let store = store::open(&config.store).await?;
        let provider = OAuth2Provider::new(config.provider.clone())?;
        Ok(Self::new(config, store, Arc::new(provider)))
    }

    /// Application configuration
    #[must_use]
    pub fn config(&self) -> &TokengateConfig {
        &self.config
    }

    /// Durable store
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Secret cache
    #[must_use]
    pub fn secrets(&self) -> &SecretCache {
        &self.secrets
    }

    /// Token codec
    #[must_use]
    pub const fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Identity provider
    #[must_use]
    pub fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    /// Clock
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Externally visible origin of a request
    #[must_use]
    pub fn origin(&self, headers: &HeaderMap, uri: &Uri) -> RequestOrigin {
        RequestOrigin::resolve(headers, uri, self.config.auth.public_base_url.as_deref())
    }

    /// Absolute callback url handed to the identity provider
    #[must_use]
    pub fn callback_url(&self, origin: &RequestOrigin) -> String {
        origin.absolute(&self.config.auth.callback_path)
    }
}
