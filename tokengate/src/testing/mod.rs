//! Test fixtures shared by unit tests
//!
//! - [`test_state`] builds an [`AuthState`] in test mode over a fresh
//!   [`MemoryStore`], a [`ManualClock`] and a [`FakeProvider`]
//! - [`TestContext::issue`] mints a token for a synthetic identity

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::clock::{Clock, ManualClock};
use crate::config::{AuthMode, TokengateConfig};
use crate::error::AuthError;
use crate::identity::Identity;
use crate::provider::{IdentityProvider, ProviderProfile};
use crate::secrets::ClientCredentials;
use crate::state::AuthState;
use crate::store::MemoryStore;

/// Authorization code the fake provider accepts
pub const GOOD_CODE: &str = "abc";

/// Provider that accepts [`GOOD_CODE`] and nothing else
#[derive(Debug, Default)]
pub struct FakeProvider;

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_url(
        &self,
        credentials: &ClientCredentials,
        callback_url: &str,
        state: &str,
    ) -> Result<String, AuthError> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &credentials.client_id)
            .append_pair("redirect_uri", callback_url)
            .append_pair("state", state)
            .finish();
        Ok(format!("https://provider.test/auth?{query}"))
    }

    async fn exchange_code(
        &self,
        _credentials: &ClientCredentials,
        _callback_url: &str,
        code: &str,
    ) -> Result<ProviderProfile, AuthError> {
        if code != GOOD_CODE {
            return Err(AuthError::Upstream("invalid_grant".to_string()));
        }
        Ok(ProviderProfile {
            id: "google-123".to_string(),
            email: "ada@example.com".to_string(),
            verified_email: Some(true),
            name: "Ada Lovelace".to_string(),
            given_name: "Ada".to_string(),
            family_name: "Lovelace".to_string(),
            ..ProviderProfile::default()
        })
    }
}

/// State plus handles on its store and clock
pub struct TestContext {
    /// State under test
    pub state: AuthState,
    /// Store backing the state
    pub store: MemoryStore,
    /// Clock driving the state
    pub clock: Arc<ManualClock>,
}

impl TestContext {
    /// Token for a synthetic identity valid for 24 hours
    pub async fn issue(&self, id: &str) -> String {
        let identity = Identity::fake(id, self.clock.now() + Duration::hours(24));
        self.state.codec().encode(&identity).await.unwrap()
    }

    /// Provision client credentials
    pub async fn provision(&self) {
        self.state
            .secrets()
            .provision_client_credentials(ClientCredentials::new("client-123", "shh"))
            .await
            .unwrap();
    }
}

/// Fresh test-mode state
pub fn test_state() -> TestContext {
    let mut config = TokengateConfig::default();
    config.auth.mode = AuthMode::Test;
    test_state_with(config)
}

/// Fresh state over `config`, skipping load-time validation
pub fn test_state_with(config: TokengateConfig) -> TestContext {
    let store = MemoryStore::new();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let state = AuthState::with_clock(
        config,
        Arc::new(store.clone()),
        Arc::new(FakeProvider),
        clock.clone(),
    );

    TestContext {
        state,
        store,
        clock,
    }
}
