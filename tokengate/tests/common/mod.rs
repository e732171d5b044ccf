//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderName, HeaderValue};
use axum_test::TestServer;
use chrono::Utc;
use tokengate::clock::ManualClock;
use tokengate::config::TokengateConfig;
use tokengate::error::AuthError;
use tokengate::provider::{IdentityProvider, ProviderProfile};
use tokengate::secrets::ClientCredentials;
use tokengate::state::AuthState;
use tokengate::store::{MemoryStore, Store};

/// Host every test request claims to be addressed to
pub const HOST: &str = "play.test";

/// Authorization code the stub provider accepts
pub const GOOD_CODE: &str = "abc";

/// Provider stub that knows a single user
#[derive(Debug, Default)]
pub struct StubProvider;

#[async_trait]
impl IdentityProvider for StubProvider {
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
        Ok(format!("https://accounts.stub/o/oauth2/auth?{query}"))
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
            id: "108".to_string(),
            email: "grace@example.com".to_string(),
            verified_email: Some(true),
            name: "Grace Hopper".to_string(),
            given_name: "Grace".to_string(),
            family_name: "Hopper".to_string(),
            ..ProviderProfile::default()
        })
    }
}

/// A running app plus handles on its clock and state
pub struct Harness {
    /// Server wrapping the assembled router
    pub server: TestServer,
    /// State shared with the router
    pub state: AuthState,
    /// Clock driving token expiry
    pub clock: Arc<ManualClock>,
}

/// Production-mode app over `store` with provisioned credentials
pub async fn harness_with_store(store: Arc<dyn Store>) -> Harness {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let state = AuthState::with_clock(
        TokengateConfig::default(),
        store,
        Arc::new(StubProvider),
        clock.clone(),
    );

    match state
        .secrets()
        .provision_client_credentials(ClientCredentials::new("client-42", "hunter2"))
        .await
    {
        Ok(()) | Err(AuthError::AlreadyConfigured) => {}
        Err(e) => panic!("failed to provision credentials: {e}"),
    }

    let server = TestServer::new(tokengate::app(state.clone())).unwrap();
    Harness {
        server,
        state,
        clock,
    }
}

/// Production-mode app over a fresh in-memory store
pub async fn harness() -> Harness {
    harness_with_store(Arc::new(MemoryStore::new())).await
}

/// `Host` header naming [`HOST`]
pub fn host() -> (HeaderName, HeaderValue) {
    (header::HOST, HeaderValue::from_static(HOST))
}
