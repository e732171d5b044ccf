//! OAuth2 authorization-code provider

use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, RedirectUrl, Scope, TokenResponse, TokenUrl,
};

use super::{IdentityProvider, ProviderProfile};
use crate::config::ProviderSettings;
use crate::error::AuthError;
use crate::secrets::ClientCredentials;

/// Client with auth and token endpoints configured
type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Identity provider speaking OAuth2 plus a JSON profile endpoint
pub struct OAuth2Provider {
    settings: ProviderSettings,
    /// Shared by the token exchange and profile requests
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OAuth2Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Provider")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl OAuth2Provider {
    /// Create a provider for the configured endpoints
    ///
    /// Redirects are not followed, and every call is bounded by
    /// `settings.timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: ProviderSettings) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(settings.timeout())
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    fn client(
        &self,
        credentials: &ClientCredentials,
        callback_url: &str,
    ) -> Result<ConfiguredClient, AuthError> {
        let client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(self.settings.auth_url.clone())
                    .map_err(|e| AuthError::Internal(format!("Invalid auth URL: {e}")))?,
            )
            .set_token_uri(
                TokenUrl::new(self.settings.token_url.clone())
                    .map_err(|e| AuthError::Internal(format!("Invalid token URL: {e}")))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(callback_url.to_string())
                    .map_err(|e| AuthError::BadRequest(format!("Invalid redirect URI: {e}")))?,
            );

        Ok(client)
    }
}

#[async_trait]
impl IdentityProvider for OAuth2Provider {
    fn authorization_url(
        &self,
        credentials: &ClientCredentials,
        callback_url: &str,
        state: &str,
    ) -> Result<String, AuthError> {
        let client = self.client(credentials, callback_url)?;
        let state = state.to_string();

        let mut auth_url_builder = client.authorize_url(move || CsrfToken::new(state));
        for scope in &self.settings.scopes {
            auth_url_builder = auth_url_builder.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, _) = auth_url_builder.url();
        Ok(auth_url.to_string())
    }

    async fn exchange_code(
        &self,
        credentials: &ClientCredentials,
        callback_url: &str,
        code: &str,
    ) -> Result<ProviderProfile, AuthError> {
        let client = self.client(credentials, callback_url)?;

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AuthError::Upstream(format!("token exchange failed: {e}")))?;

        let response = self
            .http_client
            .get(&self.settings.userinfo_url)
            .bearer_auth(token_response.access_token().secret())
            .send()
            .await
            .map_err(|e| AuthError::Upstream(format!("profile request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Upstream(format!(
                "profile request returned HTTP {}",
                response.status()
            )));
        }

        let profile: ProviderProfile = response
            .json()
            .await
            .map_err(|e| AuthError::Upstream(format!("unreadable profile: {e}")))?;
        tracing::debug!(user_id = %profile.id, "fetched provider profile");
        Ok(profile)
    }
}
