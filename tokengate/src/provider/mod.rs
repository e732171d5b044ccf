//! Identity provider client
//!
//! The login flow only needs two things from a provider: an authorization
//! url to send the browser to, and a way to turn the code it sends back into
//! a profile. [`IdentityProvider`] captures exactly that; [`OAuth2Provider`]
//! implements it against any OAuth2 authorization-code provider with a JSON
//! profile endpoint (Google by default).

mod oauth;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::secrets::ClientCredentials;

pub use oauth::OAuth2Provider;

/// Profile reported by the identity provider
///
/// Field names follow the Google v2 userinfo response; OpenID Connect
/// `sub` and `email_verified` are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderProfile {
    /// Stable subject identifier
    #[serde(alias = "sub")]
    pub id: String,
    /// Email address
    pub email: String,
    /// Whether the email was verified
    #[serde(alias = "email_verified")]
    pub verified_email: Option<bool>,
    /// Display name
    pub name: String,
    /// Given name
    pub given_name: String,
    /// Family name
    pub family_name: String,
    /// Gender
    pub gender: String,
    /// Hosted domain
    pub hd: String,
    /// Profile page
    #[serde(alias = "profile")]
    pub link: String,
    /// Locale
    pub locale: String,
    /// Avatar url
    pub picture: String,
}

/// External identity provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Url that starts the provider's consent flow
    ///
    /// `state` is echoed back verbatim to the callback.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` if `callback_url` is not a valid url.
    fn authorization_url(
        &self,
        credentials: &ClientCredentials,
        callback_url: &str,
        state: &str,
    ) -> Result<String, AuthError>;

    /// Exchange an authorization code for the user's profile
    ///
    /// # Errors
    ///
    /// Returns `Upstream` if the token or profile request fails.
    async fn exchange_code(
        &self,
        credentials: &ClientCredentials,
        callback_url: &str,
        code: &str,
    ) -> Result<ProviderProfile, AuthError>;
}
