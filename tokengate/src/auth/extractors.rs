//! Authentication extractors for Axum handlers
//!
//! Both read the [`Identity`] that the authenticator attached to the request
//! extensions; neither touches the token or the store.
//!
//! # Examples
//!
//! ## Requiring authentication
//!
//! ```rust,no_run
//! use tokengate::auth::Authenticated;
//!
//! async fn protected_handler(Authenticated(identity): Authenticated) -> String {
//!     format!("Hello, {}!", identity.email)
//! }
//! ```
//!
//! ## Optional authentication
//!
//! ```rust,no_run
//! use tokengate::auth::OptionalAuth;
//!
//! async fn optional_handler(OptionalAuth(identity): OptionalAuth) -> String {
//!     match identity {
//!         Some(identity) => format!("Hello, {}!", identity.name),
//!         None => "Hello, guest!".to_string(),
//!     }
//! }
//! ```

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AuthError;
use crate::identity::Identity;

/// Identity extractor for protected routes
///
/// Rejects with 401 when the request carried no credential. Browser clients
/// then get redirected to login by [`crate::middleware::LoginRedirectLayer`].
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Self)
            .ok_or_else(|| AuthError::Unauthorized("no valid credential supplied".to_string()))
    }
}

/// Optional identity extractor
///
/// Works for both authenticated and anonymous requests.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Identity>().cloned()))
    }
}
