//! tokengate: stateless encrypted bearer-token authentication for axum
//!
//! Users prove their identity to an external OAuth2/OpenID provider once;
//! tokengate then seals their profile into a self-contained token that the
//! client replays on every request. Verifying a token needs no database round
//! trip, and rotating one secret revokes every token at once.
//!
//! # Design Principles
//!
//! 1. **No server-side sessions**: a token is valid when it decrypts under the
//!    current secret and its embedded expiry is in the future
//! 2. **One secret per deployment**: created lazily, exactly once, even when
//!    several processes race to create it
//! 3. **Typed failures**: malformed (400), expired (401) and tampered (403)
//!    tokens are distinct errors
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tokengate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     tokengate::observability::init()?;
//!
//!     let config = TokengateConfig::load_for_service("tokengate")?;
//!     let state = AuthState::from_config(config).await?;
//!
//!     // Your own routes, protected by the same layers as /Auth/*
//!     let games = axum::Router::new().route("/games", axum::routing::get(games));
//!     let app = tokengate::app(state.clone()).merge(protect(games, &state));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//!
//! async fn games(Authenticated(identity): Authenticated) -> String {
//!     format!("games for {}", identity.email)
//! }
//! ```
//!
//! # Features
//!
//! - `sqlite` - durable secret store on SQLite through sqlx (default)

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod observability;
pub mod provider;
pub mod secrets;
pub mod state;
pub mod store;
pub mod token;

#[cfg(test)]
pub mod testing;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::{AuthenticateLayer, LoginRedirectLayer};
use crate::state::AuthState;

/// Wrap a router in the authenticator and the login-redirect post-processor
pub fn protect<S>(router: Router<S>, state: &AuthState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(AuthenticateLayer::new(state))
        .layer(LoginRedirectLayer::new(state))
}

/// Ready-to-serve router with the `/Auth/*` routes, authentication and
/// request tracing
pub fn app(state: AuthState) -> Router {
    let routes = handlers::routes(&state.config().auth);
    protect(routes, &state)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! # Examples
    //!
    //! ```rust
    //! use tokengate::prelude::*;
    //! ```

    pub use crate::auth::{Authenticated, OptionalAuth};
    pub use crate::config::{AuthMode, TokengateConfig};
    pub use crate::error::AuthError;
    pub use crate::extractors::{Link, LinkDecorator, RequestOrigin};
    pub use crate::identity::Identity;
    pub use crate::middleware::{AuthenticateLayer, LoginRedirectLayer};
    pub use crate::secrets::{ClientCredentials, SecretCache};
    pub use crate::state::AuthState;
    pub use crate::token::TokenCodec;
    pub use crate::{app, protect};
}
