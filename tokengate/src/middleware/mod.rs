//! Middleware layers for tokengate
//!
//! Provides middleware for:
//! - Authentication (token decoding, identity attachment)
//! - Login redirects (turning 401s into a login round trip for browsers)
//!
//! Apply the redirect layer outside the authenticator:
//!
//! ```rust,no_run
//! use tokengate::middleware::{AuthenticateLayer, LoginRedirectLayer};
//! use tokengate::state::AuthState;
//! use axum::{routing::get, Router};
//!
//! # fn example(state: AuthState) {
//! let app: Router = Router::new()
//!     .route("/games", get(|| async { "games" }))
//!     .layer(AuthenticateLayer::new(&state))
//!     .layer(LoginRedirectLayer::new(&state));
//! # }
//! ```

pub mod authenticate;
pub mod login_redirect;

pub use authenticate::{
    authenticate, locate_credential, parse_bearer, AuthenticateLayer, AuthenticateMiddleware,
    Credential, FAKE_ID_PARAM, TOKEN_PARAM,
};
pub use login_redirect::{
    login_location, negotiate, LoginRedirectLayer, LoginRedirectMiddleware, Representation,
    REDIRECT_TO_PARAM,
};
