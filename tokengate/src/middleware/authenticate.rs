//! Request authenticator
//!
//! Runs once per request before any protected handler:
//!
//! ```text
//! fake-id (test/development only) ─▶ synthetic identity
//! ?token=...                      ─▶ decode ─▶ identity + link decorator
//! Authorization: Bearer ...       ─▶ decode ─▶ identity
//! nothing                         ─▶ anonymous
//! ```
//!
//! Decoding failures end the request: malformed credentials with 400,
//! expired tokens with 401 and tampered tokens with 403.
//!
//! # Example
//!
//! ```rust,no_run
//! use tokengate::middleware::AuthenticateLayer;
//! use tokengate::state::AuthState;
//! use axum::{routing::get, Router};
//!
//! # fn example(state: AuthState) {
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "hello" }))
//!     .layer(AuthenticateLayer::new(&state));
//! # }
//! ```

use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap, Uri},
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};

use crate::error::AuthError;
use crate::extractors::LinkDecorator;
use crate::identity::Identity;
use crate::state::AuthState;

/// Query parameter carrying a token
pub const TOKEN_PARAM: &str = "token";

/// Query parameter requesting a synthetic identity outside production
pub const FAKE_ID_PARAM: &str = "fake-id";

/// Where a request's credential came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// `fake-id` query parameter
    Bypass(String),
    /// `token` query parameter
    Query(String),
    /// `Authorization: Bearer` header
    Header(String),
}

/// Find the request's credential, if any
///
/// # Errors
///
/// Returns [`AuthError::Malformed`] when an `Authorization` header is present
/// but is not `Bearer <token>`.
pub fn locate_credential(
    uri: &Uri,
    headers: &HeaderMap,
    bypass_allowed: bool,
) -> Result<Option<Credential>, AuthError> {
    if bypass_allowed {
        if let Some(id) = query_param(uri, FAKE_ID_PARAM) {
            return Ok(Some(Credential::Bypass(id)));
        }
    }

    if let Some(token) = query_param(uri, TOKEN_PARAM) {
        return Ok(Some(Credential::Query(token)));
    }

    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header
        .to_str()
        .map_err(|_| AuthError::Malformed("Authorization header is not ASCII".to_string()))?;
    if header.is_empty() {
        return Ok(None);
    }
    parse_bearer(header).map(|token| Some(Credential::Header(token.to_string())))
}

/// Extract the token from an `Authorization` header value
///
/// The value must be exactly two space-separated parts, the first being
/// `bearer` in any case.
///
/// # Errors
///
/// Returns [`AuthError::Malformed`] for any other shape.
pub fn parse_bearer(value: &str) -> Result<&str, AuthError> {
    let mut parts = value.split(' ');
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::Malformed(
            "Authorization header is not two parts joined by a space".to_string(),
        ));
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Malformed(
            "Authorization header scheme is not 'bearer'".to_string(),
        ));
    }
    if token.is_empty() {
        return Err(AuthError::Malformed("empty bearer token".to_string()));
    }
    Ok(token)
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
    url::form_urlencoded::parse(uri.query()?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Authenticate a request in place
///
/// On success the request carries an [`Identity`] extension when a credential
/// was supplied, plus a [`LinkDecorator`] when it came from the query string.
///
/// # Errors
///
/// Returns the decoding error for a malformed, expired or tampered credential.
pub async fn authenticate(state: &AuthState, req: &mut Request) -> Result<(), AuthError> {
    let bypass_allowed = state.config().auth.mode.allows_bypass();
    let Some(credential) = locate_credential(req.uri(), req.headers(), bypass_allowed)? else {
        return Ok(());
    };

    let (identity, decorator) = match credential {
        Credential::Bypass(id) => {
            let valid_until = state
                .config()
                .auth
                .expiry_from(state.clock().now())
                .ok_or_else(|| AuthError::Internal("session lifetime out of range".to_string()))?;
            tracing::debug!(user_id = %id, "using synthetic identity");
            (
                Identity::fake(id.clone(), valid_until),
                Some(LinkDecorator::carrying(FAKE_ID_PARAM, id)),
            )
        }
        Credential::Query(token) => {
            let identity = state.codec().decode(&token).await?;
            (identity, Some(LinkDecorator::carrying(TOKEN_PARAM, token)))
        }
        Credential::Header(token) => (state.codec().decode(&token).await?, None),
    };

    tracing::info!(
        user_id = %identity.id,
        email = %identity.email,
        route = %req.uri().path(),
        "request by authenticated user"
    );
    req.extensions_mut().insert(identity);
    if let Some(decorator) = decorator {
        req.extensions_mut().insert(decorator);
    }
    Ok(())
}

/// Layer that authenticates every request
#[derive(Clone, Debug)]
pub struct AuthenticateLayer {
    state: AuthState,
}

impl AuthenticateLayer {
    /// Create the layer from shared state
    #[must_use]
    pub fn new(state: &AuthState) -> Self {
        Self {
            state: state.clone(),
        }
    }
}

impl<S> Layer<S> for AuthenticateLayer {
    type Service = AuthenticateMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthenticateMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Service produced by [`AuthenticateLayer`]
#[derive(Clone, Debug)]
pub struct AuthenticateMiddleware<S> {
    inner: S,
    state: AuthState,
}

impl<S> Service<Request> for AuthenticateMiddleware<S>
where
    S: Service<Request, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let state = self.state.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let Err(err) = authenticate(&state, &mut req).await {
                tracing::warn!(error = %err, route = %req.uri().path(), "rejected credential");
                return Ok(err.into_response());
            }
            inner.call(req).await
        })
    }
}
