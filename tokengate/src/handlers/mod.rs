//! Login, callback and logout handlers
//!
//! The browser-facing half of the OAuth2 dance:
//!
//! 1. `GET /Auth/Login?redirect-to=<url>` sends the browser to the identity
//!    provider, passing `<url>` through as `state`.
//! 2. The provider returns to `GET /Auth/OAuth2Callback?code=..&state=<url>`;
//!    the code is exchanged for a profile, the identity is persisted and
//!    sealed into a token, and the browser goes back to `<url>?token=<token>`.
//! 3. `GET /Auth/Logout?redirect-to=<url>` simply sends the browser to `<url>`;
//!    with stateless tokens the client forgets its credential.
//!
//! `GET /Auth/Me` is a small protected resource that reports the caller's
//! identity and demonstrates link decoration.

use axum::{
    extract::{FromRef, Query, State},
    response::Redirect,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::Authenticated;
use crate::config::AuthSettings;
use crate::error::AuthError;
use crate::extractors::{set_query_param, Link, LinkDecorator, RequestOrigin, LOGOUT_REL};
use crate::identity::Identity;
use crate::middleware::TOKEN_PARAM;
use crate::state::AuthState;

/// `redirect-to` query parameter of login and logout
#[derive(Debug, Default, Deserialize)]
pub struct RedirectParams {
    /// Where to send the browser afterwards
    #[serde(rename = "redirect-to")]
    pub redirect_to: Option<String>,
}

/// Query parameters of the provider callback
#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    /// Authorization code from provider
    #[serde(default)]
    pub code: String,
    /// Return address passed through from login
    #[serde(default)]
    pub state: String,
    /// Optional error from provider
    pub error: Option<String>,
    /// Optional error description
    pub error_description: Option<String>,
}

/// Body of `GET /Auth/Me`
#[derive(Debug, Serialize)]
pub struct CurrentUser {
    /// Caller's identity
    pub identity: Identity,
    /// Related links
    pub links: Vec<Link>,
}

/// Redirect to the identity provider's consent page
///
/// # Errors
///
/// Returns an error if client credentials are not provisioned.
pub async fn login(
    State(state): State<AuthState>,
    origin: RequestOrigin,
    Query(params): Query<RedirectParams>,
) -> Result<Redirect, AuthError> {
    let credentials = state.secrets().client_credentials().await?;
    let return_to = params.redirect_to.unwrap_or_default();

    let auth_url = state.provider().authorization_url(
        &credentials,
        &state.callback_url(&origin),
        &return_to,
    )?;

    tracing::debug!(%return_to, "starting login");
    Ok(Redirect::to(&auth_url))
}

/// Finish the login: exchange the code and hand a token to the return address
///
/// # Errors
///
/// - 400 when the provider reported an error, the code is missing or the
///   return address is not a url
/// - 502 when the provider exchange fails
/// - 500 when credentials are missing or storage fails
pub async fn oauth2_callback(
    State(state): State<AuthState>,
    origin: RequestOrigin,
    Query(params): Query<OAuthCallback>,
) -> Result<Redirect, AuthError> {
    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or_default();
        tracing::warn!(%error, %description, "identity provider returned an error");
        return Err(AuthError::BadRequest(format!(
            "identity provider returned {error}: {description}"
        )));
    }
    if params.code.is_empty() {
        return Err(AuthError::BadRequest("missing authorization code".to_string()));
    }

    let mut return_to = origin
        .join(&params.state)
        .map_err(|e| AuthError::BadRequest(format!("invalid return address: {e}")))?;

    let credentials = state.secrets().client_credentials().await?;
    let profile = state
        .provider()
        .exchange_code(&credentials, &state.callback_url(&origin), &params.code)
        .await?;

    let valid_until = state
        .config()
        .auth
        .expiry_from(state.clock().now())
        .ok_or_else(|| AuthError::Internal("session lifetime out of range".to_string()))?;
    let identity = Identity::from_profile(profile, valid_until);
    identity.save(state.store()).await?;

    let token = state.codec().encode(&identity).await?;
    set_query_param(&mut return_to, TOKEN_PARAM, &token);

    tracing::info!(
        user_id = %identity.id,
        email = %identity.email,
        %valid_until,
        "issued token"
    );
    Ok(Redirect::to(return_to.as_str()))
}

/// Send the browser to `redirect-to`, or `/`
pub async fn logout(Query(params): Query<RedirectParams>) -> Redirect {
    let target = params
        .redirect_to
        .filter(|target| !target.is_empty())
        .unwrap_or_else(|| "/".to_string());
    Redirect::to(&target)
}

/// Report the caller's identity
pub async fn current_user(
    State(state): State<AuthState>,
    Authenticated(identity): Authenticated,
    links: LinkDecorator,
) -> Json<CurrentUser> {
    let auth = &state.config().auth;
    Json(CurrentUser {
        identity,
        links: vec![
            links.link("self", &auth.me_path),
            links.link(LOGOUT_REL, &auth.logout_path),
        ],
    })
}

/// Routes for login, callback, logout and the current user
///
/// Paths come from `[auth]` configuration. The caller applies the
/// authentication layers, see [`crate::protect`].
pub fn routes<S>(auth: &AuthSettings) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    AuthState: FromRef<S>,
{
    Router::new()
        .route(&auth.login_path, get(login))
        .route(&auth.callback_path, get(oauth2_callback))
        .route(&auth.logout_path, get(logout))
        .route(&auth.me_path, get(current_user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::testing::{test_state, test_state_with, TestContext, GOOD_CODE};
    use axum::{
        body::Body,
        http::{header::LOCATION, Request, StatusCode},
        response::Response,
    };
    use std::collections::HashMap;
    use tower::ServiceExt;
    use url::Url;

    fn app(ctx: &TestContext) -> Router {
        crate::app(ctx.state.clone())
    }

    async fn get_response(ctx: &TestContext, uri: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .header("host", "api.test")
            .body(Body::empty())
            .unwrap();
        app(ctx).oneshot(request).await.unwrap()
    }

    fn location(response: &Response) -> Url {
        let location = response.headers()[LOCATION].to_str().unwrap();
        Url::parse(location).unwrap()
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[tokio::test]
    async fn test_login_redirects_to_provider_with_state() {
        let ctx = test_state();
        ctx.provision().await;

        let response = get_response(&ctx, "/Auth/Login?redirect-to=https%3A%2F%2Fx%2Fy").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let target = location(&response);
        assert_eq!(target.host_str(), Some("provider.test"));
        let pairs = query(&target);
        assert_eq!(pairs["state"], "https://x/y");
        assert_eq!(pairs["redirect_uri"], "http://api.test/Auth/OAuth2Callback");
        assert_eq!(pairs["client_id"], "client-123");
    }

    #[tokio::test]
    async fn test_login_without_credentials_is_server_error() {
        let ctx = test_state();
        let response = get_response(&ctx, "/Auth/Login?redirect-to=%2F").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_callback_issues_token_and_persists_identity() {
        let ctx = test_state();
        ctx.provision().await;

        let response = get_response(
            &ctx,
            &format!("/Auth/OAuth2Callback?code={GOOD_CODE}&state=https%3A%2F%2Fx%2Fy%3Fpage%3D2%26token%3Dstale"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let target = location(&response);
        assert_eq!(target.host_str(), Some("x"));
        assert_eq!(target.path(), "/y");
        let pairs = query(&target);
        assert_eq!(pairs["page"], "2");
        assert_eq!(target.query_pairs().filter(|(k, _)| k == "token").count(), 1);

        let identity = ctx.state.codec().decode(&pairs["token"]).await.unwrap();
        assert_eq!(identity.id, "google-123");
        assert_eq!(identity.valid_until, ctx.clock.now() + chrono::Duration::hours(24));

        let stored = Identity::load(&ctx.store, "google-123").await.unwrap().unwrap();
        assert_eq!(stored, identity);
    }

    #[tokio::test]
    async fn test_callback_relative_state_resolves_against_origin() {
        let ctx = test_state();
        ctx.provision().await;

        let response =
            get_response(&ctx, &format!("/Auth/OAuth2Callback?code={GOOD_CODE}&state=%2Fgames")).await;
        let target = location(&response);
        assert_eq!(target.host_str(), Some("api.test"));
        assert_eq!(target.path(), "/games");
    }

    #[tokio::test]
    async fn test_callback_provider_error_is_bad_request() {
        let ctx = test_state();
        ctx.provision().await;

        let response =
            get_response(&ctx, "/Auth/OAuth2Callback?error=access_denied&state=%2F").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_rejected_code_is_bad_gateway() {
        let ctx = test_state();
        ctx.provision().await;

        let response = get_response(&ctx, "/Auth/OAuth2Callback?code=nope&state=%2F").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_callback_bad_state_is_bad_request() {
        let ctx = test_state();
        ctx.provision().await;

        let response = get_response(
            &ctx,
            &format!("/Auth/OAuth2Callback?code={GOOD_CODE}&state=http%3A%2F%2F%5B%3A%3A1"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_with_overflowing_lifetime_is_server_error() {
        let mut config = crate::config::TokengateConfig::default();
        config.auth.session_lifetime_secs = 10_000_000_000_000;
        let ctx = test_state_with(config);
        ctx.provision().await;

        let response =
            get_response(&ctx, &format!("/Auth/OAuth2Callback?code={GOOD_CODE}&state=%2F")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(Identity::load(&ctx.store, "google-123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_redirects() {
        let ctx = test_state();

        let response = get_response(&ctx, "/Auth/Logout?redirect-to=https%3A%2F%2Fx%2Fbye").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "https://x/bye");

        let response = get_response(&ctx, "/Auth/Logout").await;
        assert_eq!(response.headers()[LOCATION], "/");
    }

    #[tokio::test]
    async fn test_current_user_links_carry_fake_id_except_logout() {
        let ctx = test_state();

        let response = get_response(&ctx, "/Auth/Me?fake-id=tester").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["identity"]["id"], "tester");
        assert_eq!(value["links"][0]["href"], "/Auth/Me?fake-id=tester");
        assert_eq!(value["links"][1]["href"], "/Auth/Logout");
    }
}
