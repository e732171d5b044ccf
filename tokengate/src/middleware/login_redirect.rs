//! Unauthorized-redirect post-processor
//!
//! Browsers cannot act on a bare 401, so for requests that prefer an HTML
//! representation a 401 response is swapped for a 307 to the login route:
//!
//! ```text
//! GET /games?token=<expired>   Accept: text/html
//!   ─▶ 307 Location: /Auth/Login?redirect-to=http%3A%2F%2Fhost%2Fgames%3Ftoken%3D...
//! ```
//!
//! API clients (JSON, the default) keep the 401. Every other status, 403 for
//! tampered tokens included, passes through untouched.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::Request,
    http::{header::ACCEPT, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use tower::{Layer, Service};

use crate::extractors::RequestOrigin;
use crate::state::AuthState;

/// Query parameter carrying the address to return to after login
pub const REDIRECT_TO_PARAM: &str = "redirect-to";

/// Representation a client asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// `application/json`
    Json,
    /// `text/html`
    Html,
}

/// Pick JSON or HTML from an `Accept` header
///
/// The highest quality wins; ties go to the earlier entry. Wildcards and a
/// missing header mean JSON.
#[must_use]
pub fn negotiate(headers: &HeaderMap) -> Representation {
    let Some(accept) = headers.get(ACCEPT).and_then(|v| v.to_str().ok()) else {
        return Representation::Json;
    };

    let mut best: Option<(f32, Representation)> = None;
    for entry in accept.split(',') {
        let mut params = entry.split(';');
        let media = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        let quality = params
            .filter_map(|p| p.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        if quality <= 0.0 {
            continue;
        }

        let representation = match media.as_str() {
            "text/html" | "application/xhtml+xml" | "text/*" => Representation::Html,
            "application/json" | "application/*" | "*/*" => Representation::Json,
            _ => continue,
        };
        if best.is_none_or(|(q, _)| quality > q) {
            best = Some((quality, representation));
        }
    }

    best.map_or(Representation::Json, |(_, representation)| representation)
}

/// Login location that returns to `original_url` afterwards
#[must_use]
pub fn login_location(login_path: &str, original_url: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(REDIRECT_TO_PARAM, original_url)
        .finish();
    format!("{login_path}?{query}")
}

/// Layer that redirects HTML clients from 401 to the login route
///
/// Must wrap [`crate::middleware::AuthenticateLayer`] so the authenticator's
/// own 401s are seen.
#[derive(Clone, Debug)]
pub struct LoginRedirectLayer {
    login_path: Arc<str>,
    public_base_url: Option<Arc<str>>,
}

impl LoginRedirectLayer {
    /// Create the layer from shared state
    #[must_use]
    pub fn new(state: &AuthState) -> Self {
        let auth = &state.config().auth;
        Self {
            login_path: Arc::from(auth.login_path.as_str()),
            public_base_url: auth.public_base_url.as_deref().map(Arc::from),
        }
    }
}

impl<S> Layer<S> for LoginRedirectLayer {
    type Service = LoginRedirectMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoginRedirectMiddleware {
            inner,
            login_path: Arc::clone(&self.login_path),
            public_base_url: self.public_base_url.clone(),
        }
    }
}

/// Service produced by [`LoginRedirectLayer`]
#[derive(Clone, Debug)]
pub struct LoginRedirectMiddleware<S> {
    inner: S,
    login_path: Arc<str>,
    public_base_url: Option<Arc<str>>,
}

impl<S> Service<Request> for LoginRedirectMiddleware<S>
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

    fn call(&mut self, req: Request) -> Self::Future {
        let login_path = Arc::clone(&self.login_path);
        let mut inner = self.inner.clone();

        if negotiate(req.headers()) != Representation::Html {
            return Box::pin(async move { inner.call(req).await });
        }

        let origin = RequestOrigin::resolve(
            req.headers(),
            req.uri(),
            self.public_base_url.as_deref(),
        );
        let original_url = origin.absolute(
            req.uri()
                .path_and_query()
                .map_or("/", axum::http::uri::PathAndQuery::as_str),
        );

        Box::pin(async move {
            let response = inner.call(req).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            let location = login_location(&login_path, &original_url);
            tracing::debug!(%original_url, "redirecting browser to login");
            Ok(Redirect::temporary(&location).into_response())
        })
    }
}
