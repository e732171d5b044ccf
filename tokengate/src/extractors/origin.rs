//! Externally visible scheme and host of a request

use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::HOST, request::Parts, HeaderMap, Uri},
};
use url::Url;

use crate::state::AuthState;

/// Header set by TLS-terminating proxies
pub const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Scheme and host the client used to reach us
///
/// The scheme is `https` when the request arrived over TLS, as reported by
/// `X-Forwarded-Proto` or an absolute `https` request uri, and `http`
/// otherwise. The host mirrors the `Host` header. A configured
/// `auth.public_base_url` replaces both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    scheme: String,
    host: String,
}

impl RequestOrigin {
    /// Derive the origin from request headers and uri
    #[must_use]
    pub fn from_request(headers: &HeaderMap, uri: &Uri) -> Self {
        let forwarded_https = headers
            .get(FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
        let scheme = if forwarded_https || uri.scheme_str() == Some("https") {
            "https"
        } else {
            "http"
        };

        let host = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(ToString::to_string))
            .unwrap_or_else(|| "localhost".to_string());

        Self {
            scheme: scheme.to_string(),
            host,
        }
    }

    /// Origin of a configured base url such as `https://api.example.com:8443`
    #[must_use]
    pub fn from_base_url(base_url: &str) -> Option<Self> {
        let url = Url::parse(base_url).ok()?;
        let host = url.host_str()?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Some(Self {
            scheme: url.scheme().to_string(),
            host,
        })
    }

    /// Configured base url when set and valid, otherwise the request's own origin
    #[must_use]
    pub fn resolve(headers: &HeaderMap, uri: &Uri, public_base_url: Option<&str>) -> Self {
        public_base_url
            .and_then(Self::from_base_url)
            .unwrap_or_else(|| Self::from_request(headers, uri))
    }

    /// `http` or `https`
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host, with port when one was given
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// `scheme://host`
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// Absolute url for a path (and optional query) on this origin
    #[must_use]
    pub fn absolute(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.base_url())
    }

    /// Resolve an absolute or origin-relative url reference
    ///
    /// # Errors
    ///
    /// Returns an error if `reference` is not a valid url reference.
    pub fn join(&self, reference: &str) -> Result<Url, url::ParseError> {
        match Url::parse(reference) {
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse(&self.base_url())?.join(reference)
            }
            other => other,
        }
    }
}

impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AuthState::from_ref(state);
        Ok(state.origin(&parts.headers, &parts.uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_plain_request() {
        let origin =
            RequestOrigin::from_request(&headers(&[("host", "api.local:8080")]), &Uri::from_static("/x"));
        assert_eq!(origin.base_url(), "http://api.local:8080");
    }

    #[test]
    fn test_forwarded_https() {
        let origin = RequestOrigin::from_request(
            &headers(&[("host", "api.example.com"), ("x-forwarded-proto", "https")]),
            &Uri::from_static("/x"),
        );
        assert_eq!(origin.scheme(), "https");
        assert_eq!(origin.absolute("/Auth/Me?a=b"), "https://api.example.com/Auth/Me?a=b");
    }

    #[test]
    fn test_absolute_https_uri() {
        let origin = RequestOrigin::from_request(
            &HeaderMap::new(),
            &Uri::from_static("https://secure.example.com/x"),
        );
        assert_eq!(origin.base_url(), "https://secure.example.com");
    }

    #[test]
    fn test_public_base_url_wins() {
        let origin = RequestOrigin::resolve(
            &headers(&[("host", "10.0.0.5:8080")]),
            &Uri::from_static("/x"),
            Some("https://api.example.com:8443"),
        );
        assert_eq!(origin.base_url(), "https://api.example.com:8443");
    }

    #[test]
    fn test_join_relative_and_absolute() {
        let origin = RequestOrigin::from_request(&headers(&[("host", "a.test")]), &Uri::from_static("/"));
        assert_eq!(origin.join("/games?x=1").unwrap().as_str(), "http://a.test/games?x=1");
        assert_eq!(origin.join("https://b.test/y").unwrap().as_str(), "https://b.test/y");
    }
}
