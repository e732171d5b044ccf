//! Carrying query credentials forward on generated links
//!
//! A client that authenticates with `?token=...` (or `?fake-id=...`) in the
//! query string usually cannot add headers, so links handed back to it must
//! repeat the parameter. Logout links are left alone so following one really
//! drops the credential.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use url::{Position, Url};

/// Rel of links that must not carry the credential
pub const LOGOUT_REL: &str = "logout";

const RELATIVE_BASE: &str = "http://relative.invalid";

/// Hypermedia link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    /// Relation
    pub rel: String,
    /// Target
    pub href: String,
}

/// Adds the request's query credential to outgoing links
///
/// Attached to the request by the authenticator when the credential came from
/// the query string. Extracting it never fails; without a query credential it
/// leaves links untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkDecorator {
    carried: Option<(String, String)>,
}

impl LinkDecorator {
    /// Decorator that appends `param=value`
    pub fn carrying(param: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            carried: Some((param.into(), value.into())),
        }
    }

    /// Whether links will be changed
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.carried.is_some()
    }

    /// Decorate an absolute or origin-relative href
    #[must_use]
    pub fn decorate(&self, rel: &str, href: &str) -> String {
        let Some((param, value)) = &self.carried else {
            return href.to_string();
        };
        if rel == LOGOUT_REL {
            return href.to_string();
        }

        match Url::parse(href) {
            Ok(mut url) => {
                set_query_param(&mut url, param, value);
                url.into()
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let Ok(mut url) = Url::parse(RELATIVE_BASE).and_then(|base| base.join(href)) else {
                    return href.to_string();
                };
                set_query_param(&mut url, param, value);
                url[Position::BeforePath..].to_string()
            }
            Err(_) => href.to_string(),
        }
    }

    /// Build a decorated link
    #[must_use]
    pub fn link(&self, rel: &str, href: &str) -> Link {
        Link {
            rel: rel.to_string(),
            href: self.decorate(rel, href),
        }
    }
}

impl<S> FromRequestParts<S> for LinkDecorator
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_default())
    }
}

/// Set a query parameter, replacing any existing occurrences and keeping the rest
pub fn set_query_param(url: &mut Url, name: &str, value: &str) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| *key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (key, existing) in &retained {
        pairs.append_pair(key, existing);
    }
    pairs.append_pair(name, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_decorator_is_identity() {
        let decorator = LinkDecorator::default();
        assert!(!decorator.is_active());
        assert_eq!(decorator.decorate("self", "/Auth/Me"), "/Auth/Me");
    }

    #[test]
    fn test_relative_link_gains_parameter() {
        let decorator = LinkDecorator::carrying("token", "abc");
        assert_eq!(decorator.decorate("self", "/games?page=2"), "/games?page=2&token=abc");
    }

    #[test]
    fn test_absolute_link_replaces_existing_parameter() {
        let decorator = LinkDecorator::carrying("token", "new");
        assert_eq!(
            decorator.decorate("next", "https://x.test/a?token=old&b=1"),
            "https://x.test/a?b=1&token=new"
        );
    }

    #[test]
    fn test_logout_link_untouched() {
        let decorator = LinkDecorator::carrying("fake-id", "42");
        let link = decorator.link(LOGOUT_REL, "/Auth/Logout");
        assert_eq!(link.href, "/Auth/Logout");
    }

    #[test]
    fn test_set_query_param_on_bare_url() {
        let mut url = Url::parse("https://x.test/y").unwrap();
        set_query_param(&mut url, "token", "t/+=");
        assert_eq!(url.as_str(), "https://x.test/y?token=t%2F%2B%3D");
    }
}
