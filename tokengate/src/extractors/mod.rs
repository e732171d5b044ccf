//! Axum extractors for tokengate
//!
//! Request context that handlers need besides the identity itself: the
//! externally visible origin of the request and the link decorator.

mod links;
mod origin;

pub use links::{set_query_param, Link, LinkDecorator, LOGOUT_REL};
pub use origin::{RequestOrigin, FORWARDED_PROTO};
