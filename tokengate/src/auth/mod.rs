//! Access to the authenticated identity from handlers

mod extractors;

pub use extractors::{Authenticated, OptionalAuth};
