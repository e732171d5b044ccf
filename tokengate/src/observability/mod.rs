//! Observability (structured logging)
//!
//! Every component logs through `tracing` with structured fields such as
//! `user_id`, `route` and `attempt`. [`init`] installs the subscriber once per
//! process.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter for debug builds
pub const DEBUG_FILTER: &str = "debug,tokengate=trace";

/// Default filter for release builds
pub const RELEASE_FILTER: &str = "info";

/// Initialize logging
///
/// Sets up:
/// - Pretty formatting in debug builds, JSON formatting in release builds
/// - `RUST_LOG` filtering, falling back to [`DEBUG_FILTER`] or [`RELEASE_FILTER`]
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
///
/// # Example
///
/// ```rust,no_run
/// use tokengate::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init()?;
/// tracing::info!("Application started");
/// # Ok(())
/// # }
/// ```
pub fn init() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    #[cfg(debug_assertions)]
    {
        // Pretty formatting for development
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    #[cfg(not(debug_assertions))]
    {
        // JSON formatting for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    }

    Ok(())
}

fn default_filter() -> EnvFilter {
    if cfg!(debug_assertions) {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::new(RELEASE_FILTER)
    }
}
