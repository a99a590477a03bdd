pub mod actions;
pub mod agent;
pub mod config;
pub mod cost;
pub mod error;
pub mod host;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod processor;
pub mod prompt;
pub mod providers;
pub mod setup;
pub mod summary;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// Note: This function can only be called once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
