//! tracing-subscriber bootstrap shared by binaries and tests

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// Returns false if a subscriber was already installed, which makes the call
/// safe to repeat from every test.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .is_ok(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
            .is_ok(),
    }
}
