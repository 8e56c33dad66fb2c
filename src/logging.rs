//! Logging to the terminal through `tracing`

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.  Respects `RUST_LOG`, defaults to `info`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Something happened on Discord
#[macro_export]
macro_rules! log_event {
    ($($args:tt)+) => {{
        ::tracing::info!(target: "robyul::event", $($args)+)
    }};
}

/// Something happened inside the bot
#[macro_export]
macro_rules! log_internal {
    ($($args:tt)+) => {{
        ::tracing::info!(target: "robyul::internal", $($args)+)
    }};
}
