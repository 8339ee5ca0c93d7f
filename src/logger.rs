use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber. `RUST_LOG` wins over the CLI level.
pub fn init_logger(level: &str) {
    let filter = if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        env_filter
    } else {
        EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(true)
                .with_ansi(true)
                .compact(),
        )
        .init();
}

pub mod log {
    pub use tracing::{debug, error, info, warn};

    /// Connection lifecycle event
    pub fn connection(addr: &str, event: &str) {
        info!(peer = addr, event = event, "Connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_event_does_not_panic() {
        log::connection("127.0.0.1:1234", "new");
    }
}
