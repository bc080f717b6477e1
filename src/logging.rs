//! `env_logger` setup. `RUST_LOG` takes precedence over the configured level.

/// Install the global logger. Later calls are no-ops and return `false`.
pub fn init(level: &str) -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
