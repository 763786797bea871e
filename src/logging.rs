use log::LevelFilter;

/// Installs the `env_logger` backend. `RUST_LOG` still overrides `level`. Calling it twice is
/// harmless.
pub fn init_logging(level: LevelFilter) {
    let _ = env_logger::builder()
        .format_target(false)
        .format_timestamp_secs()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}
