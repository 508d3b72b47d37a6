use log::LevelFilter;

/// Initialize logging for the host process.
/// Should be called once at startup; subsequent calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Info)
        .try_init();
}

/// Log level helper to determine if debug logging is enabled
pub fn is_debug_enabled() -> bool {
    log::log_enabled!(log::Level::Debug)
}
