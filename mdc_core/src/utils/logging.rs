use log::LevelFilter;

/// Initialize logging using env_logger.
/// Debug by default; the RUST_LOG environment variable overrides it,
/// e.g. `RUST_LOG=mdc_core=info`.
///
/// Safe to call more than once: later calls leave the first logger in place.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .try_init();
}
