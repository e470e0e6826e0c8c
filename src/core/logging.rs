//! Logging setup for the CLI and tools

/// Initialize env_logger the way the grid-builder binary expects: `info`
/// level by default, millisecond timestamps so build and selection timings
/// line up in the output. RUST_LOG overrides the filter.
pub fn init() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();
}
