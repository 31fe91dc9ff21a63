use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "video_scout=info";

/// Builds the filter: `RUST_LOG` wins, then `level` for this crate, then the default
pub fn build_filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match level {
        Some(level) => format!("video_scout={}", level).into(),
        None => DEFAULT_FILTER.into(),
    })
}

/// Installs the global subscriber once; later calls are ignored.
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing(level: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_writer(std::io::stderr)
        .try_init();
}
