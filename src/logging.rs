//! Log output setup.
//!
//! The crate emits [`tracing`] events; nothing is printed until a
//! subscriber is installed. With the `logging` feature, [`init`] installs
//! one driven by environment variables:
//!
//! | Variable         | Effect                                        |
//! |------------------|-----------------------------------------------|
//! | `LEXVFS_VERBOSE` | `0` errors, `1` warnings (default), `2` info  |
//! | `LEXVFS_DEBUG`   | `1` enables debug output, overrides verbosity |
//! | `LEXVFS_LOG`     | also append every record to this file         |
//!
//! `RUST_LOG`, when set, takes precedence over both level variables.

/// Level directive for the given `LEXVFS_VERBOSE` / `LEXVFS_DEBUG` values.
pub fn level_directive(verbose: Option<&str>, debug: Option<&str>) -> &'static str {
    if debug.is_some_and(|d| d.trim() == "1") {
        return "debug";
    }
    match verbose.map(str::trim) {
        Some("0") => "error",
        Some("2") => "info",
        _ => "warn",
    }
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed.
#[cfg(feature = "logging")]
pub fn init() -> crate::error::Result<bool> {
    use std::sync::Mutex;

    use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    use crate::error::Error;

    let verbose = std::env::var("LEXVFS_VERBOSE").ok();
    let debug = std::env::var("LEXVFS_DEBUG").ok();
    let directive = level_directive(verbose.as_deref(), debug.as_deref());
    let filter = || {
        EnvFilter::builder()
            .with_default_directive(
                directive
                    .parse()
                    .unwrap_or_else(|_| tracing::level_filters::LevelFilter::WARN.into()),
            )
            .from_env_lossy()
    };

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .with_filter(filter());

    let file_layer = match std::env::var_os("LEXVFS_LOG") {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| Error::from_io(e, path.to_string_lossy()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok())
}
