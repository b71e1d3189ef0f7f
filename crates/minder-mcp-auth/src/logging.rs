//! Logging initialization
//!
//! Structured JSON logs on stderr. Stdout stays free for the MCP stdio
//! transport.
//!
//! ```rust,no_run
//! minder_mcp_auth::logging::init("debug")?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! `RUST_LOG`, when set, takes precedence over the level passed to [`init`].

use std::io;

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Map a level name to a tracing level
///
/// Accepts `debug`, `info`, `warn` and `error` in any case. Anything else,
/// including an empty string, yields `info`.
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global JSON subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(level: &str) -> io::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(parse_level(level)).into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(io::stderr))
        .try_init()
        .map_err(|e| io::Error::other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("info"), Level::INFO);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level(" error "), Level::ERROR);
    }

    #[test]
    fn test_unknown_level_defaults_to_info() {
        assert_eq!(parse_level(""), Level::INFO);
        assert_eq!(parse_level("trace"), Level::INFO);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_second_init_fails_without_panicking() {
        let first = init("info");
        let second = init("debug");
        // Another test binary may have installed a subscriber first; either
        // way at most one of these succeeds.
        assert!(!(first.is_ok() && second.is_ok()));
        assert!(second.is_err());
    }
}
