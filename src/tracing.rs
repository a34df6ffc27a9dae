//! Tracing initialization for embedders and tests.
//!
//! The library only emits events; installing a subscriber is up to the host.
//! [`init`] is a convenience for binaries and test suites that have none.
//! `RUST_LOG` refines the filter, and `SEARCH_LOG_FORMAT=json` switches to
//! JSON lines.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

static INIT: Once = Once::new();

/// Initialize tracing. Safe to call multiple times.
pub fn init() {
    INIT.call_once(|| {
        let is_test =
            std::env::var("NEXTEST").is_ok() || std::env::var("CARGO_TARGET_TMPDIR").is_ok();
        let json = std::env::var("SEARCH_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
        let filter = EnvFilter::from_default_env().add_directive(
            if is_test {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            }
            .into(),
        );

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_target(true)
            .with_span_events(FmtSpan::NONE);

        let result = match (json, is_test) {
            (true, true) => builder.json().with_test_writer().try_init(),
            (true, false) => builder.json().with_writer(std::io::stderr).try_init(),
            (false, true) => builder.compact().with_test_writer().try_init(),
            (false, false) => builder.compact().with_writer(std::io::stderr).try_init(),
        };
        // Another subscriber may already be installed by the host
        if let Err(e) = result {
            eprintln!("Failed to initialize tracing: {}", e)
        }
    });
}
