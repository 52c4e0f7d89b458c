//! Tracing initialization.
//!
//! Outside test runners the level defaults to WARN. `kb-search` is a
//! one-shot command whose answer is the output itself, so only degraded
//! behaviour such as a keyword-only fallback is worth surfacing unprompted.
//! Targeted `RUST_LOG` directives like `kb_retrieval=debug` still apply.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Initialize tracing. Safe to call multiple times.
///
/// Logs go to stderr so that `--json` output on stdout stays machine-readable.
pub fn init() {
    INIT.call_once(|| {
        let is_test =
            std::env::var("NEXTEST").is_ok() || std::env::var("CARGO_TARGET_TMPDIR").is_ok();
        let filter = EnvFilter::from_default_env().add_directive(default_level(is_test).into());

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_target(true)
            .with_span_events(FmtSpan::NONE)
            .compact();

        if is_test {
            // Another test harness may already own the global subscriber.
            let _ = builder.with_test_writer().finish().try_init();
        } else if let Err(e) = builder.with_writer(std::io::stderr).try_init() {
            eprintln!("Failed to initialize tracing: {}", e);
        }
    });
}

/// DEBUG under test runners, WARN for the one-shot CLI.
const fn default_level(is_test: bool) -> tracing::Level {
    if is_test {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    }
}
