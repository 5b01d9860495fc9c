#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Shared test helpers used across the swarmview suites.
//! Layout: fixtures.rs (deterministic records), engine.rs (scriptable
//! in-memory engine double).

/// Scriptable in-memory engine double.
pub mod engine;
/// Deterministic torrent record fixtures.
pub mod fixtures;

pub use engine::ScriptedEngine;
pub use fixtures::{fields, snapshot};

/// Install a test-friendly tracing subscriber.
///
/// Safe to call from every test; installation races are ignored so the
/// first caller wins.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
