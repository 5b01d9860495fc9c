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
#![allow(clippy::module_name_repetitions)]

//! Pipeline driver: owns the store, the projection, and the adapter, keeps
//! them in sync with the external engine, and correlates asynchronous
//! command traffic.
//!
//! Everything mutable runs on one logical task. The engine delivers notices
//! from its own execution contexts through a [`SessionHandle`], and the
//! session's `run` loop is the single consumer; no lock guards any pipeline
//! state.

/// Session configuration surface.
pub mod config;
/// Tag-keyed request/response correlation.
pub mod correlator;
/// The session pipeline itself.
pub mod session;

pub use config::SessionConfig;
pub use correlator::RequestCorrelator;
pub use session::{RendererSubscription, Session, SessionCommand, SessionHandle, spawn};
