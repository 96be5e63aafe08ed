//! Botframe core contracts and wire types.
//!
//! This crate exposes the activity wire model, the per-turn execution
//! context, and the trait seams (connector, credentials, storage,
//! transcript) shared between the authentication, connector, adapter,
//! and dialog crates.

pub mod activity;
pub mod connector;
pub mod context;
pub mod credentials;
pub mod identity;
pub mod storage;
#[cfg(feature = "testkit")]
pub mod testkit;
pub mod transcript;

pub use activity::*;
pub use connector::*;
pub use context::*;
pub use credentials::*;
pub use identity::*;
pub use storage::*;
pub use transcript::*;

/// Returns the semantic version advertised by this crate.
///
/// ```
/// assert_eq!(bfm_core::version(), "0.1.0");
/// ```
pub fn version() -> &'static str {
    "0.1.0"
}
