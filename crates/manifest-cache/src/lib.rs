//! Manifest Cache
//!
//! Fetches module manifests and page bootstraps, compiles them, and keeps the
//! compiled result in a bounded cache.
//!
//! # Core Operations
//!
//! - **Load**: [`ManifestLoader::load_manifest`] for a plain manifest
//! - **Bootstrap**: [`ManifestLoader::load_bootstrap`] for manifest plus the
//!   first list or record of the requested page in one round trip
//! - **Preview**: [`ManifestLoader::load_materialized`] for an in-memory manifest
//!
//! # Architecture
//!
//! ```text
//! ManifestSource → ManifestCompiler → CompiledManifest → ManifestState (watch)
//!                          ↑_______________↓
//!                    ManifestCache (moka, per module)
//! ```
//!
//! Bootstrap data is handed out through [`BootstrapMarker`], which lets each
//! snapshot be consumed once.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bootstrap;
pub mod cache;
pub mod compile;
pub mod error;
pub mod loader;
pub mod source;

pub use bootstrap::{BootstrapLedger, BootstrapMarker, BootstrapSnapshot, SurfaceKind};
pub use cache::{CacheStats, ManifestCache};
pub use compile::{CompileWarning, ManifestCompiler};
pub use error::{CompileError, LoadError, LoadResult};
pub use loader::{LoadTicket, ManifestLoader, ManifestState};
pub use source::{BootstrapPayload, BootstrapRequest, ManifestPayload, ManifestSource};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
