//! Manifest HTTP - `reqwest` transport for the interpreter's remote contracts
//!
//! One [`HttpClient`] implements every service the runtime consumes:
//!
//! | Contract | Endpoint |
//! |----------|----------|
//! | [`ManifestSource::get_manifest`] | `GET /manifests/{module}` |
//! | [`ManifestSource::get_page_bootstrap`] | `POST /manifests/bootstrap` |
//! | [`RecordApi`] | `GET/POST/PUT/DELETE /records/{entity}[/{id}]` |
//! | [`ActionApi::run`] | `POST /actions/run` |
//! | [`RegistryApi::list_modules`] | `GET /modules` |
//!
//! [`ManifestSource::get_manifest`]: manifest_cache::ManifestSource::get_manifest
//! [`ManifestSource::get_page_bootstrap`]: manifest_cache::ManifestSource::get_page_bootstrap
//! [`RecordApi`]: manifest_runtime::RecordApi
//! [`ActionApi::run`]: manifest_runtime::ActionApi::run
//! [`RegistryApi::list_modules`]: manifest_runtime::RegistryApi::list_modules

#![warn(unreachable_pub)]

mod client;
mod config;
mod error;

pub use client::HttpClient;
pub use config::HttpConfig;
pub use error::HttpError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
