//! Target resolution
//!
//! Picks the page or view to show for a module from the requested target and
//! the app's default home, recovering when the target does not exist in the
//! current manifest.
//!
//! Fallback order after the requested target (or default home): the default
//! home, the manifest's configured `app.home`, the first declared page, the
//! first declared view. The first candidate that names an existing page or
//! view wins.

use crate::error::{RuntimeError, RuntimeResult};
use manifest_model::{Manifest, Target};

/// Outcome of resolving against a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Target to show
    pub target: Target,
    /// Target parsed from the request (or default home)
    pub requested: Target,
    /// Whether a fallback candidate was used
    pub fell_back: bool,
}

/// Parse the requested target, falling back to the default home
///
/// # Errors
/// - [`RuntimeError::MissingHome`] when both are absent (or blank)
/// - [`RuntimeError::InvalidTarget`] when the chosen string does not parse
pub fn resolve_app_target(
    requested: Option<&str>,
    default_home: Option<&str>,
) -> RuntimeResult<Target> {
    let raw = non_blank(requested)
        .or_else(|| non_blank(default_home))
        .ok_or(RuntimeError::MissingHome)?;
    Ok(raw.parse::<Target>()?)
}

/// Resolve against a manifest with fallback recovery
///
/// Pure function of its inputs; calling it again with the same arguments
/// gives the same answer.
///
/// # Errors
/// - errors of [`resolve_app_target`]
/// - [`RuntimeError::TargetNotFound`] when no candidate exists
pub fn resolve_in_manifest(
    requested: Option<&str>,
    default_home: Option<&str>,
    manifest: &Manifest,
) -> RuntimeResult<Resolution> {
    let parsed = resolve_app_target(requested, default_home)?;
    if manifest.contains_target(&parsed) {
        return Ok(Resolution {
            target: parsed.clone(),
            requested: parsed,
            fell_back: false,
        });
    }

    let configured = [non_blank(default_home), non_blank(manifest.app.home.as_deref())]
        .into_iter()
        .flatten()
        .filter_map(|raw| raw.parse::<Target>().ok());
    let declared = [manifest.first_page_target(), manifest.first_view_target()]
        .into_iter()
        .flatten();

    let found = configured
        .chain(declared)
        .find(|candidate| manifest.contains_target(candidate));

    match found {
        Some(target) => {
            tracing::warn!(
                requested = %parsed,
                fallback = %target,
                "target not in manifest, using fallback"
            );
            Ok(Resolution {
                target,
                requested: parsed,
                fell_back: true,
            })
        }
        None => Err(RuntimeError::TargetNotFound(parsed.to_string())),
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
