//! Caller-supplied options forwarded to the renderer on show.

use std::collections::BTreeMap;

/// Which lock surface the renderer should bring up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceVariant {
    /// Regular lock screen.
    #[default]
    Default,
    /// Go straight to the security challenge.
    Bouncer,
    /// Power-off alarm surface.
    Alarm,
}

/// Options carried from a show request to the renderer unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShowOptions {
    /// Requested surface.
    pub variant: SurfaceVariant,
    /// Opaque extras understood by the renderer.
    pub extras: BTreeMap<String, String>,
}

impl ShowOptions {
    /// Options requesting a specific surface with no extras.
    pub fn with_variant(variant: SurfaceVariant) -> Self {
        Self { variant, extras: BTreeMap::new() }
    }
}
