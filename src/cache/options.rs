//! Per-call Options Module
//!
//! Options passed to individual cache operations and their resolution
//! against the cache-level defaults.

use std::time::Duration;

use crate::config::CacheConfig;

// == Options ==
/// Per-call overrides. Anything left unset falls back to the cache defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Namespace for this call, replacing the default namespace
    pub namespace: Option<String>,
    /// Expiration for writes made by this call, replacing the default
    pub expires_in: Option<Duration>,
    /// Skip the cached value on fetch and always recompute
    pub force: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    // == Resolve ==
    /// Merges these options over `defaults`; per-call values win.
    pub fn resolve<'a>(&'a self, defaults: &'a CacheConfig) -> ResolvedOptions<'a> {
        ResolvedOptions {
            namespace: self.namespace.as_deref().or(defaults.namespace.as_deref()),
            expires_in: self.expires_in.or(defaults.expires_in),
            force: self.force,
        }
    }
}

/// Effective options for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOptions<'a> {
    pub namespace: Option<&'a str>,
    pub expires_in: Option<Duration>,
    pub force: bool,
}
