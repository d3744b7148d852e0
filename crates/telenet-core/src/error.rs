// ── Core error types ──
//
// User-facing conditions from telenet-core. Transport and protocol
// failures pass through from the API crate; the one domain-specific
// condition is the empty-account case, which hosts must surface with
// its own message instead of a generic fetch failure.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The active-products endpoint had nothing for this account.
    /// Distinct from a transient failure: the account has either not
    /// been migrated to the new backend yet, or the API is down.
    #[error(
        "No products found. Either the API is currently down or the account \
         is not yet migrated to the new Telenet IT system"
    )]
    NotProvisioned,

    /// Error from the portal API layer (auth, protocol, transport).
    #[error(transparent)]
    Api(#[from] telenet_api::Error),
}

impl CoreError {
    /// Returns `true` when the host should show its invalid-auth
    /// message rather than a generic service error.
    pub fn is_bad_credentials(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_bad_credentials())
    }
}
