use thiserror::Error;

/// Top-level error type for the `telenet-api` crate.
///
/// Covers every failure mode of the portal protocol: the OpenID login
/// handshake, the OCAPI gateway, and the transport underneath.
/// `telenet-core` maps these into user-facing conditions.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected: redirect to an authentication-error URL, or a
    /// degraded 200 from the user-details endpoint missing the
    /// customer number.
    #[error("Bad credentials: {message}")]
    BadCredentials { message: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// The portal violated the expected protocol: an unexpected HTTP
    /// status, the state/nonce pair never returned, the authorize step
    /// not landing on the login page, or the retry budget exhausted.
    #[error("Telenet service error: {message}")]
    Service { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A header value (XSRF token, referer) was not valid ASCII.
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates rejected credentials,
    /// so hosts can show an auth-specific message.
    pub fn is_bad_credentials(&self) -> bool {
        matches!(self, Self::BadCredentials { .. })
    }

    /// Returns `true` if this is a transient transport problem worth
    /// retrying at a later refresh.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
