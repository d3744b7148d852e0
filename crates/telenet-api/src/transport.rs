// Shared transport configuration for building reqwest::Client instances.
//
// The portal session is cookie-based and rotates an XSRF token through
// the cookie jar, so the jar is always shared (`Arc<Jar>`) and readable
// by the client after every response.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};

use crate::environment::Environment;
use crate::error::Error;

/// Fixed timeout applied to every portal request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport configuration for the portal HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub cookie_jar: Arc<Jar>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: REQUEST_TIMEOUT,
            cookie_jar: Arc::new(Jar::default()),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` for the given environment.
    ///
    /// Redirect following stays enabled (reqwest's default) -- the
    /// OpenID authorize step is only recognized by the URL the redirect
    /// chain lands on. The identity provider's referer headers are
    /// installed as defaults on every request.
    pub fn build_client(&self, environment: &Environment) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_str(&environment.referer)
                .map_err(|e| Error::InvalidHeader(e.to_string()))?,
        );
        headers.insert(
            "x-alt-referer",
            HeaderValue::from_str(&environment.x_alt_referer)
                .map_err(|e| Error::InvalidHeader(e.to_string()))?,
        );

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent("telenet-api/0.1.0")
            .default_headers(headers)
            .cookie_provider(Arc::clone(&self.cookie_jar))
            .build()
            .map_err(Error::Transport)
    }
}
