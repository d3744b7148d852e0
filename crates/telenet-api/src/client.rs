// Portal HTTP client
//
// Wraps `reqwest::Client` with the portal's session mechanics: the
// XSRF cookie-to-header mirror, the expected-status contract, and the
// bounded re-login-and-retry policy. Endpoint modules (products,
// billing, mobile, resource, contact) are implemented as inherent
// methods via separate files to keep this module focused on transport
// mechanics.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::cookie::{CookieStore, Jar};
use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::environment::Environment;
use crate::error::Error;
use crate::models::{Fetch, PortalResponse, UserDetails};
use crate::transport::TransportConfig;

/// Bound on re-login-and-retry cycles per request, and on state/nonce
/// fetch attempts during login. Never indefinite.
pub(crate) const CONNECTION_RETRY: u32 = 3;

/// Session cookie the portal rotates on (potentially) every response.
const XSRF_COOKIE: &str = "TOKEN-XSRF";
/// Header the rotated token must be mirrored into.
const XSRF_HEADER: &str = "X-TOKEN-XSRF";

/// 403 error codes that mean "session problem, re-login will fix it"
/// rather than "this dataset is off-limits for the account".
const BENIGN_FORBIDDEN_CODES: &[&str] = &["OCAPI-ERR-667"];

/// Client for the Telenet customer portal.
///
/// Owns one authenticated session: the HTTP client, the shared cookie
/// jar, the mirrored XSRF token, and the cached user record. All calls
/// are strictly sequential; the session state is not thread-safe and a
/// caller running multiple accounts needs one client per account.
pub struct PortalClient {
    http: reqwest::Client,
    cookie_jar: Arc<Jar>,
    environment: Environment,
    username: String,
    password: SecretString,
    /// Display-language code forwarded to the identity provider and
    /// used by consumers to pick localized spec-sheet content.
    language: String,
    xsrf_token: Option<String>,
    user: Option<UserDetails>,
    /// JSON error body captured from the most recent soft failure.
    last_error: Option<Value>,
    /// Contact addresses memoized by address id for the session.
    pub(crate) addresses: HashMap<String, Value>,
}

impl PortalClient {
    /// Create a client with a fresh transport against the given
    /// environment.
    pub fn new(
        username: impl Into<String>,
        password: SecretString,
        language: impl Into<String>,
        environment: Environment,
    ) -> Result<Self, Error> {
        let transport = TransportConfig::default();
        let http = transport.build_client(&environment)?;
        Ok(Self {
            http,
            cookie_jar: transport.cookie_jar,
            environment,
            username: username.into(),
            password,
            language: language.into(),
            xsrf_token: None,
            user: None,
            last_error: None,
            addresses: HashMap::new(),
        })
    }

    /// Create a client around a pre-built `reqwest::Client` and its
    /// cookie jar (the jar must be the one installed on the client, or
    /// the XSRF mirror will never see the rotated token).
    pub fn with_client(
        http: reqwest::Client,
        cookie_jar: Arc<Jar>,
        username: impl Into<String>,
        password: SecretString,
        language: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            http,
            cookie_jar,
            environment,
            username: username.into(),
            password,
            language: language.into(),
            xsrf_token: None,
            user: None,
            last_error: None,
            addresses: HashMap::new(),
        }
    }

    /// The environment this client talks to.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// The configured display-language code.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The configured account username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The authenticated-user record, if a login has completed.
    pub fn user(&self) -> Option<&UserDetails> {
        self.user.as_ref()
    }

    /// JSON error body captured from the most recent soft failure.
    pub fn last_error(&self) -> Option<&Value> {
        self.last_error.as_ref()
    }

    pub(crate) fn set_user(&mut self, user: UserDetails) {
        self.user = Some(user);
    }

    pub(crate) fn credentials(&self) -> (String, SecretString) {
        (self.username.clone(), self.password.clone())
    }

    // ── Raw transport ────────────────────────────────────────────────

    /// Issue a GET and drain the response into an owned snapshot.
    ///
    /// No status interpretation happens here; the login flow needs raw
    /// access to probe responses. The XSRF mirror runs on every
    /// response because the portal can rotate the token silently.
    pub(crate) async fn send_get(&mut self, url: &str) -> Result<PortalResponse, Error> {
        debug!("GET {url}");
        let mut request = self.http.get(url);
        if let Some(token) = &self.xsrf_token {
            request = request.header(XSRF_HEADER, token);
        }
        let response = request.send().await?;
        self.snapshot(response).await
    }

    /// Issue a url-encoded form POST (only the credential submission
    /// uses this) and drain the response.
    pub(crate) async fn send_form(
        &mut self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<PortalResponse, Error> {
        debug!("POST {url}");
        let mut request = self.http.post(url).form(form);
        if let Some(token) = &self.xsrf_token {
            request = request.header(XSRF_HEADER, token);
        }
        let response = request.send().await?;
        self.snapshot(response).await
    }

    async fn snapshot(&mut self, response: reqwest::Response) -> Result<PortalResponse, Error> {
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await?;
        self.refresh_xsrf(&url);
        debug!("HTTP {status} from {url}");
        Ok(PortalResponse { status, url, body })
    }

    /// Mirror the rotated XSRF cookie into the outgoing header slot.
    fn refresh_xsrf(&mut self, url: &Url) {
        let Some(header) = self.cookie_jar.cookies(url) else {
            return;
        };
        let Ok(cookies) = header.to_str() else {
            return;
        };
        for cookie in cookies.split(';') {
            if let Some((name, value)) = cookie.trim().split_once('=') {
                if name == XSRF_COOKIE {
                    self.xsrf_token = Some(value.to_owned());
                }
            }
        }
    }

    // ── Dispatcher ───────────────────────────────────────────────────

    /// The single choke point for every endpoint call.
    ///
    /// With `expected` set, the caller is guaranteed to receive either
    /// a response with exactly that status (`Fetch::Data`) or the
    /// soft-failure marker (`Fetch::Unavailable`); anything else is an
    /// error. 401/500 (and benign or body-less 403) trigger a full
    /// re-login and a retry, bounded by [`CONNECTION_RETRY`].
    pub(crate) async fn fetch(
        &mut self,
        url: &str,
        expected: Option<StatusCode>,
    ) -> Result<Fetch<PortalResponse>, Error> {
        let mut retries_left = CONNECTION_RETRY;
        let mut retrying = false;
        loop {
            let response = self.send_get(url).await?;
            let Some(expected) = expected else {
                return Ok(Fetch::Data(response));
            };
            if response.status == expected {
                return Ok(Fetch::Data(response));
            }
            debug!(
                "HTTP {} from {url} (expecting HTTP {expected})",
                response.status
            );
            if response.status == StatusCode::NOT_FOUND {
                self.last_error = response.json_value().ok();
                return Ok(Fetch::Unavailable);
            }
            if response.status == StatusCode::FORBIDDEN {
                let code = response
                    .json_value()
                    .ok()
                    .and_then(|body| Some((body.get("code")?.as_str()?.to_owned(), body)));
                if let Some((code, body)) = code {
                    if !BENIGN_FORBIDDEN_CODES.contains(&code.as_str()) {
                        warn!("access forbidden ({code}) for {}", self.username);
                        self.last_error = Some(body);
                        return Ok(Fetch::Unavailable);
                    }
                    // Benign code: the session went stale, fall through
                    // to the re-login path.
                }
            } else if response.status != StatusCode::UNAUTHORIZED
                && response.status != StatusCode::INTERNAL_SERVER_ERROR
                && !retrying
            {
                // Unexpected status on a first attempt: fast-fail
                // instead of masking a protocol error behind retries.
                return Err(Error::Service {
                    message: format!(
                        "expecting HTTP {expected}, got HTTP {} from {}: {}",
                        response.status, response.url, response.body
                    ),
                });
            }
            if retries_left == 0 {
                return Err(Error::Service {
                    message: format!(
                        "retry budget exhausted, last HTTP {} from {}",
                        response.status, response.url
                    ),
                });
            }
            debug!(
                "HTTP {} from {url}, re-authenticating and retrying",
                response.status
            );
            self.login().await?;
            retries_left -= 1;
            retrying = true;
        }
    }

    /// GET expecting 200, with the body parsed as untyped JSON.
    pub(crate) async fn get_json(&mut self, url: &str) -> Result<Fetch<Value>, Error> {
        match self.fetch(url, Some(StatusCode::OK)).await? {
            Fetch::Data(response) => Ok(Fetch::Data(response.json_value()?)),
            Fetch::Unavailable => Ok(Fetch::Unavailable),
        }
    }

    /// OCAPI URL builder shared by the endpoint modules.
    pub(crate) fn ocapi_url(&self, path: &str) -> String {
        self.environment.ocapi_url(path)
    }
}
