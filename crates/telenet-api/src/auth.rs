// Portal authentication
//
// The login handshake against the OpenID identity provider:
// state/nonce retrieval, redirect-based authorize step, credential
// POST, and the final user-details fetch that proves the session is
// real. The session cookie and the XSRF token land in the shared
// cookie jar; `PortalClient` mirrors the token into a header on every
// subsequent request.

use reqwest::StatusCode;
use secrecy::ExposeSecret;
use tracing::debug;
use url::Url;

use crate::client::{CONNECTION_RETRY, PortalClient};
use crate::error::Error;
use crate::models::UserDetails;

/// Claims requested from the identity provider alongside the code.
const OAUTH_CLAIMS: &str =
    r#"{"id_token":{"http://telenet.be/claims/roles":null,"http://telenet.be/claims/licenses":null}}"#;

impl PortalClient {
    /// Authenticate with the portal, or short-circuit if the session
    /// cookie is still valid.
    ///
    /// Sequence:
    /// 1. Probe `oauth/userdetails` raw. A 200 means the existing
    ///    session is alive; return the user record immediately.
    /// 2. A 401/403 carries a `state,nonce` pair in the body; anything
    ///    else is a protocol error. The pair is re-fetched up to a
    ///    bounded number of times.
    /// 3. Follow the authorize redirect chain; success is recognized
    ///    only by landing on the login page.
    /// 4. POST the credentials; a redirect to an authentication-error
    ///    URL means the credentials were rejected.
    /// 5. Re-fetch user details. A 200 without a customer number is a
    ///    degraded response the portal emits for unknown accounts, and
    ///    counts as bad credentials too.
    pub async fn login(&mut self) -> Result<UserDetails, Error> {
        debug!("starting login handshake");
        let userdetails_url = self.ocapi_url("oauth/userdetails");

        let mut tokens = None;
        for _ in 0..=CONNECTION_RETRY {
            let response = self.send_get(&userdetails_url).await?;
            match response.status {
                StatusCode::OK => {
                    // Existing session still valid.
                    let user: UserDetails = response.json()?;
                    self.set_user(user.clone());
                    debug!("session still valid, skipping login");
                    return Ok(user);
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    if let Some((state, nonce)) = response.body.split_once(',') {
                        if !state.is_empty() && !nonce.is_empty() {
                            tokens = Some((state.to_owned(), nonce.to_owned()));
                            break;
                        }
                    }
                }
                status => {
                    return Err(Error::Service {
                        message: format!("HTTP {status} while authenticating at {}", response.url),
                    });
                }
            }
        }
        let Some((state, nonce)) = tokens else {
            return Err(Error::Service {
                message: format!("state/nonce tokens not returned by {userdetails_url}"),
            });
        };

        self.authorize(&state, &nonce).await?;
        self.submit_credentials().await?;

        let response = self.send_get(&userdetails_url).await?;
        if response.status != StatusCode::OK {
            return Err(Error::Service {
                message: format!(
                    "HTTP {} fetching user details after login at {}",
                    response.status, response.url
                ),
            });
        }
        let user: UserDetails = response.json()?;
        if user.customer_number.is_none() {
            // Nominally successful, but the portal returns a degraded
            // 200 for accounts it does not recognize.
            return Err(Error::BadCredentials {
                message: format!("HTTP {} missing customer number", response.status),
            });
        }
        self.set_user(user.clone());
        debug!("login successful");
        Ok(user)
    }

    /// Submit the state/nonce pair to the authorize endpoint, following
    /// redirects. The only accepted outcome is landing on the login
    /// page with a 200.
    async fn authorize(&mut self, state: &str, nonce: &str) -> Result<(), Error> {
        let mut url = Url::parse(&self.environment().openid_url("oauth/authorize"))?;
        let language = self.language().to_owned();
        url.query_pairs_mut()
            .append_pair("client_id", "ocapi")
            .append_pair("response_type", "code")
            .append_pair("claims", OAUTH_CLAIMS)
            .append_pair("lang", &language)
            .append_pair("state", state)
            .append_pair("nonce", nonce)
            .append_pair("prompt", "login");

        let response = self.send_get(url.as_str()).await?;
        if response.status != StatusCode::OK || !response.url.as_str().contains("openid/login") {
            return Err(Error::Service {
                message: format!(
                    "authorize step did not land on the login page: HTTP {} at {}",
                    response.status, response.url
                ),
            });
        }
        Ok(())
    }

    /// POST the credential form. The identity provider answers 200 for
    /// both outcomes and signals rejection through the final URL.
    async fn submit_credentials(&mut self) -> Result<(), Error> {
        let login_url = self.environment().openid_url("login.do");
        let (username, password) = self.credentials();
        let form = [
            ("j_username", username),
            ("j_password", password.expose_secret().to_owned()),
            ("rememberme", "true".to_owned()),
        ];

        let response = self.send_form(&login_url, &form).await?;
        if response.status != StatusCode::OK {
            return Err(Error::Service {
                message: format!(
                    "HTTP {} from the login endpoint at {}",
                    response.status, response.url
                ),
            });
        }
        if response.url.as_str().contains("authentication_error") {
            return Err(Error::BadCredentials {
                message: response.body,
            });
        }
        Ok(())
    }
}
