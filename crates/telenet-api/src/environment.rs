// Portal environment descriptors.
//
// All endpoint URLs are built from these two bases so tests (and any
// future acceptance environment) can point the client elsewhere.

use url::Url;

/// Immutable description of a Telenet deployment: the OCAPI gateway,
/// the OpenID identity provider, and the two header values the
/// identity provider insists on.
#[derive(Debug, Clone)]
pub struct Environment {
    /// OCAPI gateway base, e.g. `https://api.prd.telenet.be/ocapi`.
    pub ocapi: Url,
    /// OpenID provider base, e.g. `https://login.prd.telenet.be/openid`.
    pub openid: Url,
    /// `Referer` header value expected by the identity provider.
    pub referer: String,
    /// `X-Alt-Referer` header value expected by the identity provider.
    pub x_alt_referer: String,
}

impl Environment {
    /// The production environment.
    pub fn production() -> Self {
        Self {
            // Static literals -- parsing cannot fail.
            ocapi: Url::parse("https://api.prd.telenet.be/ocapi").expect("static URL"),
            openid: Url::parse("https://login.prd.telenet.be/openid").expect("static URL"),
            referer: "https://www2.telenet.be/residential/nl/mijn-telenet/".to_owned(),
            x_alt_referer: "https://www2.telenet.be/".to_owned(),
        }
    }

    /// Build an environment from raw base URLs (used by tests against a
    /// mock server).
    pub fn new(ocapi: &str, openid: &str) -> Result<Self, crate::Error> {
        Ok(Self {
            ocapi: Url::parse(ocapi)?,
            openid: Url::parse(openid)?,
            referer: "https://www2.telenet.be/residential/nl/mijn-telenet/".to_owned(),
            x_alt_referer: "https://www2.telenet.be/".to_owned(),
        })
    }

    /// Absolute URL for an OCAPI path (e.g. `public/api/product-service/v1/products`).
    pub(crate) fn ocapi_url(&self, path: &str) -> String {
        format!("{}/{}", self.ocapi.as_str().trim_end_matches('/'), path)
    }

    /// Absolute URL for an OpenID path (e.g. `login.do`).
    pub(crate) fn openid_url(&self, path: &str) -> String {
        format!("{}/{}", self.openid.as_str().trim_end_matches('/'), path)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::production()
    }
}
