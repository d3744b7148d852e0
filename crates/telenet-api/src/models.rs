// Portal response types.
//
// Most OCAPI payloads are heterogeneous and skew across backend
// releases, so endpoint wrappers return loosely-typed
// `serde_json::Value`. Only records with a stable shape (user details,
// bill-cycle windows) are modeled explicitly, with `#[serde(flatten)]`
// catch-alls for everything undocumented.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::Error;

// ── Soft failure ─────────────────────────────────────────────────────

/// Outcome of a portal fetch that may legitimately have no data.
///
/// `Unavailable` is the "soft failure" case: a 404, or a 403 carrying a
/// non-benign error code. Callers fetching optional datasets must treat
/// it as "skip this one sensor", never as a reason to abort a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch<T> {
    /// The endpoint returned the expected payload.
    Data(T),
    /// The dataset is unavailable for this account/product.
    Unavailable,
}

impl<T> Fetch<T> {
    /// Convert into an `Option`, discarding the unavailable marker.
    pub fn data(self) -> Option<T> {
        match self {
            Self::Data(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    /// Returns `true` for the soft-failure case.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// Map the payload, preserving the unavailable marker.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetch<U> {
        match self {
            Self::Data(v) => Fetch::Data(f(v)),
            Self::Unavailable => Fetch::Unavailable,
        }
    }
}

// ── Response snapshot ────────────────────────────────────────────────

/// Owned snapshot of a portal response.
///
/// `reqwest::Response` consumes itself on read, but the dispatcher
/// needs to inspect status, final URL, and body several times (token
/// extraction, error classification, logging), so every response is
/// drained into this struct at the transport boundary.
#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub status: reqwest::StatusCode,
    /// Final URL after any redirects -- the login flow branches on it.
    pub url: Url,
    pub body: String,
}

impl PortalResponse {
    /// Deserialize the body as `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_str(&self.body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: self.body.clone(),
        })
    }

    /// Deserialize the body as untyped JSON.
    pub fn json_value(&self) -> Result<Value, Error> {
        self.json::<Value>()
    }
}

// ── User details ─────────────────────────────────────────────────────

/// Authenticated-user record from `oauth/userdetails`.
///
/// The portal can return a nominally successful 200 without a customer
/// number; the login flow treats that as bad credentials, which is why
/// `customer_number` is optional here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetails {
    #[serde(default)]
    pub customer_number: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub identity_id: Option<String>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

// ── Bill cycles ──────────────────────────────────────────────────────

/// One billing-period window from `billcycle-details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillCycle {
    #[serde(rename = "billCycle", default)]
    pub bill_cycle: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The bill-cycle window used to scope usage queries: bounds of the
/// newest cycle plus every cycle that was requested.
#[derive(Debug, Clone)]
pub struct BillCycleWindow {
    pub start_date: String,
    pub end_date: String,
    pub cycles: Vec<BillCycle>,
}
