// Mobile-service endpoints
//
// Line-level and bundle-level usage. Bundles pool data/SMS/voice
// across lines; the same endpoint serves both views depending on the
// `type=bundle` / `lineIdentifier` query parameters.

use serde_json::Value;
use tracing::debug;

use crate::client::PortalClient;
use crate::error::Error;
use crate::models::Fetch;

impl PortalClient {
    /// Fetch usage for a standalone mobile subscription.
    ///
    /// `GET public/api/mobile-service/v3/mobilesubscriptions/{id}/usages`
    pub async fn mobile_usage(&mut self, identifier: &str) -> Result<Fetch<Value>, Error> {
        let url = self.ocapi_url(&format!(
            "public/api/mobile-service/v3/mobilesubscriptions/{identifier}/usages"
        ));
        debug!(identifier, "fetching mobile usage");
        self.get_json(&url).await
    }

    /// Fetch bundle usage: the pooled view when `line_identifier` is
    /// `None`, one line's share of the bundle otherwise.
    ///
    /// `GET public/api/mobile-service/v3/mobilesubscriptions/{bundle}/usages?type=bundle[&lineIdentifier=..]`
    pub async fn mobile_bundle_usage(
        &mut self,
        bundle_identifier: &str,
        line_identifier: Option<&str>,
    ) -> Result<Fetch<Value>, Error> {
        let url = match line_identifier {
            Some(line) => self.ocapi_url(&format!(
                "public/api/mobile-service/v3/mobilesubscriptions/{bundle_identifier}/usages?type=bundle&lineIdentifier={line}"
            )),
            None => self.ocapi_url(&format!(
                "public/api/mobile-service/v3/mobilesubscriptions/{bundle_identifier}/usages?type=bundle"
            )),
        };
        debug!(bundle_identifier, ?line_identifier, "fetching bundle usage");
        self.get_json(&url).await
    }
}
