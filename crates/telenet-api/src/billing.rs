// Billing-service endpoints
//
// Bill-cycle windows scope every usage query: internet asks for two
// cycles (current + previous, for the daily series), dtv for one.

use tracing::debug;

use crate::client::PortalClient;
use crate::error::Error;
use crate::models::{BillCycle, BillCycleWindow, Fetch};

impl PortalClient {
    /// Fetch the most recent bill cycles for a product.
    ///
    /// `GET public/api/billing-service/v1/account/products/{id}/billcycle-details?producttype=..&count=..`
    ///
    /// The window bounds come from the newest cycle; the full cycle
    /// list is carried along so internet can fetch per-cycle daily
    /// usage. An empty cycle list is reported as `Unavailable`.
    pub async fn bill_cycles(
        &mut self,
        product_type: &str,
        identifier: &str,
        count: u32,
    ) -> Result<Fetch<BillCycleWindow>, Error> {
        let url = self.ocapi_url(&format!(
            "public/api/billing-service/v1/account/products/{identifier}/billcycle-details?producttype={product_type}&count={count}"
        ));
        debug!(product_type, identifier, count, "fetching bill cycles");
        let body = match self.get_json(&url).await? {
            Fetch::Data(body) => body,
            Fetch::Unavailable => return Ok(Fetch::Unavailable),
        };

        let cycles: Vec<BillCycle> = match body.get("billCycles") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                Error::Deserialization {
                    message: e.to_string(),
                    body: raw.to_string(),
                }
            })?,
            None => Vec::new(),
        };
        let Some(newest) = cycles.first() else {
            debug!(identifier, "no bill cycles returned");
            return Ok(Fetch::Unavailable);
        };

        Ok(Fetch::Data(BillCycleWindow {
            start_date: newest.start_date.clone(),
            end_date: newest.end_date.clone(),
            cycles,
        }))
    }
}
