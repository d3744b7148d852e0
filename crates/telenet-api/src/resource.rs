// Resource-service endpoints
//
// Modem identity, the network topology hanging off it, and wireless
// settings. The wireless endpoint 500s for modems without managed
// Wi-Fi, so that one is fetched without an expected status and any
// non-200 is a soft failure.

use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::client::PortalClient;
use crate::error::Error;
use crate::models::Fetch;

impl PortalClient {
    /// Fetch the modem bound to an internet product.
    ///
    /// `GET public/api/resource-service/v1/modems?productIdentifier={id}`
    pub async fn modems(&mut self, product_identifier: &str) -> Result<Fetch<Value>, Error> {
        let url = self.ocapi_url(&format!(
            "public/api/resource-service/v1/modems?productIdentifier={product_identifier}"
        ));
        debug!(product_identifier, "fetching modem");
        self.get_json(&url).await
    }

    /// Fetch the network topology behind a modem, clients included.
    ///
    /// `GET public/api/resource-service/v1/network-topology/{mac}?withClients=true`
    pub async fn network_topology(&mut self, mac: &str) -> Result<Fetch<Value>, Error> {
        let url = self.ocapi_url(&format!(
            "public/api/resource-service/v1/network-topology/{mac}?withClients=true"
        ));
        debug!(mac, "fetching network topology");
        self.get_json(&url).await
    }

    /// Fetch the wireless settings for a modem.
    ///
    /// `GET public/api/resource-service/v1/modems/{mac}/wireless-settings?..`
    pub async fn wireless_settings(
        &mut self,
        mac: &str,
        product_identifier: &str,
    ) -> Result<Fetch<Value>, Error> {
        let url = self.ocapi_url(&format!(
            "public/api/resource-service/v1/modems/{mac}/wireless-settings?withmetadata=true&withwirelessservice=true&productidentifier={product_identifier}"
        ));
        debug!(mac, product_identifier, "fetching wireless settings");
        match self.fetch(&url, None).await? {
            Fetch::Data(response) if response.status == StatusCode::OK => {
                Ok(Fetch::Data(response.json_value()?))
            }
            _ => Ok(Fetch::Unavailable),
        }
    }
}
