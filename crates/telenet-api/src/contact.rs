// Contact-service endpoints
//
// Address lookup, memoized per session: several products usually share
// one installation address and the record never changes mid-session.

use serde_json::Value;
use tracing::debug;

use crate::client::PortalClient;
use crate::error::Error;
use crate::models::Fetch;

impl PortalClient {
    /// Fetch a contact address by id, serving repeats from the session
    /// cache. A missing or empty id yields an empty record without a
    /// network call.
    ///
    /// `GET public/api/contact-service/v1/contact/addresses/{id}`
    pub async fn address(&mut self, address_id: Option<&str>) -> Result<Fetch<Value>, Error> {
        let Some(address_id) = address_id.filter(|id| !id.is_empty()) else {
            return Ok(Fetch::Data(Value::Object(serde_json::Map::new())));
        };
        if let Some(cached) = self.addresses.get(address_id) {
            return Ok(Fetch::Data(cached.clone()));
        }
        let url = self.ocapi_url(&format!(
            "public/api/contact-service/v1/contact/addresses/{address_id}"
        ));
        debug!(address_id, "fetching contact address");
        match self.get_json(&url).await? {
            Fetch::Data(address) => {
                self.addresses
                    .insert(address_id.to_owned(), address.clone());
                Ok(Fetch::Data(address))
            }
            Fetch::Unavailable => Ok(Fetch::Unavailable),
        }
    }
}
