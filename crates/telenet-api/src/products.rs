// Product-service endpoints
//
// Discovery tree, per-type subscription records, spec sheets, usage and
// daily usage. Payloads are loosely typed: the product tree mixes
// internet, mobile, dtv, telephone, and bundle records whose field
// sets differ per type and per backend release.

use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::client::PortalClient;
use crate::error::Error;
use crate::models::Fetch;

impl PortalClient {
    /// Fetch the active-products tree.
    ///
    /// `GET public/api/product-service/v1/products?status=ACTIVE`
    ///
    /// Returns the top-level plan entries, each with nested `children`
    /// and per-child `options`.
    pub async fn active_products(&mut self) -> Result<Fetch<Vec<Value>>, Error> {
        let url = self.ocapi_url("public/api/product-service/v1/products?status=ACTIVE");
        debug!("fetching active products");
        self.get_json_list(&url).await
    }

    /// Fetch subscription ("plan") records for one product type.
    ///
    /// `GET public/api/product-service/v1/product-subscriptions?producttypes={TYPE}`
    ///
    /// The type is upper-cased into the query; `PLAN` fetches the
    /// billing-account-level record set.
    pub async fn product_subscriptions(
        &mut self,
        product_type: &str,
    ) -> Result<Fetch<Vec<Value>>, Error> {
        let url = self.ocapi_url(&format!(
            "public/api/product-service/v1/product-subscriptions?producttypes={}",
            product_type.to_uppercase()
        ));
        debug!(product_type, "fetching product subscriptions");
        self.get_json_list(&url).await
    }

    /// Fetch a product's specification sheet by its absolute URL (the
    /// `specurl` field handed out by the product tree).
    pub async fn product_details(&mut self, specurl: &str) -> Result<Fetch<Value>, Error> {
        self.get_json(specurl).await
    }

    /// Fetch usage totals for a product over a date window.
    ///
    /// `GET public/api/product-service/v1/products/{type}/{id}/usage?fromDate=..&toDate=..`
    pub async fn product_usage(
        &mut self,
        product_type: &str,
        identifier: &str,
        from_date: &str,
        to_date: &str,
    ) -> Result<Fetch<Value>, Error> {
        let url = self.ocapi_url(&format!(
            "public/api/product-service/v1/products/{product_type}/{identifier}/usage?fromDate={from_date}&toDate={to_date}"
        ));
        self.get_json(&url).await
    }

    /// Fetch per-day usage for one bill cycle.
    ///
    /// `GET public/api/product-service/v1/products/{type}/{id}/dailyusage?billcycle=..`
    ///
    /// A non-200 here means "no data recorded for that cycle", which is
    /// routine for freshly opened cycles -- reported as `Unavailable`,
    /// never as an error.
    pub async fn product_daily_usage(
        &mut self,
        product_type: &str,
        identifier: &str,
        bill_cycle: &str,
        from_date: &str,
        to_date: &str,
    ) -> Result<Fetch<Value>, Error> {
        let url = self.ocapi_url(&format!(
            "public/api/product-service/v1/products/{product_type}/{identifier}/dailyusage?billcycle={bill_cycle}&fromDate={from_date}&toDate={to_date}"
        ));
        match self.fetch(&url, None).await? {
            Fetch::Data(response) if response.status == StatusCode::OK => {
                Ok(Fetch::Data(response.json_value()?))
            }
            _ => Ok(Fetch::Unavailable),
        }
    }

    /// Fetch the devices attached to a product (dtv set-top boxes).
    ///
    /// `GET public/api/product-service/v1/products/{type}/{id}/devicedetails`
    pub async fn device_details(
        &mut self,
        product_type: &str,
        identifier: &str,
    ) -> Result<Fetch<Value>, Error> {
        let url = self.ocapi_url(&format!(
            "public/api/product-service/v1/products/{product_type}/{identifier}/devicedetails"
        ));
        self.get_json(&url).await
    }

    /// GET expecting 200 with a JSON array body.
    async fn get_json_list(&mut self, url: &str) -> Result<Fetch<Vec<Value>>, Error> {
        match self.get_json(url).await? {
            Fetch::Data(Value::Array(items)) => Ok(Fetch::Data(items)),
            Fetch::Data(other) => Err(Error::Deserialization {
                message: "expected a JSON array".to_owned(),
                body: other.to_string(),
            }),
            Fetch::Unavailable => Ok(Fetch::Unavailable),
        }
    }
}
