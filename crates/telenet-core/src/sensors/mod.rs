// ── Derived-sensor synthesis ──
//
// For every discovered product, compute type-specific derived metrics
// and materialize them as additional synthetic product records. Each
// type module pairs pure attribute builders (unit-testable without
// HTTP) with an orchestrator that fans out to the usage/detail
// endpoints. Any unavailable upstream dataset skips the remaining
// sensors for that one product; it never aborts the pass.

pub(crate) mod dtv;
pub(crate) mod internet;
pub(crate) mod mobile;

use std::collections::HashSet;

use serde_json::{Map, Value, json};
use telenet_api::{Fetch, PortalClient};
use tracing::debug;

use crate::config::Language;
use crate::error::CoreError;
use crate::product::{Product, ProductType};
use crate::util::{localized, merge_attributes, object_attributes, parse_number};

/// Output of one synthesis pass: the new sensors plus the usage costs
/// they contribute to the account total.
#[derive(Debug, Default)]
pub(crate) struct SensorBatch {
    pub sensors: Vec<Product>,
    pub cost: f64,
    /// Bundles whose shared sensors were already emitted this pass,
    /// keyed by plan identifier.
    seen_bundles: HashSet<String>,
}

impl SensorBatch {
    pub(crate) fn push(&mut self, sensor: Product) {
        self.sensors.push(sensor);
    }

    pub(crate) fn add_cost(&mut self, amount: f64) {
        self.cost += amount;
    }

    /// Returns `true` the first time a bundle is seen.
    pub(crate) fn first_sight_of_bundle(&mut self, plan_identifier: &str) -> bool {
        self.seen_bundles.insert(plan_identifier.to_owned())
    }
}

/// Build one derived sensor record from its parent product.
///
/// With `use_plan_identifier` the sensor is keyed by the plan rather
/// than the line, which is how bundle-level sensors stay distinct from
/// the per-line ones.
pub(crate) fn derived_sensor(
    product: &Product,
    suffix: &str,
    description_key: &str,
    state: Value,
    attributes: Map<String, Value>,
    use_plan_identifier: bool,
    native_unit: Option<String>,
) -> Product {
    let identifier = if use_plan_identifier {
        &product.plan_identifier
    } else {
        &product.identifier
    };
    let key = Product::sensor_key(identifier, &product.product_type, suffix);
    Product {
        identifier: format!("{identifier} {suffix}"),
        plan_identifier: product.plan_identifier.clone(),
        plan_label: product.plan_label.clone(),
        product_type: product.product_type.clone(),
        key,
        description_key: description_key.to_owned(),
        name: format!("{identifier} {suffix}"),
        state,
        specurl: None,
        price: None,
        info: Value::Null,
        subscription_info: Value::Null,
        address: Value::Null,
        extra_attributes: attributes,
        native_unit,
        derived: true,
        ignore_extra_sensors: false,
    }
}

/// Run derived-sensor synthesis over every real product.
pub(crate) async fn synthesize(
    client: &mut PortalClient,
    language: Language,
    products: &[Product],
) -> Result<SensorBatch, CoreError> {
    let mut batch = SensorBatch::default();
    let language = language.to_string();

    for product in products {
        // Re-fetch the spec sheet for the localized type label; the
        // cached copy from discovery may predate a language change.
        let specs = match &product.specurl {
            Some(url) => match client.product_details(url).await {
                Ok(Fetch::Data(details)) => details.get("product").cloned(),
                Ok(Fetch::Unavailable) => None,
                Err(e) => {
                    debug!(identifier = %product.identifier, error = %e, "spec sheet fetch failed");
                    None
                }
            },
            None => None,
        };
        let mut type_attr = Map::new();
        if let Some(label) = specs
            .as_ref()
            .and_then(|s| localized(&language, s.get("localizedcontent")))
            .and_then(|entry| entry.get("name"))
        {
            type_attr.insert("product type".to_owned(), label.clone());
        }

        if let Some(price) = &product.price {
            if let Some(value) = price.get("value").and_then(parse_number) {
                batch.add_cost(value);
                let mut attributes = object_attributes(price);
                merge_attributes(&mut attributes, type_attr.clone());
                batch.push(derived_sensor(
                    product,
                    "price",
                    "euro",
                    json!(value),
                    attributes,
                    false,
                    None,
                ));
            }
        }

        match product.product_type {
            ProductType::Internet => {
                internet::synthesize(client, product, specs.as_ref(), &language, &mut batch)
                    .await?;
            }
            ProductType::Dtv => {
                dtv::synthesize(client, product, &type_attr, &mut batch).await?;
            }
            ProductType::Mobile => {
                mobile::synthesize(client, product, &type_attr, &mut batch).await?;
            }
            _ => {}
        }
    }
    Ok(batch)
}
