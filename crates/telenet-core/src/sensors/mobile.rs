// Mobile derived sensors
//
// Three shapes of subscription. A line inside a shared bundle gets
// bundle-level pooled sensors (emitted once per bundle, keyed by the
// plan) plus its own per-line share. A standalone subscription gets
// out-of-bundle cost and its data/SMS/voice buckets, with fully-zero
// buckets suppressed.

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value, json};
use telenet_api::PortalClient;
use tracing::debug;

use crate::error::CoreError;
use crate::product::Product;
use crate::sensors::{SensorBatch, derived_sensor};
use crate::util::{
    format_duration, json_path, merge_attributes, object_attributes, parse_number, scalar_string,
};

const BILLING_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

pub(crate) async fn synthesize(
    client: &mut PortalClient,
    product: &Product,
    type_attr: &Map<String, Value>,
    batch: &mut SensorBatch,
) -> Result<(), CoreError> {
    let now = chrono::Local::now().naive_local();
    if product.is_bundle_line() {
        synthesize_bundle_line(client, product, type_attr, batch, now).await
    } else {
        synthesize_standalone(client, product, type_attr, batch, now).await
    }
}

async fn synthesize_bundle_line(
    client: &mut PortalClient,
    product: &Product,
    type_attr: &Map<String, Value>,
    batch: &mut SensorBatch,
    now: NaiveDateTime,
) -> Result<(), CoreError> {
    let identifier = &product.identifier;
    let plan = &product.plan_identifier;

    let Some(usage) = client
        .mobile_bundle_usage(plan, Some(identifier.as_str()))
        .await?
        .data()
    else {
        debug!(identifier, "line usage unavailable, skipping mobile sensors");
        return Ok(());
    };
    let Some(cycle_attr) = billing_cycle_attributes(&usage, now) else {
        debug!(identifier, "usage carries no next billing date, skipping mobile sensors");
        return Ok(());
    };
    let Some(bundle_usage) = client.mobile_bundle_usage(plan, None).await?.data() else {
        debug!(plan, "bundle usage unavailable, skipping mobile sensors");
        return Ok(());
    };

    if batch.first_sight_of_bundle(plan) {
        batch.add_cost(
            json_path(&bundle_usage, "outOfBundle.usedUnits")
                .and_then(parse_number)
                .unwrap_or(0.0),
        );
        let mut attributes =
            object_attributes(bundle_usage.get("outOfBundle").unwrap_or(&Value::Null));
        merge_attributes(&mut attributes, cycle_attr.clone());
        merge_attributes(&mut attributes, type_attr.clone());
        batch.push(derived_sensor(
            product,
            "out of bundle",
            "euro",
            json_path(&bundle_usage, "outOfBundle.usedUnits")
                .and_then(parse_number)
                .map_or(Value::Null, |n| json!(n)),
            attributes,
            true,
            None,
        ));

        for bucket in buckets(&bundle_usage, "shared.data") {
            let suffix = bucket
                .get("bucketType")
                .map(scalar_string)
                .unwrap_or_default();
            let mut attributes = object_attributes(bucket);
            attributes.insert(
                "usage".to_owned(),
                json!(format!(
                    "{}/{} {}",
                    bucket.get("usedUnits").map(scalar_string).unwrap_or_default(),
                    bucket.get("startUnits").map(scalar_string).unwrap_or_default(),
                    bucket.get("unitType").map(scalar_string).unwrap_or_default(),
                )),
            );
            merge_attributes(&mut attributes, cycle_attr.clone());
            batch.push(derived_sensor(
                product,
                &suffix,
                "usage_percentage_mobile",
                bucket.get("usedPercentage").cloned().unwrap_or(Value::Null),
                attributes,
                true,
                None,
            ));
        }
        for bucket in buckets(&bundle_usage, "shared.text") {
            let mut attributes = object_attributes(bucket);
            attributes.insert(
                "usage".to_owned(),
                json!(format!(
                    "{} SMSes",
                    bucket.get("usedUnits").map(scalar_string).unwrap_or_default()
                )),
            );
            batch.push(derived_sensor(
                product,
                "sms",
                "mobile_sms",
                bucket.get("usedUnits").cloned().unwrap_or(Value::Null),
                attributes,
                true,
                None,
            ));
        }
        for bucket in buckets(&bundle_usage, "shared.voice") {
            let duration = bucket_duration(bucket);
            let mut attributes = object_attributes(bucket);
            attributes.insert("usage".to_owned(), json!(duration));
            merge_attributes(&mut attributes, cycle_attr.clone());
            batch.push(derived_sensor(
                product,
                "voice",
                "mobile_voice",
                json!(duration),
                attributes,
                true,
                None,
            ));
        }
    }

    // Per-line share of the bundle.
    batch.add_cost(
        json_path(&usage, "outOfBundle.usedUnits")
            .and_then(parse_number)
            .unwrap_or(0.0),
    );
    let mut attributes = object_attributes(usage.get("outOfBundle").unwrap_or(&Value::Null));
    merge_attributes(&mut attributes, cycle_attr.clone());
    merge_attributes(&mut attributes, type_attr.clone());
    batch.push(derived_sensor(
        product,
        "out of bundle",
        "euro",
        json_path(&usage, "outOfBundle.usedUnits")
            .and_then(parse_number)
            .map_or(Value::Null, |n| json!(n)),
        attributes,
        false,
        None,
    ));

    for bucket in buckets(&usage, "shared.data") {
        let suffix = bucket_name(bucket);
        let unit = bucket.get("unitType").map(scalar_string);
        let mut attributes = object_attributes(bucket);
        attributes.insert(
            "usage".to_owned(),
            json!(format!(
                "{} {}",
                bucket.get("usedUnits").map(scalar_string).unwrap_or_default(),
                unit.clone().unwrap_or_default(),
            )),
        );
        merge_attributes(&mut attributes, cycle_attr.clone());
        batch.push(derived_sensor(
            product,
            &suffix,
            "mobile_data",
            bucket
                .get("usedUnits")
                .and_then(parse_number)
                .map_or(Value::Null, |n| json!(n)),
            attributes,
            false,
            unit,
        ));
    }
    for bucket in buckets(&usage, "shared.text") {
        let suffix = bucket_name(bucket).replace("text", "sms");
        let mut attributes = object_attributes(bucket);
        attributes.insert(
            "usage".to_owned(),
            json!(format!(
                "{} SMSes",
                bucket.get("usedUnits").map(scalar_string).unwrap_or_default()
            )),
        );
        merge_attributes(&mut attributes, cycle_attr.clone());
        batch.push(derived_sensor(
            product,
            &suffix,
            "mobile_sms",
            bucket.get("usedUnits").cloned().unwrap_or(Value::Null),
            attributes,
            false,
            None,
        ));
    }
    for bucket in buckets(&usage, "shared.voice") {
        let suffix = bucket_name(bucket);
        let duration = bucket_duration(bucket);
        let mut attributes = object_attributes(bucket);
        attributes.insert("usage".to_owned(), json!(duration));
        merge_attributes(&mut attributes, cycle_attr.clone());
        batch.push(derived_sensor(
            product,
            &suffix,
            "mobile_voice",
            json!(duration),
            attributes,
            false,
            None,
        ));
    }
    Ok(())
}

async fn synthesize_standalone(
    client: &mut PortalClient,
    product: &Product,
    type_attr: &Map<String, Value>,
    batch: &mut SensorBatch,
    now: NaiveDateTime,
) -> Result<(), CoreError> {
    let identifier = &product.identifier;

    let Some(usage) = client.mobile_usage(identifier).await?.data() else {
        debug!(identifier, "usage unavailable, skipping mobile sensors");
        return Ok(());
    };
    let Some(cycle_attr) = billing_cycle_attributes(&usage, now) else {
        debug!(identifier, "usage carries no next billing date, skipping mobile sensors");
        return Ok(());
    };

    batch.add_cost(
        json_path(&usage, "outOfBundle.usedUnits")
            .and_then(parse_number)
            .unwrap_or(0.0),
    );
    let mut attributes = object_attributes(usage.get("outOfBundle").unwrap_or(&Value::Null));
    merge_attributes(&mut attributes, cycle_attr.clone());
    merge_attributes(&mut attributes, type_attr.clone());
    batch.push(derived_sensor(
        product,
        "out of bundle",
        "euro",
        json_path(&usage, "outOfBundle.usedUnits")
            .and_then(parse_number)
            .map_or(Value::Null, |n| json!(n)),
        attributes,
        true,
        None,
    ));

    if let Some(bucket) = usage.get("total").and_then(|t| t.get("data")) {
        if !bucket_is_empty(bucket) {
            let unit = bucket.get("unitType").map(scalar_string);
            let mut attributes = object_attributes(bucket);
            attributes.insert(
                "usage".to_owned(),
                json!(format!(
                    "{} {}",
                    bucket.get("usedUnits").map(scalar_string).unwrap_or_default(),
                    unit.clone().unwrap_or_default(),
                )),
            );
            merge_attributes(&mut attributes, cycle_attr.clone());
            batch.push(derived_sensor(
                product,
                "data",
                "mobile_data",
                bucket
                    .get("usedUnits")
                    .and_then(parse_number)
                    .map_or(Value::Null, |n| json!(n)),
                attributes,
                false,
                unit,
            ));
        }
    }
    if let Some(bucket) = usage.get("total").and_then(|t| t.get("text")) {
        if !bucket_is_empty(bucket) {
            let mut attributes = object_attributes(bucket);
            attributes.insert(
                "usage".to_owned(),
                json!(format!(
                    "{} / {} SMSes",
                    bucket.get("usedUnits").map(scalar_string).unwrap_or_default(),
                    bucket.get("startUnits").map(scalar_string).unwrap_or_default(),
                )),
            );
            merge_attributes(&mut attributes, cycle_attr.clone());
            batch.push(derived_sensor(
                product,
                "sms",
                "mobile_sms",
                bucket.get("usedUnits").cloned().unwrap_or(Value::Null),
                attributes,
                false,
                None,
            ));
        }
    }
    if let Some(bucket) = usage.get("total").and_then(|t| t.get("voice")) {
        if !bucket_is_empty(bucket) {
            let duration = bucket_duration(bucket);
            let mut attributes = object_attributes(bucket);
            attributes.insert(
                "usage".to_owned(),
                json!(format!(
                    "{} / {} {}",
                    bucket.get("usedUnits").map(scalar_string).unwrap_or_default(),
                    bucket.get("startUnits").map(scalar_string).unwrap_or_default(),
                    bucket
                        .get("unitType")
                        .map(scalar_string)
                        .unwrap_or_default()
                        .to_lowercase(),
                )),
            );
            merge_attributes(&mut attributes, cycle_attr.clone());
            batch.push(derived_sensor(
                product,
                "voice",
                "mobile_voice",
                json!(duration),
                attributes,
                false,
                None,
            ));
        }
    }
    Ok(())
}

fn buckets<'a>(usage: &'a Value, path: &str) -> impl Iterator<Item = &'a Value> {
    json_path(usage, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
}

fn bucket_name(bucket: &Value) -> String {
    bucket
        .get("name")
        .map(scalar_string)
        .unwrap_or_default()
        .to_lowercase()
}

fn bucket_duration(bucket: &Value) -> String {
    format_duration(
        bucket.get("usedUnits").and_then(parse_number).unwrap_or(0.0),
        &bucket.get("unitType").map(scalar_string).unwrap_or_default(),
    )
}

/// A bucket with zero start, remaining, and used units carries no
/// information and is not worth a sensor.
fn bucket_is_empty(bucket: &Value) -> bool {
    !["startUnits", "remainingUnits", "usedUnits"]
        .iter()
        .any(|field| {
            bucket
                .get(*field)
                .and_then(parse_number)
                .unwrap_or(0.0)
                > 0.0
        })
}

/// Days-until and raw next-billing-date attributes shared by every
/// mobile sensor. `None` when the usage record lacks the date.
fn billing_cycle_attributes(usage: &Value, now: NaiveDateTime) -> Option<Map<String, Value>> {
    let raw = usage.get("nextBillingDate")?.as_str()?;
    let next = DateTime::parse_from_str(raw, BILLING_DATE_FORMAT).ok()?;
    let days_until = next.naive_local().signed_duration_since(now).num_days();
    let mut attributes = Map::new();
    attributes.insert("days_until".to_owned(), json!(days_until));
    attributes.insert("next_billing_date".to_owned(), json!(raw));
    Some(attributes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use secrecy::SecretString;
    use serde_json::json;
    use telenet_api::Environment;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::product::ProductType;

    fn noon(date: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn billing_cycle_attributes_computes_days_until() {
        let usage = json!({ "nextBillingDate": "2024-03-20T00:00:00.0+01:00" });
        let attrs = billing_cycle_attributes(&usage, noon("2024-03-10")).unwrap();
        assert_eq!(attrs["days_until"], json!(9));
        assert_eq!(attrs["next_billing_date"], json!("2024-03-20T00:00:00.0+01:00"));
    }

    #[test]
    fn billing_cycle_attributes_requires_the_date() {
        assert!(billing_cycle_attributes(&json!({}), noon("2024-03-10")).is_none());
        assert!(
            billing_cycle_attributes(&json!({ "nextBillingDate": "not-a-date" }), noon("2024-03-10"))
                .is_none()
        );
    }

    #[test]
    fn empty_buckets_are_suppressed() {
        assert!(bucket_is_empty(&json!({
            "startUnits": 0, "remainingUnits": "0", "usedUnits": 0.0
        })));
        assert!(bucket_is_empty(&json!({})));
        assert!(!bucket_is_empty(&json!({
            "startUnits": 100, "remainingUnits": 40, "usedUnits": 60
        })));
    }

    #[test]
    fn voice_buckets_render_as_durations() {
        let bucket = json!({ "usedUnits": 125, "unitType": "MIN" });
        assert_eq!(bucket_duration(&bucket), "2h 5m");
        let seconds = json!({ "usedUnits": 3725, "unitType": "Seconds" });
        assert_eq!(bucket_duration(&seconds), "1h 2m 5s");
    }

    #[tokio::test]
    async fn standalone_bucket_sensors_are_keyed_by_the_line() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/ocapi/public/api/mobile-service/v3/mobilesubscriptions/0468000001/usages",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nextBillingDate": "2099-01-15T00:00:00.0+01:00",
                "outOfBundle": { "usedUnits": "1,0", "currency": "EUR" },
                "total": {
                    "data": { "startUnits": 10, "usedUnits": 2, "remainingUnits": 8, "unitType": "GB" },
                    "text": { "startUnits": 100, "usedUnits": 5, "remainingUnits": 95 },
                    "voice": { "startUnits": 100, "usedUnits": 30, "remainingUnits": 70, "unitType": "MIN" }
                }
            })))
            .mount(&server)
            .await;
        let environment = Environment::new(
            &format!("{}/ocapi", server.uri()),
            &format!("{}/openid", server.uri()),
        )
        .unwrap();
        let password: SecretString = "test-password".to_string().into();
        let mut client =
            PortalClient::new("jan@example.com", password, "nl", environment).unwrap();

        // The plan record differs from the line itself; only the
        // out-of-bundle sensor follows the plan.
        let line = Product {
            identifier: "0468000001".to_owned(),
            plan_identifier: "PLAN-9".to_owned(),
            plan_label: "Mobile plan".to_owned(),
            product_type: ProductType::Mobile,
            key: Product::product_key("0468000001", &ProductType::Mobile),
            description_key: "mobile".to_owned(),
            name: "Mobile line".to_owned(),
            state: Value::Null,
            specurl: None,
            price: None,
            info: Value::Null,
            subscription_info: Value::Null,
            address: Value::Null,
            extra_attributes: Map::new(),
            native_unit: None,
            derived: false,
            ignore_extra_sensors: false,
        };
        let mut batch = SensorBatch::default();
        synthesize_standalone(&mut client, &line, &Map::new(), &mut batch, noon("2024-03-10"))
            .await
            .unwrap();

        let keys: Vec<&str> = batch.sensors.iter().map(|s| s.key.as_str()).collect();
        assert!(keys.contains(&"plan_9_mobile_out_of_bundle"), "keys: {keys:?}");
        assert!(keys.contains(&"0468000001_mobile_data"), "keys: {keys:?}");
        assert!(keys.contains(&"0468000001_mobile_sms"), "keys: {keys:?}");
        assert!(keys.contains(&"0468000001_mobile_voice"), "keys: {keys:?}");
    }
}
