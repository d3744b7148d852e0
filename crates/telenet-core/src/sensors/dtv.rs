// Dtv derived sensors
//
// One usage (rental/extras cost) sensor per dtv product, plus one
// sensor per attached set-top box. Device sensors are numbered so two
// boxes on the same line keep distinct keys.

use serde_json::{Map, Value, json};
use telenet_api::PortalClient;
use tracing::debug;

use crate::error::CoreError;
use crate::product::Product;
use crate::sensors::{SensorBatch, derived_sensor};
use crate::util::{json_path, merge_attributes, object_attributes, parse_number};

pub(crate) async fn synthesize(
    client: &mut PortalClient,
    product: &Product,
    type_attr: &Map<String, Value>,
    batch: &mut SensorBatch,
) -> Result<(), CoreError> {
    if product.ignore_extra_sensors {
        return Ok(());
    }
    let identifier = &product.identifier;

    let Some(window) = client.bill_cycles("dtv", identifier, 1).await?.data() else {
        debug!(identifier, "bill cycles unavailable, skipping dtv sensors");
        return Ok(());
    };
    let Some(usage) = client
        .product_usage("dtv", identifier, &window.start_date, &window.end_date)
        .await?
        .data()
    else {
        debug!(identifier, "usage unavailable, skipping dtv sensors");
        return Ok(());
    };
    let Some(devices) = client.device_details("dtv", identifier).await?.data() else {
        debug!(identifier, "device details unavailable, skipping dtv sensors");
        return Ok(());
    };

    let current = json_path(&usage, "dtv.totalUsage.currentUsage");
    batch.add_cost(current.and_then(parse_number).unwrap_or(0.0));

    let mut attributes = object_attributes(usage.get("dtv").unwrap_or(&Value::Null));
    merge_attributes(&mut attributes, type_attr.clone());
    batch.push(derived_sensor(
        product,
        "usage",
        "euro",
        current.and_then(parse_number).map_or(Value::Null, |n| json!(n)),
        attributes,
        false,
        None,
    ));

    if let Some(boxes) = devices.get("dtv").and_then(Value::as_array) {
        for (index, device) in boxes.iter().enumerate() {
            batch.push(derived_sensor(
                product,
                &format!("dtv device {}", index + 1),
                "dtv",
                device.get("boxName").cloned().unwrap_or(Value::Null),
                object_attributes(device),
                false,
                None,
            ));
        }
    }
    Ok(())
}
