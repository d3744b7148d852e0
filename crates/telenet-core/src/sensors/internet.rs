// Internet derived sensors
//
// Usage percentage (with the squeeze override), the daily-usage
// series, modem identity, network topology, and Wi-Fi credentials/QR.
// The attribute assembly is pure so the squeeze and QR rules can be
// tested against fixture JSON without a server.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value, json};
use telenet_api::{BillCycleWindow, PortalClient};
use tracing::debug;

use crate::error::CoreError;
use crate::product::Product;
use crate::sensors::{SensorBatch, derived_sensor};
use crate::util::{json_path, normalize_ipv6, object_attributes, parse_number, round_to, scalar_string};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Display speeds forced when the usage allowance is exhausted.
const SQUEEZED_DOWNLOAD: &str = "1 Mbps";
const SQUEEZED_UPLOAD: &str = "256 Kbps";

/// Daily peak/off-peak/total/date series concatenated across cycles.
#[derive(Debug, Default)]
struct DailySeries {
    peak: Vec<Value>,
    off_peak: Vec<Value>,
    total: Vec<Value>,
    date: Vec<Value>,
}

impl DailySeries {
    fn push(&mut self, day: &Value) {
        self.peak.push(day.get("peak").cloned().unwrap_or(Value::Null));
        self.off_peak
            .push(day.get("offPeak").cloned().unwrap_or(Value::Null));
        self.total.push(day.get("total").cloned().unwrap_or(Value::Null));
        self.date.push(day.get("date").cloned().unwrap_or(Value::Null));
    }
}

pub(crate) async fn synthesize(
    client: &mut PortalClient,
    product: &Product,
    specs: Option<&Value>,
    language: &str,
    batch: &mut SensorBatch,
) -> Result<(), CoreError> {
    let identifier = &product.identifier;

    let Some(window) = client.bill_cycles("internet", identifier, 2).await?.data() else {
        debug!(identifier, "bill cycles unavailable, skipping internet sensors");
        return Ok(());
    };
    let Some(usage) = client
        .product_usage("internet", identifier, &window.start_date, &window.end_date)
        .await?
        .data()
    else {
        debug!(identifier, "usage unavailable, skipping internet sensors");
        return Ok(());
    };

    let mut series = DailySeries::default();
    let mut current_cycle = None;
    for cycle in &window.cycles {
        let Some(label) = cycle.bill_cycle.as_deref() else {
            continue;
        };
        let Some(daily) = client
            .product_daily_usage("internet", identifier, label, &cycle.start_date, &cycle.end_date)
            .await?
            .data()
        else {
            continue;
        };
        if let Some(days) = json_path(&daily, "internetUsage[0].dailyUsages").and_then(Value::as_array)
        {
            for day in days {
                series.push(day);
            }
        }
        if label == "CURRENT" {
            current_cycle = Some(daily);
        }
    }
    let Some(daily) = current_cycle else {
        debug!(identifier, "current-cycle daily usage unavailable, skipping internet sensors");
        return Ok(());
    };
    let Some(modem) = client.modems(identifier).await?.data() else {
        debug!(identifier, "modem unavailable, skipping internet sensors");
        return Ok(());
    };

    let now = chrono::Local::now().naive_local();
    let Some((usage_pct, attributes)) =
        usage_attributes(identifier, &usage, &window, &daily, specs, language, now)
    else {
        debug!(identifier, "usage payload incomplete, skipping internet sensors");
        return Ok(());
    };
    batch.push(derived_sensor(
        product,
        "usage",
        "usage_percentage",
        json!(usage_pct),
        attributes,
        false,
        None,
    ));

    let mut daily_attributes = object_attributes(
        json_path(&daily, "internetUsage[0].totalUsage").unwrap_or(&Value::Null),
    );
    daily_attributes.insert("daily_peak".to_owned(), Value::Array(series.peak));
    daily_attributes.insert("daily_off_peak".to_owned(), Value::Array(series.off_peak));
    daily_attributes.insert("daily_total".to_owned(), Value::Array(series.total));
    daily_attributes.insert("daily_date".to_owned(), Value::Array(series.date));
    batch.push(derived_sensor(
        product,
        "daily usage",
        "data_usage",
        json_path(&daily, "internetUsage[0].totalUsage.peak")
            .cloned()
            .unwrap_or(Value::Null),
        daily_attributes,
        false,
        None,
    ));

    batch.push(derived_sensor(
        product,
        "modem",
        "modem",
        modem.get("name").cloned().unwrap_or(Value::Null),
        object_attributes(&modem),
        false,
        None,
    ));

    let Some(mac) = modem.get("mac").and_then(Value::as_str).map(str::to_owned) else {
        debug!(identifier, "modem record has no mac, skipping network sensors");
        return Ok(());
    };

    if let Some(topology) = client.network_topology(&mac).await?.data() {
        let topology = normalize_ipv6(topology);
        batch.push(derived_sensor(
            product,
            "network",
            "network",
            topology.get("model").cloned().unwrap_or(Value::Null),
            object_attributes(&topology),
            false,
            None,
        ));
    }

    if let Some(settings) = client.wireless_settings(&mac, identifier).await?.data() {
        batch.push(derived_sensor(
            product,
            "wi-fi",
            "wifi",
            settings.get("wirelessEnabled").cloned().unwrap_or(Value::Null),
            object_attributes(&settings),
            false,
            None,
        ));
        if let Some(qr) = wifi_qr(&settings) {
            batch.push(derived_sensor(
                product,
                "wi-fi qr",
                "qr",
                json!(qr),
                Map::new(),
                false,
                None,
            ));
        }
    }
    Ok(())
}

/// Assemble the usage-percentage sensor's attribute bundle.
///
/// Returns `None` when the payload misses the fields the percentage is
/// computed from; the caller skips the product's internet sensors.
pub(crate) fn usage_attributes(
    identifier: &str,
    usage: &Value,
    window: &BillCycleWindow,
    daily: &Value,
    specs: Option<&Value>,
    language: &str,
    now: NaiveDateTime,
) -> Option<(f64, Map<String, Value>)> {
    let section = usage.get("internet")?;
    let total_units = json_path(section, "totalUsage.units").and_then(parse_number)?;
    let allocated_units = json_path(section, "allocatedUsage.units").and_then(parse_number)?;
    let extended_volume = json_path(section, "extendedUsage.volume")
        .and_then(parse_number)
        .unwrap_or(0.0);
    let denominator = allocated_units + extended_volume;
    if denominator <= 0.0 {
        return None;
    }
    let usage_pct = 100.0 * total_units / denominator;

    let start = NaiveDate::parse_from_str(&window.start_date, DATE_FORMAT).ok()?;
    let end = NaiveDate::parse_from_str(&window.end_date, DATE_FORMAT).ok()?;
    let period_length = end.signed_duration_since(start);
    let period_length_seconds = period_length.num_seconds();
    if period_length_seconds <= 0 {
        return None;
    }
    let period_used_seconds = now
        .signed_duration_since(start.and_hms_opt(0, 0, 0)?)
        .num_seconds();
    let period_used_percentage = round_to(
        100.0 * period_used_seconds as f64 / period_length_seconds as f64,
        1,
    );

    let units_of = |value_path: &str, unit_path: &str| -> String {
        format!(
            "{} {}",
            json_path(section, value_path).map(scalar_string).unwrap_or_default(),
            json_path(section, unit_path).map(scalar_string).unwrap_or_default(),
        )
    };

    let peak_used = json_path(section, "peakUsage.usedUnits")
        .and_then(parse_number)
        .unwrap_or(0.0);
    let off_peak = round_to(
        json_path(daily, "internetUsage[0].totalUsage.offPeak")
            .and_then(parse_number)
            .unwrap_or(0.0),
        1,
    );

    let mut attributes = Map::new();
    attributes.insert("identifier".to_owned(), json!(identifier));
    attributes.insert(
        "last_update".to_owned(),
        json_path(section, "totalUsage.lastUsageDate")
            .cloned()
            .unwrap_or(Value::Null),
    );
    attributes.insert("start_date".to_owned(), json!(window.start_date));
    attributes.insert("end_date".to_owned(), json!(window.end_date));
    attributes.insert(
        "days_until".to_owned(),
        section.get("daysUntil").cloned().unwrap_or(Value::Null),
    );
    attributes.insert(
        "total_usage".to_owned(),
        json!(units_of("totalUsage.units", "totalUsage.unitType")),
    );
    attributes.insert(
        "wifree_usage".to_owned(),
        json!(units_of("wifreeUsage.usedUnits", "wifreeUsage.unitType")),
    );
    attributes.insert(
        "allocated_usage".to_owned(),
        json!(units_of("allocatedUsage.units", "allocatedUsage.unitType")),
    );
    attributes.insert(
        "extended_usage".to_owned(),
        json!(units_of("extendedUsage.volume", "extendedUsage.unit")),
    );
    attributes.insert(
        "extended_usage_price".to_owned(),
        json!(units_of("extendedUsage.price", "extendedUsage.currency")),
    );
    attributes.insert("peak_usage".to_owned(), json!(peak_used));
    attributes.insert("offpeak_usage".to_owned(), json!(off_peak));
    attributes.insert("total_usage_with_offpeak".to_owned(), json!(peak_used + off_peak));
    attributes.insert("used_percentage".to_owned(), json!(round_to(usage_pct, 2)));
    attributes.insert("period_used_percentage".to_owned(), json!(period_used_percentage));
    attributes.insert(
        "period_remaining_percentage".to_owned(),
        json!(round_to(100.0 - period_used_percentage, 1)),
    );
    attributes.insert("squeezed".to_owned(), json!(usage_pct >= 100.0));
    attributes.insert("period_length".to_owned(), json!(period_length.num_days()));

    let mut service = String::new();
    if let Some(specs) = specs {
        if let Some(label) = crate::util::localized(language, specs.get("localizedcontent"))
            .and_then(|entry| entry.get("name"))
        {
            attributes.insert("product_label".to_owned(), label.clone());
        }
        if let Some(price) = json_path(specs, "characteristics.salespricevatincl") {
            attributes.insert(
                "sales_price".to_owned(),
                json!(format!(
                    "{} {}",
                    price.get("value").map(scalar_string).unwrap_or_default(),
                    price.get("unit").map(scalar_string).unwrap_or_default(),
                )),
            );
        }
        for services in specs
            .get("services")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            for specification in services
                .get("specifications")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default()
            {
                let speed = format!(
                    "{} {}",
                    specification.get("value").map(scalar_string).unwrap_or_default(),
                    specification.get("unit").map(scalar_string).unwrap_or_default(),
                );
                match specification.get("labelkey").and_then(Value::as_str) {
                    Some("spec.fixedinternet.speed.download") => {
                        attributes.insert("download_speed".to_owned(), json!(speed));
                    }
                    Some("spec.fixedinternet.speed.upload") => {
                        attributes.insert("upload_speed".to_owned(), json!(speed));
                    }
                    _ => {}
                }
                if specification.get("visible").and_then(Value::as_bool) == Some(true) {
                    if let Some(name) =
                        crate::util::localized(language, specification.get("localizedcontent"))
                            .and_then(|entry| entry.get("name"))
                    {
                        service.push_str(&scalar_string(name));
                    }
                    if let Some(value) = specification.get("value").filter(|v| !v.is_null()) {
                        service.push(' ');
                        service.push_str(&scalar_string(value));
                    }
                    if let Some(unit) = specification.get("unit").filter(|v| !v.is_null()) {
                        service.push(' ');
                        service.push_str(&scalar_string(unit));
                    }
                    service.push('\n');
                }
            }
        }
    }
    if usage_pct >= 100.0 {
        // Exhausted allowance: the portal throttles to fixed speeds
        // whatever the spec sheet advertises.
        attributes.insert("download_speed".to_owned(), json!(SQUEEZED_DOWNLOAD));
        attributes.insert("upload_speed".to_owned(), json!(SQUEEZED_UPLOAD));
    }
    attributes.insert("service".to_owned(), json!(service));

    Some((usage_pct, attributes))
}

/// Build the Wi-Fi QR payload, escaping colons in the network key.
/// No network key, no QR sensor.
pub(crate) fn wifi_qr(settings: &Value) -> Option<String> {
    let roaming = settings.get("singleSSIDRoamingSettings")?;
    let key = roaming.get("networkKey")?.as_str()?;
    let ssid = roaming
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let escaped = key.replace(':', "\\:");
    Some(format!("WIFI:S:{ssid};T:WPA;P:{escaped};;"))
}
