// ── Format and JSON helpers ──
//
// Small pure functions shared by the catalog and sensor synthesis:
// nested-JSON access, locale-safe number parsing, duration and key
// formatting, IPv6 canonicalization, localized-content selection.

use std::net::Ipv6Addr;

use serde_json::{Map, Value};

/// Read a nested value out of an untyped JSON tree given a dotted and
/// indexed path such as `internetUsage[0].totalUsage.offPeak`.
///
/// Returns `None` on any missing segment, wrong-typed node, or
/// out-of-range index.
pub fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        let (name, rest) = match segment.find('[') {
            Some(pos) => segment.split_at(pos),
            None => (segment, ""),
        };
        if !name.is_empty() {
            current = current.get(name)?;
        }
        let mut rest = rest;
        while let Some(stripped) = rest.strip_prefix('[') {
            let (index, tail) = stripped.split_once(']')?;
            let index: usize = index.parse().ok()?;
            current = current.get(index)?;
            rest = tail;
        }
    }
    Some(current)
}

/// Parse a number out of a JSON scalar, accepting both `12.5` and the
/// locale-formatted `"12,5"` the portal mixes in.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number_str(s),
        _ => None,
    }
}

/// Locale-safe `f64` parse: a comma decimal separator is accepted.
pub fn parse_number_str(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse().ok()
}

/// Render a raw unit-typed counter as a human time string.
///
/// The same unit type always renders identically: minute-based units
/// as `"Hh Mm"`, second-based units as `"Hh Mm Ss"`.
pub fn format_duration(units: f64, unit_type: &str) -> String {
    let unit = unit_type.trim().to_lowercase();
    let total_seconds = if unit.starts_with("sec") {
        units
    } else if unit.starts_with("uur") || unit.starts_with("hour") {
        units * 3600.0
    } else {
        // Voice buckets default to minutes.
        units * 60.0
    };
    let total_seconds = total_seconds.max(0.0).round() as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if unit.starts_with("sec") {
        format!("{hours}h {minutes}m {seconds}s")
    } else {
        format!("{hours}h {minutes}m")
    }
}

/// Recursively rewrite every string in a JSON tree that parses as an
/// IPv6 address into its canonical compressed form.
pub fn normalize_ipv6(value: Value) -> Value {
    match value {
        Value::String(s) => match s.parse::<Ipv6Addr>() {
            Ok(addr) => Value::String(addr.to_string()),
            Err(_) => Value::String(s),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_ipv6).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_ipv6(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Select the localized entry matching `language` from a list of
/// per-language records, falling back to the first entry.
pub fn localized<'a>(language: &str, content: Option<&'a Value>) -> Option<&'a Value> {
    let entries = content?.as_array()?;
    entries
        .iter()
        .find(|entry| {
            entry
                .get("locale")
                .and_then(Value::as_str)
                .is_some_and(|locale| locale.eq_ignore_ascii_case(language))
        })
        .or_else(|| entries.first())
}

/// Generate a stable entity key from a display name: lowercase, runs
/// of non-alphanumerics collapsed to a single underscore.
pub fn entity_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut last_underscore = true;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c);
            last_underscore = false;
        } else if !last_underscore {
            key.push('_');
            last_underscore = true;
        }
    }
    while key.ends_with('_') {
        key.pop();
    }
    key
}

/// Round to a fixed number of decimal places (display values only).
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Render a JSON scalar for display: strings unquoted, null empty,
/// numbers and booleans via their JSON form.
pub fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Clone a JSON object's entries into an attribute map; anything that
/// is not an object yields an empty map.
pub fn object_attributes(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

/// Merge `from` into `into`, later values overwriting earlier ones.
pub fn merge_attributes(into: &mut Map<String, Value>, from: Map<String, Value>) {
    for (key, value) in from {
        into.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_path_walks_objects_arrays_and_indexes() {
        let tree = json!({
            "internetUsage": [
                { "totalUsage": { "offPeak": 12.5, "peak": 80 } }
            ]
        });
        assert_eq!(
            json_path(&tree, "internetUsage[0].totalUsage.offPeak"),
            Some(&json!(12.5))
        );
        assert_eq!(
            json_path(&tree, "internetUsage[0].totalUsage.peak"),
            Some(&json!(80))
        );
    }

    #[test]
    fn json_path_missing_segment_is_none() {
        let tree = json!({ "a": [ { "b": 1 } ] });
        assert_eq!(json_path(&tree, "a[0].c"), None);
        assert_eq!(json_path(&tree, "a[1].b"), None);
        assert_eq!(json_path(&tree, "x.b"), None);
        assert_eq!(json_path(&tree, "a[zz]"), None);
    }

    #[test]
    fn parse_number_accepts_comma_decimals() {
        assert_eq!(parse_number(&json!("12,5")), Some(12.5));
        assert_eq!(parse_number(&json!("7.25")), Some(7.25));
        assert_eq!(parse_number(&json!(42)), Some(42.0));
        assert_eq!(parse_number(&json!(" 3,0 ")), Some(3.0));
        assert_eq!(parse_number(&json!(null)), None);
        assert_eq!(parse_number(&json!("abc")), None);
    }

    #[test]
    fn format_duration_minutes_and_seconds() {
        assert_eq!(format_duration(125.0, "MIN"), "2h 5m");
        assert_eq!(format_duration(125.0, "minutes"), "2h 5m");
        assert_eq!(format_duration(3725.0, "SECONDS"), "1h 2m 5s");
        assert_eq!(format_duration(0.0, "MIN"), "0h 0m");
        // Same unit type always renders identically.
        assert_eq!(format_duration(90.0, "MIN"), format_duration(90.0, "min"));
    }

    #[test]
    fn normalize_ipv6_compresses_addresses_in_place() {
        let tree = json!({
            "ipv6": "2a02:1800:0000:0000:0000:0000:0000:0001",
            "clients": [ { "addr": "2A02:1800:0:0:0:0:0:2" } ],
            "name": "modem",
            "count": 3
        });
        let cleaned = normalize_ipv6(tree);
        assert_eq!(cleaned["ipv6"], json!("2a02:1800::1"));
        assert_eq!(cleaned["clients"][0]["addr"], json!("2a02:1800::2"));
        assert_eq!(cleaned["name"], json!("modem"));
        assert_eq!(cleaned["count"], json!(3));
    }

    #[test]
    fn localized_prefers_exact_locale_then_first() {
        let content = json!([
            { "locale": "nl", "name": "Internetproduct" },
            { "locale": "fr", "name": "Produit internet" },
        ]);
        assert_eq!(
            localized("fr", Some(&content)).and_then(|e| e.get("name")),
            Some(&json!("Produit internet"))
        );
        assert_eq!(
            localized("de", Some(&content)).and_then(|e| e.get("name")),
            Some(&json!("Internetproduct"))
        );
        assert_eq!(localized("nl", None), None);
    }

    #[test]
    fn entity_key_slugs_stably() {
        assert_eq!(entity_key("12345 internet product"), "12345_internet_product");
        assert_eq!(entity_key("ID-9  Wi-Fi qr"), "id_9_wi_fi_qr");
        assert_eq!(entity_key("trailing junk!!"), "trailing_junk");
    }

    #[test]
    fn round_to_fixed_digits() {
        assert!((round_to(12.3456, 2) - 12.35).abs() < f64::EPSILON);
        assert!((round_to(99.96, 1) - 100.0).abs() < f64::EPSILON);
    }
}
