// ── Extra-attribute projection ──
//
// A static whitelist per product type replaces the original's
// reflection-style attribute enumeration: each type tag maps to a
// fixed set of allowed subscription-record field names.

use serde_json::Value;

use crate::product::{Product, ProductType};

/// Fields every product type may project from its subscription record.
const BASE_ATTRIBUTES: &[&str] = &[
    "activationDate",
    "identifier",
    "label",
    "status",
    "productType",
    "specurl",
];

/// Type-specific additions on top of [`BASE_ATTRIBUTES`].
fn type_attributes(product_type: &ProductType) -> &'static [&'static str] {
    match product_type {
        ProductType::Internet => &["internetType"],
        ProductType::Mobile => &[
            "isDataOnlyPlan",
            "bundleIdentifier",
            "hasVoiceMail",
            "bundleType",
        ],
        ProductType::Dtv => &["bundleIdentifier", "isInteractive", "lineType"],
        ProductType::Telephone => &["hasVoiceMail"],
        ProductType::Bundle => &["products", "bundleFamily", "hasActiveMyBill"],
        _ => &[],
    }
}

/// All attribute names allowed for a product type.
pub fn allowed_attributes(product_type: &ProductType) -> impl Iterator<Item = &'static str> {
    BASE_ATTRIBUTES
        .iter()
        .chain(type_attributes(product_type))
        .copied()
}

/// Copy the whitelisted fields present in `source` into the product's
/// attribute map. Existing attributes are never replaced: derived
/// computations set during sensor synthesis win over raw record
/// fields.
pub fn project(product: &mut Product, source: &Value) {
    for key in allowed_attributes(&product.product_type) {
        if let Some(value) = source.get(key) {
            product
                .extra_attributes
                .entry(key.to_owned())
                .or_insert_with(|| value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::product::ProductType;

    fn product(product_type: ProductType) -> Product {
        Product {
            identifier: "123".to_owned(),
            plan_identifier: "123".to_owned(),
            plan_label: "Plan".to_owned(),
            key: Product::product_key("123", &product_type),
            description_key: product_type.to_string(),
            name: "123".to_owned(),
            state: json!("Active"),
            product_type,
            specurl: None,
            price: None,
            info: Value::Null,
            subscription_info: Value::Null,
            address: Value::Null,
            extra_attributes: serde_json::Map::new(),
            native_unit: None,
            derived: false,
            ignore_extra_sensors: false,
        }
    }

    #[test]
    fn projects_only_whitelisted_fields() {
        let mut p = product(ProductType::Mobile);
        let source = json!({
            "identifier": "123",
            "status": "ACTIVE",
            "bundleIdentifier": "999",
            "hasVoiceMail": true,
            "secretInternalField": "must not leak",
        });
        project(&mut p, &source);
        assert_eq!(p.extra_attributes["identifier"], json!("123"));
        assert_eq!(p.extra_attributes["bundleIdentifier"], json!("999"));
        assert_eq!(p.extra_attributes["hasVoiceMail"], json!(true));
        assert!(!p.extra_attributes.contains_key("secretInternalField"));
        // Mobile whitelist does not include bundle-only fields.
        assert!(!p.extra_attributes.contains_key("bundleFamily"));
    }

    #[test]
    fn projection_never_replaces_existing_attributes() {
        let mut p = product(ProductType::Internet);
        p.extra_attributes
            .insert("label".to_owned(), json!("computed label"));
        project(&mut p, &json!({ "label": "raw label", "internetType": "FIBER" }));
        assert_eq!(p.extra_attributes["label"], json!("computed label"));
        assert_eq!(p.extra_attributes["internetType"], json!("FIBER"));
    }

    #[test]
    fn unknown_types_project_base_fields_only() {
        let mut p = product(ProductType::Other("wifree".to_owned()));
        project(
            &mut p,
            &json!({ "status": "ACTIVE", "internetType": "FIBER" }),
        );
        assert_eq!(p.extra_attributes["status"], json!("ACTIVE"));
        assert!(!p.extra_attributes.contains_key("internetType"));
    }
}
