// ── Product model ──
//
// The central entity of the crate: one record per subscribed product
// or derived sensor, keyed by a generated entity key that is unique
// across the whole table.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util::entity_key;

/// Product type tag from the portal's discovery tree.
///
/// Open-ended on purpose: the portal adds types without notice, and an
/// unknown tag must still round-trip through registration, subscription
/// attach, and projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProductType {
    Internet,
    Mobile,
    Dtv,
    Telephone,
    Bundle,
    /// Synthetic: account-level invoice sensor.
    Invoice,
    /// Synthetic: account-level user-details sensor.
    User,
    /// Anything the portal invents next.
    Other(String),
}

impl ProductType {
    /// The lowercase tag used in keys, queries, and description keys.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Internet => "internet",
            Self::Mobile => "mobile",
            Self::Dtv => "dtv",
            Self::Telephone => "telephone",
            Self::Bundle => "bundle",
            Self::Invoice => "invoice",
            Self::User => "user",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for ProductType {
    fn from(tag: &str) -> Self {
        match tag {
            "internet" => Self::Internet,
            "mobile" => Self::Mobile,
            "dtv" => Self::Dtv,
            "telephone" => Self::Telephone,
            "bundle" => Self::Bundle,
            "invoice" => Self::Invoice,
            "user" => Self::User,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for ProductType {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl From<ProductType> for String {
    fn from(t: ProductType) -> Self {
        t.as_str().to_owned()
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subscribed product or derived sensor.
///
/// Real products come straight from the discovery tree; derived
/// sensors are synthesized from usage/detail endpoints and flagged
/// with [`derived`](Self::derived).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier within the table (line number, plan id, or a
    /// `"{id} {suffix}"` composite for derived sensors).
    pub identifier: String,
    /// Identifier of the plan this product belongs to; equals
    /// `identifier` for top-level/standalone products.
    pub plan_identifier: String,
    /// Human label of the owning plan.
    pub plan_label: String,
    pub product_type: ProductType,
    /// Stable key for use as a dictionary/entity id; unique across the
    /// whole table, derived sensors included.
    pub key: String,
    /// Semantic rendering hint for the state ("euro",
    /// "usage_percentage", "modem", ...).
    pub description_key: String,
    /// Display name.
    pub name: String,
    /// State value exposed to the dashboard (string, number, or bool).
    pub state: Value,
    /// Specification-sheet URL, when the portal published one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specurl: Option<String>,
    /// Sales-price block from the spec sheet (value, unit, currency).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Value>,
    /// Raw spec-sheet payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub info: Value,
    /// Raw subscription record attached after discovery.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub subscription_info: Value,
    /// Installation address record.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub address: Value,
    /// Extra attributes: projected subscription fields for real
    /// products, computed bundles for derived sensors.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra_attributes: Map<String, Value>,
    /// Unit hint for numeric states (mobile data buckets).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_unit: Option<String>,
    /// `true` for synthesized sensors, `false` for portal products.
    #[serde(default)]
    pub derived: bool,
    /// Set on a dtv-typed plan whose dtv child already produces the
    /// sensors, to suppress duplicates at the plan level.
    #[serde(default)]
    pub ignore_extra_sensors: bool,
}

impl Product {
    /// Entity key for a real product: `"{identifier} {type} product"`.
    pub fn product_key(identifier: &str, product_type: &ProductType) -> String {
        entity_key(&format!("{identifier} {product_type} product"))
    }

    /// Entity key for a derived sensor: `"{identifier} {type} {suffix}"`.
    ///
    /// The suffix vocabulary is finite, so the identifier and type tag
    /// carry the uniqueness; the `product` suffix is reserved for real
    /// products and never used by sensors.
    pub fn sensor_key(identifier: &str, product_type: &ProductType, suffix: &str) -> String {
        entity_key(&format!("{identifier} {product_type} {suffix}"))
    }

    /// `true` when this is the line under a shared bundle rather than
    /// a standalone subscription.
    pub fn is_bundle_line(&self) -> bool {
        self.plan_identifier != self.identifier
    }
}
