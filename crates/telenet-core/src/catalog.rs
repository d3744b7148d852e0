// ── Product catalog ──
//
// Discovery pipeline over the portal API: walk the active-products
// tree, attach subscription records, synthesize derived sensors, and
// project whitelisted attributes. The catalog owns the client and the
// resulting product table; one catalog serves one account.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use telenet_api::{Environment, Fetch, PortalClient, UserDetails};
use tracing::debug;

use crate::attributes;
use crate::config::{AccountConfig, Language};
use crate::error::CoreError;
use crate::product::{Product, ProductType};
use crate::sensors;
use crate::util::{entity_key, json_path, localized, object_attributes, parse_number};

/// Product table for one portal account.
///
/// Products are kept in discovery order, keyed by entity key. A
/// completed [`products`](Self::products) pass holds both the real
/// products and the derived sensors; until then the table is empty.
pub struct ProductCatalog {
    client: PortalClient,
    language: Language,
    products: IndexMap<String, Product>,
    /// Real-product lookup: portal identifier to entity key.
    by_identifier: HashMap<String, String>,
    product_types: Vec<ProductType>,
    /// Billing-account ("PLAN") subscription records by identifier.
    plan_records: HashMap<String, Value>,
    total_cost: f64,
}

impl ProductCatalog {
    /// Build a catalog with a fresh client for the given account.
    pub fn new(config: &AccountConfig, environment: Environment) -> Result<Self, CoreError> {
        let client = PortalClient::new(
            config.username.clone(),
            config.password.clone(),
            config.language.to_string(),
            environment,
        )?;
        Ok(Self::from_client(client, config.language))
    }

    /// Build a catalog around an existing client.
    pub fn from_client(client: PortalClient, language: Language) -> Self {
        Self {
            client,
            language,
            products: IndexMap::new(),
            by_identifier: HashMap::new(),
            product_types: Vec::new(),
            plan_records: HashMap::new(),
            total_cost: 0.0,
        }
    }

    /// The underlying portal client.
    pub fn client(&self) -> &PortalClient {
        &self.client
    }

    /// Sum of product prices and usage costs from the last pass.
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Distinct product types discovered in the last pass.
    pub fn product_types(&self) -> &[ProductType] {
        &self.product_types
    }

    /// Authenticate without running a discovery pass (credential
    /// validation during setup).
    pub async fn login(&mut self) -> Result<UserDetails, CoreError> {
        Ok(self.client.login().await?)
    }

    /// Run a discovery pass unconditionally.
    pub async fn refreshed_products(&mut self) -> Result<Vec<Product>, CoreError> {
        self.products(true).await
    }

    /// The full product table, running a discovery pass if none has
    /// completed yet (or `force_refresh` is set).
    pub async fn products(&mut self, force_refresh: bool) -> Result<Vec<Product>, CoreError> {
        if !force_refresh && !self.products.is_empty() {
            debug!("returning cached products");
            return Ok(self.products.values().cloned().collect());
        }
        self.client.login().await?;
        self.total_cost = 0.0;
        self.products.clear();
        self.by_identifier.clear();
        self.product_types.clear();

        debug!("fetching active products");
        let plans = match self.client.active_products().await? {
            Fetch::Data(plans) if !plans.is_empty() => plans,
            _ => return Err(CoreError::NotProvisioned),
        };
        for plan in &plans {
            self.register_plan(plan).await?;
        }
        self.attach_subscriptions().await?;
        self.load_plan_records().await?;
        self.create_extra_sensors().await?;
        self.project_attributes();
        Ok(self.products.values().cloned().collect())
    }

    /// Register one top-level plan and its children/options.
    async fn register_plan(&mut self, plan: &Value) -> Result<(), CoreError> {
        let plan_identifier = plan
            .get("identifier")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let plan_label = plan
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        self.register_product(plan, &plan_identifier, &plan_label)
            .await?;

        let mut dtv_child = false;
        if let Some(children) = plan.get("children").and_then(Value::as_array) {
            for child in children {
                if child.get("productType").and_then(Value::as_str) == Some("dtv") {
                    dtv_child = true;
                }
                if let Some(options) = child.get("options").and_then(Value::as_array) {
                    for option in options {
                        if option.get("identifier").is_some() {
                            self.register_product(option, &plan_identifier, &plan_label)
                                .await?;
                        }
                    }
                }
                self.register_product(child, &plan_identifier, &plan_label)
                    .await?;
            }
        }
        // A dtv child carries the sensors; a dtv-typed plan above it
        // would duplicate every one of them.
        if dtv_child && plan.get("productType").and_then(Value::as_str) == Some("dtv") {
            if let Some(key) = self.by_identifier.get(&plan_identifier) {
                if let Some(product) = self.products.get_mut(key) {
                    debug!(plan_identifier, "dtv child found, suppressing plan-level sensors");
                    product.ignore_extra_sensors = true;
                }
            }
        }
        Ok(())
    }

    /// Register one product record. Returns `false` for records without
    /// an identifier and for identifiers already registered (first
    /// registration wins).
    async fn register_product(
        &mut self,
        record: &Value,
        plan_identifier: &str,
        plan_label: &str,
    ) -> Result<bool, CoreError> {
        let Some(identifier) = record
            .get("identifier")
            .and_then(Value::as_str)
            .map(str::to_owned)
        else {
            return Ok(false);
        };
        if self.by_identifier.contains_key(&identifier) {
            return Ok(false);
        }
        let product_type = ProductType::from(
            record
                .get("productType")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        );
        debug!(identifier, %product_type, plan_label, "registering product");

        // Spec sheet is best-effort: a product without one still gets
        // registered, just without price and localized name.
        let specurl = record
            .get("specurl")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let mut info = Value::Null;
        let mut price = None;
        if let Some(url) = &specurl {
            match self.client.product_details(url).await {
                Ok(Fetch::Data(details)) => {
                    info = details.get("product").cloned().unwrap_or(Value::Null);
                    if let Some(block) = json_path(&info, "characteristics.salespricevatincl") {
                        let amount = block.get("value").and_then(parse_number).unwrap_or(0.0);
                        if amount > 0.0 {
                            debug!(identifier, %amount, "sales price found");
                            price = Some(block.clone());
                        }
                    }
                }
                Ok(Fetch::Unavailable) => {}
                Err(e) => debug!(identifier, error = %e, "spec sheet fetch failed"),
            }
        }
        let language = self.language.to_string();
        let state = localized(&language, info.get("localizedcontent"))
            .and_then(|entry| entry.get("name"))
            .cloned()
            .or_else(|| record.get("label").cloned())
            .unwrap_or(Value::Null);
        let address = match self
            .client
            .address(record.get("addressId").and_then(Value::as_str))
            .await
        {
            Ok(Fetch::Data(value)) => value,
            Ok(Fetch::Unavailable) => Value::Null,
            Err(e) => {
                debug!(identifier, error = %e, "address fetch failed");
                Value::Null
            }
        };

        let key = Product::product_key(&identifier, &product_type);
        let product = Product {
            identifier: identifier.clone(),
            plan_identifier: plan_identifier.to_owned(),
            plan_label: plan_label.to_owned(),
            product_type: product_type.clone(),
            key: key.clone(),
            description_key: product_type.to_string(),
            name: identifier.clone(),
            state,
            specurl,
            price,
            info,
            subscription_info: Value::Null,
            address,
            extra_attributes: Map::new(),
            native_unit: None,
            derived: false,
            ignore_extra_sensors: false,
        };
        self.by_identifier.insert(identifier, key.clone());
        if !self.product_types.contains(&product_type) {
            self.product_types.push(product_type);
        }
        self.products.insert(key, product);
        Ok(true)
    }

    /// Attach per-type subscription records to the registered products.
    async fn attach_subscriptions(&mut self) -> Result<(), CoreError> {
        let types = self.product_types.clone();
        for product_type in types {
            let records = match self
                .client
                .product_subscriptions(product_type.as_str())
                .await?
            {
                Fetch::Data(records) => records,
                Fetch::Unavailable => continue,
            };
            for record in records {
                let Some(identifier) = record
                    .get("identifier")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                else {
                    continue;
                };
                let Some(key) = self.by_identifier.get(&identifier).cloned() else {
                    debug!(identifier, "subscription record for an unregistered product");
                    continue;
                };
                if let Some(product) = self.products.get_mut(&key) {
                    product.subscription_info = record;
                }
            }
        }
        Ok(())
    }

    /// Load billing-account subscription records; they back attribute
    /// projection for plans without a per-type record.
    async fn load_plan_records(&mut self) -> Result<(), CoreError> {
        self.plan_records.clear();
        let records = match self.client.product_subscriptions("PLAN").await? {
            Fetch::Data(records) => records,
            Fetch::Unavailable => return Ok(()),
        };
        for record in records {
            if let Some(identifier) = record
                .get("identifier")
                .and_then(Value::as_str)
                .map(str::to_owned)
            {
                self.plan_records.insert(identifier, record);
            }
        }
        Ok(())
    }

    /// Synthesize derived sensors, then the account-level invoice and
    /// user sensors.
    async fn create_extra_sensors(&mut self) -> Result<(), CoreError> {
        let real: Vec<Product> = self.products.values().cloned().collect();
        let batch = sensors::synthesize(&mut self.client, self.language, &real).await?;
        self.total_cost += batch.cost;
        for sensor in batch.sensors {
            self.insert_sensor(sensor);
        }

        let Some(user) = self.client.user().cloned() else {
            return Ok(());
        };
        let customer = user.customer_number.clone().unwrap_or_default();

        let identifier = format!("{customer} current invoice");
        self.insert_sensor(Product {
            identifier: identifier.clone(),
            plan_identifier: customer.clone(),
            plan_label: "Customer".to_owned(),
            product_type: ProductType::Invoice,
            key: entity_key(&identifier),
            description_key: "euro".to_owned(),
            name: "current invoice".to_owned(),
            state: json!(self.total_cost),
            specurl: None,
            price: None,
            info: Value::Null,
            subscription_info: Value::Null,
            address: Value::Null,
            extra_attributes: Map::new(),
            native_unit: None,
            derived: true,
            ignore_extra_sensors: false,
        });

        let user_attributes = serde_json::to_value(&user)
            .ok()
            .as_ref()
            .map(object_attributes)
            .unwrap_or_default();
        self.insert_sensor(Product {
            identifier: "user details".to_owned(),
            plan_identifier: customer.clone(),
            plan_label: "Customer".to_owned(),
            product_type: ProductType::User,
            key: entity_key(&format!("{customer} user details")),
            description_key: "user".to_owned(),
            name: "user details".to_owned(),
            state: user.first_name.clone().map_or(Value::Null, |name| json!(name)),
            specurl: None,
            price: None,
            info: Value::Null,
            subscription_info: Value::Null,
            address: Value::Null,
            extra_attributes: user_attributes,
            native_unit: None,
            derived: true,
            ignore_extra_sensors: false,
        });
        Ok(())
    }

    /// Insert a derived sensor; on a key collision the earlier entry
    /// wins.
    fn insert_sensor(&mut self, sensor: Product) {
        if self.products.contains_key(&sensor.key) {
            debug!(key = %sensor.key, "duplicate sensor key, keeping the first");
            return;
        }
        self.products.insert(sensor.key.clone(), sensor);
    }

    /// Project whitelisted subscription fields onto the real products.
    fn project_attributes(&mut self) {
        for product in self.products.values_mut() {
            if product.derived {
                continue;
            }
            let source = if product.subscription_info.is_null() {
                match self.plan_records.get(&product.identifier) {
                    Some(record) => record.clone(),
                    None => continue,
                }
            } else {
                product.subscription_info.clone()
            };
            attributes::project(product, &source);
        }
    }
}
