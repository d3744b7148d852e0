// telenet-core: product discovery and sensor synthesis on top of the
// Telenet customer-portal API.

pub mod attributes;
pub mod catalog;
pub mod config;
pub mod error;
pub mod product;
mod sensors;
pub mod util;

pub use catalog::ProductCatalog;
pub use config::{AccountConfig, Language};
pub use error::CoreError;
pub use product::{Product, ProductType};
