// telenet-api: Async Rust client for the Telenet customer-portal API
// (OCAPI gateway + OpenID login).

pub mod auth;
pub mod billing;
pub mod client;
pub mod contact;
pub mod environment;
pub mod error;
pub mod mobile;
pub mod models;
pub mod products;
pub mod resource;
pub mod transport;

pub use client::PortalClient;
pub use environment::Environment;
pub use error::Error;
pub use models::{BillCycle, BillCycleWindow, Fetch, PortalResponse, UserDetails};
pub use transport::TransportConfig;
