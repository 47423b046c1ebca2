//! Route coordination: registering with a router and the router side of
//! key lists and forwarding.
mod models;
mod service;

pub use models::*;
pub use service::{Action, Provider, Service, ServiceConfig, DEFAULT_CLIENT_TIMEOUT};
