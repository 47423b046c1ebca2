//! Outbound transport seam.

use async_trait::async_trait;

use crate::{messages::ReturnRoute, Result};

/// Where, and for whom, a packed message is delivered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub service_endpoint: String,
    #[serde(default)]
    pub recipient_keys: Vec<String>,
    #[serde(default)]
    pub routing_keys: Vec<String>,
    /// Return route mode requested from the receiving agent.
    #[serde(default)]
    pub transport_return_route: ReturnRoute,
}

/// Delivers packed bytes to an endpoint.
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    /// Sends `data` and returns the transport's response, if any.
    async fn send(&self, data: &[u8], destination: &Destination) -> Result<String>;

    /// `true` if the transport can reach `url`.
    fn accept(&self, url: &str) -> bool;

    /// `true` if the transport holds a connection to one of `keys`.
    fn accept_recipient(&self, keys: &[String]) -> bool;
}
