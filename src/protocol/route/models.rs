/// Protocol name, also the store namespace.
pub const COORDINATION: &str = "routecoordination";

pub const COORDINATION_SPEC: &str = "https://didcomm.org/routecoordination/1.0/";
pub const REQUEST_MSG_TYPE: &str = "https://didcomm.org/routecoordination/1.0/route-request";
pub const GRANT_MSG_TYPE: &str = "https://didcomm.org/routecoordination/1.0/route-grant";
pub const KEYLIST_UPDATE_MSG_TYPE: &str = "https://didcomm.org/routecoordination/1.0/keylist_update";
pub const KEYLIST_UPDATE_RESPONSE_MSG_TYPE: &str =
    "https://didcomm.org/routecoordination/1.0/keylist_update_response";

/// Asks the other agent to act as our router.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    #[serde(rename = "@type")]
    pub msg_type: String,
    #[serde(rename = "@id")]
    pub id: String,
}

/// Router's answer to a [`Request`], carrying the request's `@id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Grant {
    #[serde(rename = "@type")]
    pub msg_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    pub endpoint: String,
    #[serde(default)]
    pub routing_keys: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    Add,
    Remove,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateResult {
    Success,
    ServerError,
    ClientError,
    NoChange,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Update {
    pub recipient_key: String,
    pub action: UpdateAction,
}

/// Registers or removes recipient keys at the router.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KeylistUpdate {
    #[serde(rename = "@type")]
    pub msg_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub updates: Vec<Update>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UpdateResponse {
    pub recipient_key: String,
    pub action: UpdateAction,
    pub result: UpdateResult,
}

/// Per key outcome of a [`KeylistUpdate`], carrying the update's `@id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KeylistUpdateResponse {
    #[serde(rename = "@type")]
    pub msg_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub updated: Vec<UpdateResponse>,
}

/// Router endpoint and routing keys obtained at registration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    router_endpoint: String,
    routing_keys: Vec<String>,
}

impl Config {
    pub fn new(router_endpoint: &str, routing_keys: Vec<String>) -> Self {
        Self {
            router_endpoint: router_endpoint.into(),
            routing_keys,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.router_endpoint
    }

    pub fn keys(&self) -> &[String] {
        &self.routing_keys
    }
}

/// Grant contents chosen by the router's user. Empty values fall back to
/// the router endpoint and a freshly created routing key.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub service_endpoint: String,
    pub routing_keys: Vec<String>,
}
