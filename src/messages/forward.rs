use serde_json::value::RawValue;

/// Routing forward message type.
pub const FORWARD_MSG_TYPE: &str = "https://didcomm.org/routing/1.0/forward";

/// Wrapper asking a mediator to pass `msg` on to the holder of `to`.
///
/// `msg` is an already packed envelope and is embedded verbatim.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Forward {
    #[serde(rename = "@type")]
    pub msg_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    pub to: String,
    pub msg: Box<RawValue>,
}

impl Forward {
    pub fn new(to: &str, msg: Box<RawValue>) -> Self {
        Forward {
            msg_type: FORWARD_MSG_TYPE.into(),
            id: uuid::Uuid::new_v4().to_string(),
            to: to.into(),
            msg,
        }
    }
}
