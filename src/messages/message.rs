use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use super::decorators::{Thread, THREAD_DECORATOR};
use crate::{Error, Result};

/// DIDComm message as an ordered JSON object.
///
/// Protocol specific bodies are kept as plain fields next to `@id`, `@type`
/// and the decorators (`~thread`, `~transport`, ...); typed views are
/// obtained with [`Message::decode`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct Message {
    fields: Map<String, Value>,
}

impl Message {
    /// Empty message of `msg_type` with a fresh `@id`.
    pub fn new(msg_type: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("@id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
        fields.insert("@type".into(), Value::String(msg_type.into()));
        Message { fields }
    }

    /// Builds a message from any serializable protocol body.
    ///
    /// # Example
    ///
    /// ```
    /// use didcomm_agent::{messages::Forward, Message};
    /// let forward = Forward::new("recipient-key", serde_json::value::RawValue::from_string("{}".into()).unwrap());
    /// let msg = Message::encode(&forward).unwrap();
    /// assert_eq!(msg.msg_type(), didcomm_agent::messages::FORWARD_MSG_TYPE);
    /// ```
    pub fn encode<T: Serialize>(body: &T) -> Result<Self> {
        match serde_json::to_value(body)? {
            Value::Object(fields) => Ok(Message { fields }),
            other => Err(Error::Generic(format!(
                "message must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// Typed view of the message.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        // through bytes, so bodies holding raw JSON values decode as well
        let bytes = serde_json::to_vec(&self.fields)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.fields)?)
    }

    fn str_field(&self, key: &str) -> &str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    /// `@id`, empty if absent.
    pub fn id(&self) -> &str {
        self.str_field("@id")
    }

    pub fn set_id(&mut self, id: &str) {
        self.fields.insert("@id".into(), Value::String(id.into()));
    }

    /// `@type`, empty if absent.
    pub fn msg_type(&self) -> &str {
        self.str_field("@type")
    }

    /// `true` when the message carries a `~thread` decorator.
    pub fn has_thread(&self) -> bool {
        self.fields.contains_key(THREAD_DECORATOR)
    }

    pub fn thread(&self) -> Option<Thread> {
        self.fields
            .get(THREAD_DECORATOR)
            .and_then(|t| serde_json::from_value(t.clone()).ok())
    }

    pub fn set_thread(&mut self, thread: Thread) -> Result<()> {
        self.set_field(THREAD_DECORATOR, &thread)
    }

    /// Thread this message belongs to: `~thread.thid`, or the message's own `@id`
    /// when it starts a thread.
    pub fn thread_id(&self) -> Result<String> {
        if let Some(thid) = self.thread().map(|t| t.thid).filter(|t| !t.is_empty()) {
            return Ok(thid);
        }
        match self.id() {
            "" => Err(Error::Generic("threadID not found".into())),
            id => Ok(id.to_string()),
        }
    }

    /// `~thread.pthid`, empty if absent.
    pub fn parent_thread_id(&self) -> String {
        self.thread().map(|t| t.pthid).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Inserts or replaces a top level field.
    pub fn set_field<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        self.fields
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove_field(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }
}
