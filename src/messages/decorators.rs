//! Decorator Types.
//!
//! Decorators carry messaging metadata that is not tied to a specific
//! protocol: threading (`~thread`) and transport hints (`~transport`).
//! For more details, see Aries RFC 0008 and RFC 0092.

use std::collections::HashMap;

/// Field name of the thread decorator.
pub const THREAD_DECORATOR: &str = "~thread";
/// Field name of the transport decorator.
pub const TRANSPORT_DECORATOR: &str = "~transport";

/// A `~thread` message decorator that provides request/reply
/// and threading semantics according to Aries RFC 0008.
#[derive(Default, Deserialize, Serialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct Thread {
    /// The ID of the message that serves as the thread start.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub thid: String,

    /// An optional parent `thid`.
    ///
    /// It's used when branching or nesting a new interaction off an
    /// existing one.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pthid: String,

    /// The index of the message in the sequence of all the messages
    /// the current *sender* has contributed to in the thread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_order: Option<usize>,

    /// A dictionary of sender_order/highest messages received on the thread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_orders: Option<HashMap<String, usize>>,
}

impl Thread {
    /// Creates implicit thread.
    ///
    /// # Example
    ///
    /// ```
    /// use didcomm_agent::messages::Thread;
    /// let message_id = "new-message";
    /// let thread = Thread::implicit(&message_id);
    /// assert_eq!(thread.thid, message_id.to_string())
    /// ```
    pub fn implicit(message_id: &str) -> Self {
        Self {
            thid: message_id.into(),
            sender_order: Some(0),
            ..Default::default()
        }
    }

    /// Create implicit message reply thread.
    pub fn implicit_reply(thid: &str) -> Self {
        Self {
            thid: thid.into(),
            ..Default::default()
        }
    }

    /// Thread nested under the interaction `pthid`.
    pub fn nested(pthid: &str) -> Self {
        Self {
            pthid: pthid.into(),
            ..Default::default()
        }
    }

    /// Returns `true` if the thread is for an implicit reply message.
    pub fn is_implicit_reply(&self, message_id: &str) -> bool {
        if self.thid != message_id {
            match self.received_orders {
                Some(ref recv_orders) => recv_orders.values().all(|&x| x == 0),
                None => true,
            }
        } else {
            false
        }
    }
}

/// Which inbound connections the sender wants replies on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReturnRoute {
    /// No return route requested.
    #[default]
    None,
    /// Replies to any message may come back on the inbound connection.
    All,
    /// Only replies within the same thread may come back.
    Thread,
}

/// The `~transport` decorator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transport {
    pub return_route: ReturnRoute,
}
