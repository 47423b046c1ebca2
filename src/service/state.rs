use std::{collections::HashMap, sync::RwLock};

use tokio::sync::mpsc::UnboundedSender;

use crate::{Error, Message, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMsgType {
    /// Sent before a state is executed.
    PreState,
    /// Sent once a state executed and was persisted.
    PostState,
}

/// Notification of a state change of a protocol instance.
#[derive(Debug, Clone)]
pub struct StateMsg {
    pub protocol_name: String,
    pub kind: StateMsgType,
    pub msg: Message,
    pub state_id: String,
    pub properties: HashMap<String, String>,
}

/// Subscribers of state change notifications.
#[derive(Default)]
pub struct MessageEvents {
    subscribers: RwLock<Vec<UnboundedSender<StateMsg>>>,
}

impl MessageEvents {
    pub fn register(&self, ch: UnboundedSender<StateMsg>) -> Result<()> {
        self.subscribers
            .write()
            .map_err(|e| Error::Generic(e.to_string()))?
            .push(ch);
        Ok(())
    }

    pub fn unregister(&self, ch: &UnboundedSender<StateMsg>) -> Result<()> {
        self.subscribers
            .write()
            .map_err(|e| Error::Generic(e.to_string()))?
            .retain(|s| !s.same_channel(ch));
        Ok(())
    }

    /// Sends `msg` to every live subscriber. Subscribers whose receiver is
    /// gone are dropped.
    pub fn notify(&self, msg: StateMsg) {
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.retain(|s| s.send(msg.clone()).is_ok());
        }
    }
}
