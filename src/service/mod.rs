//! Seams shared by the protocol services: the messenger, the handler
//! interface, action/state event plumbing and reply correlation.
mod action;
mod pending;
mod state;

pub use action::{ActionEvents, ActionResponse, DidCommAction};
pub use pending::{PendingGuard, PendingReplies};
pub use state::{MessageEvents, StateMsg, StateMsgType};

use async_trait::async_trait;

use crate::{Message, Result};

/// Sends protocol messages on behalf of a service.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends `msg` to `their_did`, assigning an `@id` if it has none.
    async fn send(&self, msg: Message, my_did: &str, their_did: &str) -> Result<()>;

    /// Replies to the inbound message `msg_id`, threading the reply.
    async fn reply_to(&self, msg_id: &str, msg: Message) -> Result<()>;

    /// Starts an interaction nested under `thread_id`.
    async fn reply_to_nested(
        &self,
        thread_id: &str,
        msg: Message,
        my_did: &str,
        their_did: &str,
    ) -> Result<()>;
}

/// DIDComm protocol service.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    /// `true` if `msg_type` belongs to this protocol.
    fn accept(&self, msg_type: &str) -> bool;

    /// Handles a received message, returning the protocol instance ID.
    async fn handle_inbound(&self, msg: Message, my_did: &str, their_did: &str) -> Result<String>;

    /// Starts or continues an interaction with a message of ours.
    async fn handle_outbound(&self, msg: Message, my_did: &str, their_did: &str) -> Result<()>;
}
