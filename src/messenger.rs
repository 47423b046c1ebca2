//! [`Messenger`] over the outbound dispatcher.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    dispatcher::Outbound,
    messages::Thread,
    service::Messenger,
    storage::{StorageProvider, Store},
    util::Logger,
    Error, Message, Result, ResultExt,
};

/// Store namespace of inbound message metadata.
pub const NAMESPACE: &str = "didcomm_messenger";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct Record {
    #[serde(rename = "threadID")]
    thread_id: String,
    #[serde(rename = "myDID")]
    my_did: String,
    #[serde(rename = "theirDID")]
    their_did: String,
}

/// Remembers who sent what so replies can be addressed by message ID alone.
pub struct OutboundMessenger {
    outbound: Arc<dyn Outbound>,
    store: Arc<dyn Store>,
    log: Logger,
}

impl OutboundMessenger {
    pub fn new(outbound: Arc<dyn Outbound>, provider: &dyn StorageProvider) -> Result<Self> {
        Ok(Self {
            outbound,
            store: provider
                .open_store(NAMESPACE)
                .context("failed to open messenger store")?,
            log: Logger::new("didcomm/messenger"),
        })
    }

    /// Records the thread and DIDs of a received message.
    pub fn handle_inbound(&self, msg: &Message, my_did: &str, their_did: &str) -> Result<()> {
        if msg.id().is_empty() {
            return Err(Error::Generic("message-id is absent".into()));
        }
        let record = Record {
            thread_id: msg.thread_id()?,
            my_did: my_did.into(),
            their_did: their_did.into(),
        };
        self.store
            .put(msg.id(), &serde_json::to_vec(&record)?)
            .context("save message metadata")
    }

    fn record(&self, msg_id: &str) -> Result<Record> {
        let bytes = self.store.get(msg_id).context("get message metadata")?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn with_id(mut msg: Message) -> Message {
    if msg.id().is_empty() {
        msg.set_id(&uuid::Uuid::new_v4().to_string());
    }
    msg
}

#[async_trait]
impl Messenger for OutboundMessenger {
    async fn send(&self, msg: Message, my_did: &str, their_did: &str) -> Result<()> {
        let msg = with_id(msg);
        self.outbound.send_to_did(&msg, my_did, their_did).await
    }

    async fn reply_to(&self, msg_id: &str, msg: Message) -> Result<()> {
        let record = self.record(msg_id)?;
        let mut msg = with_id(msg);
        let mut thread = msg.thread().unwrap_or_default();
        thread.thid = record.thread_id;
        msg.set_thread(thread)?;

        debug!(target: self.log.target(), "replying to {} with {}", msg_id, msg.msg_type());
        self.outbound
            .send_to_did(&msg, &record.my_did, &record.their_did)
            .await
    }

    async fn reply_to_nested(
        &self,
        thread_id: &str,
        msg: Message,
        my_did: &str,
        their_did: &str,
    ) -> Result<()> {
        let mut msg = with_id(msg);
        msg.set_thread(Thread::nested(thread_id))?;
        self.outbound.send_to_did(&msg, my_did, their_did).await
    }
}
