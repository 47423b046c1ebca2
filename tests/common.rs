extern crate didcomm_agent;

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

pub use didcomm_agent::{
    messages::Thread,
    service::{Messenger, StateMsg, StateMsgType},
    transport::{Destination, OutboundTransport},
    vdri::{Doc, Service as DidService, DIDCOMM_SERVICE_TYPE},
    Error, Message, Result,
};

pub const ALICE_DID: &str = "did:example:alice";
pub const BOB_DID: &str = "did:example:bob";

/// DID document with a single DIDComm service.
#[allow(dead_code)]
pub fn didcomm_doc(did: &str, verkey: &str, routing_keys: Vec<String>, endpoint: &str) -> Doc {
    Doc {
        id: did.into(),
        public_key: vec![],
        service: vec![DidService {
            id: format!("{}#didcomm", did),
            service_type: DIDCOMM_SERVICE_TYPE.into(),
            priority: 0,
            recipient_keys: vec![verkey.into()],
            routing_keys,
            service_endpoint: endpoint.into(),
        }],
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send(Message),
    ReplyTo(String, Message),
    ReplyToNested(String, Message),
}

/// Remembers what a protocol service asked to send.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingMessenger {
    calls: Mutex<Vec<Call>>,
}

#[allow(dead_code)]
impl RecordingMessenger {
    pub fn calls(&self) -> Result<Vec<Call>> {
        Ok(self
            .calls
            .lock()
            .map_err(|e| Error::Generic(e.to_string()))?
            .clone())
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls
            .lock()
            .map_err(|e| Error::Generic(e.to_string()))?
            .push(call);
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, msg: Message, _: &str, _: &str) -> Result<()> {
        self.record(Call::Send(msg))
    }

    async fn reply_to(&self, msg_id: &str, msg: Message) -> Result<()> {
        self.record(Call::ReplyTo(msg_id.into(), msg))
    }

    async fn reply_to_nested(&self, thread_id: &str, msg: Message, _: &str, _: &str) -> Result<()> {
        self.record(Call::ReplyToNested(thread_id.into(), msg))
    }
}

/// Accepts `http` endpoints and keeps every packed message.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Vec<u8>, Destination)>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn sent(&self) -> Result<Vec<(Vec<u8>, Destination)>> {
        Ok(self
            .sent
            .lock()
            .map_err(|e| Error::Generic(e.to_string()))?
            .clone())
    }
}

#[async_trait]
impl OutboundTransport for RecordingTransport {
    async fn send(&self, data: &[u8], destination: &Destination) -> Result<String> {
        self.sent
            .lock()
            .map_err(|e| Error::Generic(e.to_string()))?
            .push((data.to_vec(), destination.clone()));
        Ok(String::new())
    }

    fn accept(&self, url: &str) -> bool {
        url.starts_with("http")
    }

    fn accept_recipient(&self, _: &[String]) -> bool {
        false
    }
}

/// Receives the next value or fails after a few seconds.
#[allow(dead_code)]
pub async fn recv<T>(rx: &mut UnboundedReceiver<T>) -> Result<T> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .map_err(|_| Error::Timeout("event".into()))?
        .ok_or_else(|| Error::Generic("channel closed".into()))
}

/// Names of the post-state events up to and including `last`.
#[allow(dead_code)]
pub async fn post_states_until(rx: &mut UnboundedReceiver<StateMsg>, last: &str) -> Result<Vec<String>> {
    let mut seen = vec![];
    loop {
        let msg = recv(rx).await?;
        if msg.kind != StateMsgType::PostState {
            continue;
        }
        seen.push(msg.state_id.clone());
        if msg.state_id == last {
            return Ok(seen);
        }
    }
}
