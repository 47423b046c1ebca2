use std::sync::Arc;

use async_trait::async_trait;
use serde_json::value::RawValue;

use super::Outbound;
use crate::{
    kms::KeyManager,
    messages::{Forward, ReturnRoute, Transport, TRANSPORT_DECORATOR},
    packer::{Envelope, Packager},
    transport::{Destination, OutboundTransport},
    util::{from_base58, Logger},
    vdri::{get_destination, Registry},
    Error, Message, Result, ResultExt,
};

/// Collaborators of an [`OutboundDispatcher`].
pub struct DispatcherConfig {
    /// Tried in order, the first accepting transport is used.
    pub transports: Vec<Arc<dyn OutboundTransport>>,
    pub packager: Arc<dyn Packager>,
    /// Return route mode announced on every outbound message.
    pub transport_return_route: ReturnRoute,
    pub registry: Arc<dyn Registry>,
    /// Source of the throwaway sender keys of forward envelopes.
    pub kms: Arc<dyn KeyManager>,
}

pub struct OutboundDispatcher {
    transports: Vec<Arc<dyn OutboundTransport>>,
    packager: Arc<dyn Packager>,
    transport_return_route: ReturnRoute,
    registry: Arc<dyn Registry>,
    kms: Arc<dyn KeyManager>,
    log: Logger,
}

impl OutboundDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            transports: config.transports,
            packager: config.packager,
            transport_return_route: config.transport_return_route,
            registry: config.registry,
            kms: config.kms,
            log: Logger::new("didcomm/dispatcher"),
        }
    }

    /// First transport accepting the routing keys (recipient keys without a
    /// mediator hop), or failing that the service endpoint.
    fn select_transport(&self, keys: &[String], endpoint: &str) -> Result<&Arc<dyn OutboundTransport>> {
        self.transports
            .iter()
            .find(|t| t.accept_recipient(keys) || t.accept(endpoint))
            .ok_or_else(|| Error::NoOutboundTransport(endpoint.to_string()))
    }

    /// Adds the `~transport` decorator unless the message goes through a mediator.
    fn add_transport_route_options(&self, msg: &Message, destination: &Destination) -> Result<Message> {
        let mut msg = msg.clone();
        if destination.routing_keys.is_empty()
            && matches!(self.transport_return_route, ReturnRoute::All | ReturnRoute::Thread)
        {
            msg.set_field(
                TRANSPORT_DECORATOR,
                &Transport {
                    return_route: self.transport_return_route,
                },
            )?;
        }
        Ok(msg)
    }

    /// Wraps `packed` in a forward message for the first recipient key, packed
    /// for the routing keys with a fresh sender key.
    fn create_forward_message(&self, packed: Vec<u8>, destination: &Destination) -> Result<Vec<u8>> {
        if destination.routing_keys.is_empty() {
            return Ok(packed);
        }
        let to = destination
            .recipient_keys
            .first()
            .ok_or_else(|| Error::Generic("destination has no recipient keys".into()))?;
        let forward = Forward::new(to, RawValue::from_string(String::from_utf8(packed)?)?);

        let sender = self.kms.create_key_set().context("failed to create forward key")?;
        let packed = self
            .packager
            .pack_message(&Envelope {
                message: serde_json::to_vec(&forward)?,
                from_verkey: from_base58(&sender)?,
                to_verkeys: destination.routing_keys.clone(),
            })
            .context("pack forward msg")?;
        debug!(
            target: self.log.target(),
            "wrapped message in forward {} for {} routing key(s)",
            forward.id,
            destination.routing_keys.len()
        );
        Ok(packed)
    }
}

#[async_trait]
impl Outbound for OutboundDispatcher {
    async fn send(&self, msg: &Message, sender_verkey: &str, destination: &Destination) -> Result<()> {
        let keys = match destination.routing_keys.is_empty() {
            true => &destination.recipient_keys,
            false => &destination.routing_keys,
        };
        let transport = self.select_transport(keys, &destination.service_endpoint)?;

        let req = self
            .add_transport_route_options(msg, destination)
            .context("add transport route options")?
            .to_bytes()?;

        let packed = self
            .packager
            .pack_message(&Envelope {
                message: req,
                from_verkey: from_base58(sender_verkey)?,
                to_verkeys: destination.recipient_keys.clone(),
            })
            .context("failed to pack msg")?;

        let mut destination = destination.clone();
        destination.transport_return_route = self.transport_return_route;

        let packed = self
            .create_forward_message(packed, &destination)
            .context("create forward msg")?;

        transport
            .send(&packed, &destination)
            .await
            .context("failed to send msg using outbound transport")?;
        trace!(
            target: self.log.target(),
            "sent {} to {}",
            msg.msg_type(),
            destination.service_endpoint
        );
        Ok(())
    }

    async fn send_to_did(&self, msg: &Message, my_did: &str, their_did: &str) -> Result<()> {
        let dest = get_destination(their_did, self.registry.as_ref())
            .context(format!("failed to get didcomm destination for theirDID [{}]", their_did))?;
        let src = get_destination(my_did, self.registry.as_ref())
            .context(format!("failed to get didcomm destination for myDID [{}]", my_did))?;

        // one key type only, so the first recipient key is the sender key
        let key = src
            .recipient_keys
            .first()
            .ok_or_else(|| Error::Generic(format!("no recipient keys for {}", my_did)))?;

        self.send(msg, key, &dest).await
    }

    async fn forward(&self, packed: &[u8], destination: &Destination) -> Result<()> {
        let transport = self.select_transport(&destination.recipient_keys, &destination.service_endpoint)?;
        transport
            .send(packed, destination)
            .await
            .context("failed to send msg using outbound transport")?;
        Ok(())
    }
}
