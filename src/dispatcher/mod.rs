//! Outbound message dispatch.
mod outbound;

pub use outbound::{DispatcherConfig, OutboundDispatcher};

use async_trait::async_trait;

use crate::{transport::Destination, Message, Result};

/// Single path every outbound protocol message takes to a transport.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Packs `msg` from `sender_verkey` for `destination` and sends it.
    async fn send(&self, msg: &Message, sender_verkey: &str, destination: &Destination) -> Result<()>;

    /// Resolves both DIDs and sends `msg` from `my_did` to `their_did`.
    async fn send_to_did(&self, msg: &Message, my_did: &str, their_did: &str) -> Result<()>;

    /// Sends an already packed envelope as is.
    async fn forward(&self, packed: &[u8], destination: &Destination) -> Result<()>;
}
