//! DIDComm agent core.
//!
//! Messages leave the agent through the [`dispatcher`], which packs them into
//! JWE envelopes ([`packer`]) and, when the recipient sits behind a mediator,
//! wraps them into forward messages. Protocols ([`protocol`]) are persistent
//! state machines that suspend on user decisions and talk to the other party
//! through a [`service::Messenger`].

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

pub mod connection;
pub mod crypto;
pub mod dispatcher;
pub mod kms;
pub mod messages;
pub mod messenger;
pub mod packer;
pub mod protocol;
pub mod service;
pub mod storage;
pub mod transport;
pub mod util;
pub mod vdri;
pub mod verifiable;

mod error;
mod result;

pub use error::*;
pub use messages::Message;
pub use result::Result;
