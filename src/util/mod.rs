//! Encoding helpers and the per-service logging handle.
mod base58helper;
mod base64helper;
mod logger;
pub mod serialization;

pub use base58helper::{from_base58, to_base58, verkey_to_x25519};
pub use base64helper::{from_base64, to_base64};
pub use logger::Logger;
