//! Envelope packing.
//!
//! A [`Packager`] turns a plaintext message plus sender/recipient verkeys into
//! an encrypted JSON envelope and back. [`Packer`] is the X25519 based
//! implementation: authcrypt when a sender key is given, anoncrypt otherwise.
mod authcrypt;
mod jwe;

pub use authcrypt::Packer;
pub use jwe::*;

use crate::Result;

/// Message and key material handed to / returned by a [`Packager`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    pub message: Vec<u8>,
    /// Raw sender public key; empty for anonymous envelopes.
    pub from_verkey: Vec<u8>,
    /// Base58 recipient verkeys. On unpack, the key the envelope was opened with.
    pub to_verkeys: Vec<String>,
}

pub trait Packager: Send + Sync {
    fn pack_message(&self, envelope: &Envelope) -> Result<Vec<u8>>;

    fn unpack_message(&self, packed: &[u8]) -> Result<Envelope>;
}
