use base58::{FromBase58, ToBase58};

use crate::Error;

pub fn to_base58(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().to_base58()
}

pub fn from_base58(encoded: &str) -> Result<Vec<u8>, Error> {
    encoded
        .from_base58()
        .map_err(|e| Error::Base58DecodeError(format!("{:?}", e)))
}

/// Decodes a base58 verification key into a 32 byte X25519 public key.
pub fn verkey_to_x25519(verkey: &str) -> Result<[u8; 32], Error> {
    from_base58(verkey)?
        .try_into()
        .map_err(|_| Error::Generic(format!("verkey '{}' is not a 32 byte key", verkey)))
}
