use std::convert::TryFrom;

use rand::RngCore;

use super::*;

/// Content encryption algorithm of an envelope. Produces a fresh AEAD
///     closure per invocation, so no key material outlives the call.
/// Underlying algorithms are implemented by Rust-crypto crate family.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CryptoAlgorithm {
    XC20P,
    A256GCM,
}

impl CryptoAlgorithm {
    /// JWA `enc` value.
    pub fn name(&self) -> &'static str {
        match self {
            CryptoAlgorithm::XC20P => "XC20P",
            CryptoAlgorithm::A256GCM => "A256GCM",
        }
    }

    /// Key wrapping `alg` used for content keys sealed with this algorithm.
    /// Authenticated (sender bound) wrapping uses ECDH-1PU, anonymous ECDH-ES.
    pub fn key_wrap_alg(&self, authenticated: bool) -> &'static str {
        match (self, authenticated) {
            (CryptoAlgorithm::XC20P, true) => "ECDH-1PU+XC20PKW",
            (CryptoAlgorithm::XC20P, false) => "ECDH-ES+XC20PKW",
            (CryptoAlgorithm::A256GCM, true) => "ECDH-1PU+A256KW",
            (CryptoAlgorithm::A256GCM, false) => "ECDH-ES+A256KW",
        }
    }

    pub fn nonce_size(&self) -> usize {
        match self {
            CryptoAlgorithm::XC20P => 24,
            CryptoAlgorithm::A256GCM => 12,
        }
    }

    pub fn key_size(&self) -> usize {
        32
    }

    pub fn tag_size(&self) -> usize {
        16
    }

    /// Fresh random nonce of the algorithm's size.
    pub fn generate_nonce(&self) -> Vec<u8> {
        let mut nonce = vec![0u8; self.nonce_size()];
        rand::thread_rng().fill_bytes(&mut nonce);
        nonce
    }

    /// Fresh random symmetric key.
    pub fn generate_key(&self) -> Vec<u8> {
        let mut key = vec![0u8; self.key_size()];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }
}

impl Cypher for CryptoAlgorithm {
    /// Generates + invokes crypto of `SymmetricCypherMethod` which perfoms encryption.
    /// Algorithm selected is based on struct's `CryptoAlgorithm` property.
    fn encryptor(&self) -> SymmetricCypherMethod {
        match self {
            CryptoAlgorithm::XC20P => Box::new(
                |nonce: &[u8], key: &[u8], message: &[u8], aad: &[u8]| -> Result<Vec<u8>, Error> {
                    check_nonce(nonce, 24)?;
                    use chacha20poly1305::{
                        aead::{Aead, KeyInit, Payload},
                        XChaCha20Poly1305, XNonce,
                    };
                    let nonce = XNonce::from_slice(&nonce[..24]);
                    let aead = XChaCha20Poly1305::new_from_slice(key)
                        .map_err(|_| Error::PlugCryptoFailure)?;
                    aead.encrypt(nonce, Payload { msg: message, aad })
                        .map_err(|_| Error::PlugCryptoFailure)
                },
            ),
            CryptoAlgorithm::A256GCM => Box::new(
                |nonce: &[u8], key: &[u8], message: &[u8], aad: &[u8]| -> Result<Vec<u8>, Error> {
                    check_nonce(nonce, 12)?;
                    use aes_gcm::{
                        aead::{Aead, KeyInit, Payload},
                        Aes256Gcm, Nonce,
                    };
                    let nonce = Nonce::from_slice(&nonce[..12]);
                    let aead =
                        Aes256Gcm::new_from_slice(key).map_err(|_| Error::PlugCryptoFailure)?;
                    aead.encrypt(nonce, Payload { msg: message, aad })
                        .map_err(|_| Error::PlugCryptoFailure)
                },
            ),
        }
    }

    /// Generates + invokes crypto of `SymmetricCypherMethod` which perfoms decryption.
    /// Any authentication failure is reported as [`Error::DecryptionFailed`].
    fn decryptor(&self) -> SymmetricCypherMethod {
        match self {
            CryptoAlgorithm::XC20P => Box::new(
                |nonce: &[u8], key: &[u8], message: &[u8], aad: &[u8]| -> Result<Vec<u8>, Error> {
                    check_nonce(nonce, 24)?;
                    use chacha20poly1305::{
                        aead::{Aead, KeyInit, Payload},
                        XChaCha20Poly1305, XNonce,
                    };
                    let aead = XChaCha20Poly1305::new_from_slice(key)
                        .map_err(|_| Error::PlugCryptoFailure)?;
                    let nonce = XNonce::from_slice(&nonce[..24]);
                    aead.decrypt(nonce, Payload { msg: message, aad })
                        .map_err(|_| Error::DecryptionFailed)
                },
            ),
            CryptoAlgorithm::A256GCM => Box::new(
                |nonce: &[u8], key: &[u8], message: &[u8], aad: &[u8]| -> Result<Vec<u8>, Error> {
                    check_nonce(nonce, 12)?;
                    use aes_gcm::{
                        aead::{Aead, KeyInit, Payload},
                        Aes256Gcm, Nonce,
                    };
                    let nonce = Nonce::from_slice(&nonce[..12]);
                    let aead =
                        Aes256Gcm::new_from_slice(key).map_err(|_| Error::PlugCryptoFailure)?;
                    aead.decrypt(nonce, Payload { msg: message, aad })
                        .map_err(|_| Error::DecryptionFailed)
                },
            ),
        }
    }
}

impl TryFrom<&str> for CryptoAlgorithm {
    type Error = Error;
    fn try_from(incoming: &str) -> Result<Self, Error> {
        match incoming {
            "A256GCM" | "ECDH-1PU+A256KW" | "ECDH-ES+A256KW" => Ok(Self::A256GCM),
            "XC20P" | "ECDH-1PU+XC20PKW" | "ECDH-ES+XC20PKW" => Ok(Self::XC20P),
            _ => Err(Error::JweParseError),
        }
    }
}

// inner helper function
fn check_nonce(nonce: &[u8], expected_len: usize) -> Result<(), Error> {
    if nonce.len() < expected_len {
        return Err(Error::PlugCryptoFailure);
    }
    Ok(())
}
