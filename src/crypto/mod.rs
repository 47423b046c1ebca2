//! Collection of utilities for cryptography related components.
pub mod composite;
pub mod ecdhes;
pub mod encryptor;
pub mod kdf;

pub use encryptor::CryptoAlgorithm;

pub use crate::Error;

/// Return `Fn` signature definition for symmetric cryptography method.
/// Arguments sequence: Nonce, Key, Message, Additional authenticated data.
pub type SymmetricCypherMethod = Box<dyn Fn(&[u8], &[u8], &[u8], &[u8]) -> Result<Vec<u8>, Error>>;

/// Trait must be implemented for pluggable cryptography.
/// Implemented by `CryptoAlgorithm`.
pub trait Cypher {
    fn encryptor(&self) -> SymmetricCypherMethod;
    fn decryptor(&self) -> SymmetricCypherMethod;
}
