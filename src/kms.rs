//! Local key management for envelope keys.
//!
//! Key sets are X25519 key pairs addressed by their base58 encoded public key
//! (the verification key, or verkey). Private halves never leave the store
//! except through [`KeyManager::private_key`] for the packer.

use std::sync::Arc;

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::{
    storage::{StorageProvider, Store},
    util::{serialization::base64_buffer, to_base58, Logger},
    Error, Result, ResultExt,
};

/// Store namespace of [`LocalKms`].
pub const NAMESPACE: &str = "kmsdb";

pub trait KeyManager: Send + Sync {
    /// Creates a new key set and returns its verkey.
    fn create_key_set(&self) -> Result<String>;

    /// Private key of the key set addressed by `verkey`.
    fn private_key(&self, verkey: &str) -> Result<[u8; 32]>;
}

#[derive(Serialize, Deserialize)]
struct KeySet {
    #[serde(with = "base64_buffer")]
    public: Vec<u8>,
    #[serde(with = "base64_buffer")]
    private: Vec<u8>,
}

/// [`KeyManager`] persisting key sets in a [`Store`].
pub struct LocalKms {
    store: Arc<dyn Store>,
    log: Logger,
}

impl LocalKms {
    pub fn new(provider: &dyn StorageProvider) -> Result<Self> {
        let store = provider
            .open_store(NAMESPACE)
            .context("failed to open kms store")?;
        Ok(Self {
            store,
            log: Logger::new("didcomm/kms"),
        })
    }

    /// Stores an existing private key, returning its verkey.
    pub fn import_key(&self, private: [u8; 32]) -> Result<String> {
        let secret = StaticSecret::from(private);
        self.save(&secret)
    }

    fn save(&self, secret: &StaticSecret) -> Result<String> {
        let public = PublicKey::from(secret);
        let verkey = to_base58(public.as_bytes());
        let set = KeySet {
            public: public.as_bytes().to_vec(),
            private: secret.to_bytes().to_vec(),
        };
        self.store
            .put(&verkey, &serde_json::to_vec(&set)?)
            .context("failed to put key set")?;
        debug!(target: self.log.target(), "stored key set {}", verkey);
        Ok(verkey)
    }
}

impl KeyManager for LocalKms {
    fn create_key_set(&self) -> Result<String> {
        let secret = StaticSecret::random_from_rng(OsRng);
        self.save(&secret)
    }

    fn private_key(&self, verkey: &str) -> Result<[u8; 32]> {
        let bytes = self
            .store
            .get(verkey)
            .context(format!("key set {} not found", verkey))?;
        let set: KeySet = serde_json::from_slice(&bytes)?;
        set.private
            .try_into()
            .map_err(|_| Error::Generic(format!("key set {} is corrupted", verkey)))
    }
}
