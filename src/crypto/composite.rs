//! Multi recipient authenticated encryption built on [`ecdhes`](super::ecdhes).
//!
//! Content is sealed once with a random content encryption key, which is then
//! wrapped separately for every recipient.

use super::{
    ecdhes::{unwrap_key, wrap_key, PrivateKey, PublicKey, RecipientWrappedKey, A256KW_ALG},
    CryptoAlgorithm, Cypher,
};
use crate::{util::serialization::base64_buffer, Error};

const KEY_SIZE_BITS: usize = 256;

/// Serialized form of a composite ciphertext.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EncryptedData {
    #[serde(rename = "encAlg")]
    pub enc_alg: String,
    #[serde(with = "base64_buffer")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "base64_buffer")]
    pub iv: Vec<u8>,
    #[serde(with = "base64_buffer")]
    pub tag: Vec<u8>,
    pub recipients: Vec<RecipientWrappedKey>,
}

/// Encrypts for a fixed set of recipient keys.
pub struct CompositeEncrypt {
    recipients: Vec<PublicKey>,
    enc: CryptoAlgorithm,
}

impl CompositeEncrypt {
    pub fn new(recipients: Vec<PublicKey>) -> Self {
        Self {
            recipients,
            enc: CryptoAlgorithm::A256GCM,
        }
    }

    /// Seals `plaintext` and returns the JSON encoded [`EncryptedData`].
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
        if self.recipients.is_empty() {
            return Err(Error::Generic("no recipients to encrypt for".into()));
        }
        let cek = self.enc.generate_key();
        let iv = self.enc.generate_nonce();
        let mut sealed = self.enc.encryptor()(&iv, &cek, plaintext, aad)?;
        let tag = sealed.split_off(sealed.len() - self.enc.tag_size());

        let recipients = self
            .recipients
            .iter()
            .map(|recipient| wrap_key(recipient, &cek, A256KW_ALG, KEY_SIZE_BITS))
            .collect::<Result<Vec<_>, Error>>()?;

        let data = EncryptedData {
            enc_alg: self.enc.name().to_string(),
            ciphertext: sealed,
            iv,
            tag,
            recipients,
        };
        Ok(serde_json::to_vec(&data)?)
    }
}

/// Decrypts with any of the held private keys.
pub struct CompositeDecrypt {
    keys: Vec<PrivateKey>,
}

impl CompositeDecrypt {
    pub fn new(keys: Vec<PrivateKey>) -> Self {
        Self { keys }
    }

    /// Tries the recipient entries whose `kid` matches a held key first, then
    /// every other pairing. Fails with [`Error::DecryptionFailed`] if none opens.
    pub fn decrypt(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
        let data: EncryptedData = serde_json::from_slice(ciphertext)?;
        let enc = CryptoAlgorithm::try_from(data.enc_alg.as_str())?;

        let (matching, rest): (Vec<_>, Vec<_>) = self
            .keys
            .iter()
            .flat_map(|key| data.recipients.iter().map(move |rec| (key, rec)))
            .partition(|(key, rec)| !rec.kid.is_empty() && key.public_key.kid == rec.kid);

        let mut sealed = data.ciphertext.clone();
        sealed.extend_from_slice(&data.tag);

        for (key, recipient) in matching.into_iter().chain(rest) {
            let cek = match unwrap_key(key, recipient, KEY_SIZE_BITS) {
                Ok(cek) => cek,
                Err(_) => continue,
            };
            // the CEK unwrapped, so a failure here means the content was tampered with
            return enc.decryptor()(&data.iv, &cek, &sealed, aad);
        }

        Err(Error::DecryptionFailed)
    }
}
