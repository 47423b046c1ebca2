use std::{convert::TryFrom, sync::Arc};

use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use super::{
    jwe::{Jwe, ProtectedHeader, Recipient, RecipientHeader, ENVELOPE_TYPE},
    Envelope, Packager,
};
use crate::{
    crypto::{
        ecdhes::{self, RecipientWrappedKey, A256KW_1PU_ALG, A256KW_ALG},
        kdf::concat_kdf,
        CryptoAlgorithm, Cypher,
    },
    kms::KeyManager,
    messages::{Jwk, MediaType},
    util::{from_base64, to_base58, to_base64, verkey_to_x25519, Logger},
    Error, Result, ResultExt,
};

const AUTHCRYPT: &str = "Authcrypt";
const ANONCRYPT: &str = "Anoncrypt";
const KEK_SIZE_BITS: usize = 256;

/// X25519 envelope packer backed by a [`KeyManager`].
///
/// The payload is sealed once with a random content key. Each recipient gets
/// the content key wrapped through [`ecdhes`] (sender bound for authcrypt),
/// plus the sender's key sealed in a compact JWE (`spk`) so the recipient can
/// recompute the agreement.
pub struct Packer {
    kms: Arc<dyn KeyManager>,
    enc: CryptoAlgorithm,
    log: Logger,
}

impl Packer {
    pub fn new(kms: Arc<dyn KeyManager>, enc: CryptoAlgorithm) -> Self {
        Self {
            kms,
            enc,
            log: Logger::new("didcomm/packer"),
        }
    }

    fn seal(&self, nonce: &[u8], key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut sealed = self.enc.encryptor()(nonce, key, plaintext, aad)?;
        let tag = sealed.split_off(sealed.len() - self.enc.tag_size());
        Ok((sealed, tag))
    }

    fn wrap_cek(
        &self,
        cek: &[u8],
        recipient_verkey: &str,
        sender: Option<&(ecdhes::PrivateKey, [u8; 32])>,
    ) -> Result<Recipient> {
        let recipient_key = verkey_to_x25519(recipient_verkey)?;
        let recipient = ecdhes::PublicKey::x25519(recipient_verkey, &recipient_key);
        let (wrapped, spk) = match sender {
            Some((sender, public)) => (
                ecdhes::wrap_key_with_sender(&recipient, sender, cek, A256KW_1PU_ALG, KEK_SIZE_BITS)?,
                Some(self.seal_sender_key(public, &PublicKey::from(recipient_key))?),
            ),
            None => (ecdhes::wrap_key(&recipient, cek, A256KW_ALG, KEK_SIZE_BITS)?, None),
        };
        let epk: [u8; 32] = wrapped
            .epk
            .x
            .as_slice()
            .try_into()
            .map_err(|_| Error::KeyWrap("ephemeral key must be 32 bytes".into()))?;

        Ok(Recipient {
            encrypted_key: to_base64(&wrapped.encrypted_cek),
            header: RecipientHeader {
                kid: wrapped.kid,
                alg: wrapped.alg,
                epk: Jwk::x25519(&epk, ""),
                spk,
            },
        })
    }

    fn unwrap_cek(&self, recipient: &Recipient, private: [u8; 32], sender: Option<&[u8; 32]>) -> Result<Vec<u8>> {
        let own = ecdhes::PrivateKey::x25519(&recipient.header.kid, private);
        let wrapped = RecipientWrappedKey {
            kid: recipient.header.kid.clone(),
            encrypted_cek: from_base64(&recipient.encrypted_key)?,
            epk: ecdhes::PublicKey::x25519("", &recipient.header.epk.public_key()?),
            alg: recipient.header.alg.clone(),
        };
        match sender {
            Some(sender) => ecdhes::unwrap_key_from_sender(
                &own,
                &wrapped,
                &ecdhes::PublicKey::x25519("", sender),
                KEK_SIZE_BITS,
            ),
            None => ecdhes::unwrap_key(&own, &wrapped, KEK_SIZE_BITS),
        }
    }

    /// Compact JWE `header.cipherKEK.nonce.cipherJWK.tag` carrying the sender key.
    fn seal_sender_key(&self, sender: &[u8; 32], recipient: &PublicKey) -> Result<String> {
        let ephemeral = EphemeralSecret::random_from_rng(OsRng);
        let epk = PublicKey::from(&ephemeral);
        let alg = self.enc.key_wrap_alg(false);
        let z = ephemeral.diffie_hellman(recipient);
        let kek = concat_kdf(z.as_bytes(), alg, None, None, self.enc.key_size())?;

        let sym_key = self.enc.generate_key();
        let kek_iv = self.enc.generate_nonce();
        let (cipher_kek, kek_tag) = self.seal(&kek_iv, &kek, &sym_key, &[])?;

        let header = SpkHeader {
            typ: ENVELOPE_TYPE.into(),
            cty: MediaType::JwkJson.as_str().into(),
            alg: alg.into(),
            enc: self.enc.name().into(),
            epk: Jwk::x25519(epk.as_bytes(), ""),
            iv: to_base64(&kek_iv),
            tag: to_base64(&kek_tag),
        };
        let encoded_header = to_base64(serde_json::to_vec(&header)?);

        let jwk = serde_json::to_vec(&Jwk::x25519(sender, &to_base58(sender)))?;
        let nonce = self.enc.generate_nonce();
        let (cipher_jwk, tag) = self.seal(&nonce, &sym_key, &jwk, encoded_header.as_bytes())?;

        Ok([
            encoded_header,
            to_base64(cipher_kek),
            to_base64(nonce),
            to_base64(cipher_jwk),
            to_base64(tag),
        ]
        .join("."))
    }

    fn open_sender_key(&self, spk: &str, recipient: &StaticSecret) -> Result<[u8; 32]> {
        let parts: Vec<&str> = spk.split('.').collect();
        if parts.len() != 5 {
            return Err(Error::BadSpkFormat);
        }
        let header: SpkHeader = serde_json::from_slice(&from_base64(parts[0])?)
            .map_err(|_| Error::BadSpkFormat)?;
        let enc = CryptoAlgorithm::try_from(header.enc.as_str())?;

        let epk = PublicKey::from(header.epk.public_key()?);
        let z = recipient.diffie_hellman(&epk);
        let kek = concat_kdf(z.as_bytes(), &header.alg, None, None, enc.key_size())?;

        let mut cipher_kek = from_base64(parts[1])?;
        cipher_kek.extend(from_base64(&header.tag)?);
        let sym_key = enc.decryptor()(&from_base64(&header.iv)?, &kek, &cipher_kek, &[])?;

        let mut cipher_jwk = from_base64(parts[3])?;
        cipher_jwk.extend(from_base64(parts[4])?);
        let jwk = enc.decryptor()(
            &from_base64(parts[2])?,
            &sym_key,
            &cipher_jwk,
            parts[0].as_bytes(),
        )?;
        let jwk: Jwk = serde_json::from_slice(&jwk).map_err(|_| Error::BadSpkFormat)?;
        jwk.public_key()
    }

    /// First recipient entry whose key is held by the kms.
    fn find_recipient<'a>(&self, jwe: &'a Jwe) -> Result<(&'a Recipient, [u8; 32])> {
        jwe.recipients
            .iter()
            .find_map(|recipient| {
                self.kms
                    .private_key(&recipient.header.kid)
                    .ok()
                    .map(|key| (recipient, key))
            })
            .ok_or(Error::DataNotFound)
            .context("no recipient key of the envelope was found in the kms")
    }
}

#[derive(Serialize, Deserialize)]
struct SpkHeader {
    typ: String,
    cty: String,
    alg: String,
    enc: String,
    epk: Jwk,
    iv: String,
    tag: String,
}

impl Packager for Packer {
    fn pack_message(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        if envelope.to_verkeys.is_empty() {
            return Err(Error::Generic("no recipients to pack for".into()));
        }
        let sender = match envelope.from_verkey.is_empty() {
            true => None,
            false => {
                let public: [u8; 32] = envelope
                    .from_verkey
                    .clone()
                    .try_into()
                    .map_err(|_| Error::Generic("sender key must be 32 bytes".into()))?;
                let verkey = to_base58(public);
                let secret = self.kms.private_key(&verkey).context("sender key")?;
                Some((ecdhes::PrivateKey::x25519(&verkey, secret), public))
            }
        };

        let header = ProtectedHeader {
            typ: ENVELOPE_TYPE.into(),
            alg: if sender.is_some() { AUTHCRYPT } else { ANONCRYPT }.into(),
            enc: self.enc.name().into(),
        };

        let mut sorted = envelope.to_verkeys.clone();
        sorted.sort();
        let aad = to_base64(Sha256::digest(sorted.join(".").as_bytes()));

        let cek = self.enc.generate_key();
        let recipients = envelope
            .to_verkeys
            .iter()
            .map(|verkey| self.wrap_cek(&cek, verkey, sender.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let protected = header.encode()?;
        let payload_aad = format!("{}.{}", protected, aad);
        let iv = self.enc.generate_nonce();
        let (ciphertext, tag) = self.seal(&iv, &cek, &envelope.message, payload_aad.as_bytes())?;
        let jwe = Jwe::new(protected, recipients, aad, &iv, tag, ciphertext);

        trace!(
            target: self.log.target(),
            "packed {} envelope for {} recipient(s)",
            header.alg,
            envelope.to_verkeys.len()
        );
        Ok(serde_json::to_vec(&jwe)?)
    }

    fn unpack_message(&self, packed: &[u8]) -> Result<Envelope> {
        let jwe: Jwe = serde_json::from_slice(packed).map_err(|_| Error::JweParseError)?;
        let header = jwe.protected_header()?;
        let enc = CryptoAlgorithm::try_from(header.enc.as_str())?;
        let authenticated = match header.alg.as_str() {
            AUTHCRYPT => true,
            ANONCRYPT => false,
            _ => return Err(Error::JweParseError),
        };

        let (recipient, private) = self.find_recipient(&jwe)?;
        let expected_alg = if authenticated { A256KW_1PU_ALG } else { A256KW_ALG };
        if recipient.header.alg != expected_alg {
            return Err(Error::JweParseError);
        }

        let sender = match (authenticated, recipient.header.spk.as_deref()) {
            (true, Some(spk)) => Some(self.open_sender_key(spk, &StaticSecret::from(private))?),
            (true, None) => return Err(Error::BadSpkFormat),
            (false, _) => None,
        };
        let cek = self.unwrap_cek(recipient, private, sender.as_ref())?;

        let message = enc.decryptor()(
            &jwe.get_iv()?,
            &cek,
            &jwe.sealed_payload()?,
            jwe.payload_aad().as_bytes(),
        )?;

        trace!(target: self.log.target(), "unpacked {} envelope for {}", header.alg, recipient.header.kid);
        Ok(Envelope {
            message,
            from_verkey: sender.map(|s| s.to_vec()).unwrap_or_default(),
            to_verkeys: vec![recipient.header.kid.clone()],
        })
    }
}
