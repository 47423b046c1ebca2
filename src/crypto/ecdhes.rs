//! ECDH-ES key agreement with Concat KDF and AES key wrap (JWA `ECDH-ES+A*KW`).
//!
//! The sender generates an ephemeral key on the recipient's curve, agrees on a
//! shared secret with the recipient's static key, derives a key encryption key
//! and wraps the content encryption key with it. The ephemeral public key
//! travels with the wrapped key so the recipient can derive the same KEK.
//!
//! The sender bound variant (`ECDH-1PU`) appends the static sender agreement
//! to the ephemeral one before key derivation.

use std::{fmt, str::FromStr};

use aes_gcm::aead::generic_array::GenericArray;
use aes_kw::{KekAes128, KekAes192, KekAes256};

use super::kdf::concat_kdf;
use crate::{util::serialization::base64_buffer, Error};

/// Key wrapping algorithm for 256 bit content keys.
pub const A256KW_ALG: &str = "ECDH-ES+A256KW";

/// Sender bound key wrapping algorithm for 256 bit content keys.
pub const A256KW_1PU_ALG: &str = "ECDH-1PU+A256KW";

/// Key type of the NIST curve keys.
pub const EC_KEY_TYPE: &str = "EC";

/// Key type of X25519 keys.
pub const OKP_KEY_TYPE: &str = "OKP";

/// Supported curves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Curve {
    X25519,
    P256,
    P384,
    P521,
}

impl Curve {
    /// Canonical JWK `crv` name.
    pub fn name(&self) -> &'static str {
        match self {
            Curve::X25519 => "X25519",
            Curve::P256 => "P-256",
            Curve::P384 => "P-384",
            Curve::P521 => "P-521",
        }
    }

    /// JWK `kty` of keys on this curve.
    pub fn key_type(&self) -> &'static str {
        match self {
            Curve::X25519 => OKP_KEY_TYPE,
            _ => EC_KEY_TYPE,
        }
    }

    fn ephemeral_agreement(&self, x: &[u8], y: &[u8]) -> Result<Agreement, Error> {
        match self {
            Curve::X25519 => x25519::ephemeral_agreement(x),
            Curve::P256 => nist_p256::ephemeral_agreement(x, y),
            Curve::P384 => nist_p384::ephemeral_agreement(x, y),
            Curve::P521 => nist_p521::ephemeral_agreement(x, y),
        }
    }

    fn static_agreement(&self, d: &[u8], x: &[u8], y: &[u8]) -> Result<Vec<u8>, Error> {
        match self {
            Curve::X25519 => x25519::static_agreement(d, x),
            Curve::P256 => nist_p256::static_agreement(d, x, y),
            Curve::P384 => nist_p384::static_agreement(d, x, y),
            Curve::P521 => nist_p521::static_agreement(d, x, y),
        }
    }

    /// Fails unless `name` names this curve.
    fn check(&self, name: &str) -> Result<(), Error> {
        let other = Curve::from_str(name)?;
        if other != *self {
            return Err(Error::UnsupportedCurve(format!(
                "key on {} does not match key on {}",
                other, self
            )));
        }
        Ok(())
    }
}

impl FromStr for Curve {
    type Err = Error;

    /// Normalizes the names different key formats use for the same curve.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X25519" | "x25519" | "Curve25519" => Ok(Curve::X25519),
            "P-256" | "P256" | "secp256r1" | "NIST_P256" | "EllipticCurveType_NIST_P256" => {
                Ok(Curve::P256)
            }
            "P-384" | "P384" | "secp384r1" | "NIST_P384" | "EllipticCurveType_NIST_P384" => {
                Ok(Curve::P384)
            }
            "P-521" | "P521" | "secp521r1" | "NIST_P521" | "EllipticCurveType_NIST_P521" => {
                Ok(Curve::P521)
            }
            other => Err(Error::UnsupportedCurve(other.to_string())),
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Public key with raw affine coordinates. X25519 keys only carry `x`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct PublicKey {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kid: String,
    #[serde(with = "base64_buffer")]
    pub x: Vec<u8>,
    #[serde(default, with = "base64_buffer")]
    pub y: Vec<u8>,
    pub curve: String,
    #[serde(rename = "type")]
    pub key_type: String,
}

impl PublicKey {
    pub fn x25519(kid: &str, x: &[u8; 32]) -> Self {
        PublicKey {
            kid: kid.to_string(),
            x: x.to_vec(),
            y: vec![],
            curve: Curve::X25519.name().to_string(),
            key_type: OKP_KEY_TYPE.to_string(),
        }
    }
}

/// Private key; `d` is the big-endian scalar, or the raw X25519 secret.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pub public_key: PublicKey,
    #[serde(with = "base64_buffer")]
    pub d: Vec<u8>,
}

impl PrivateKey {
    /// X25519 key pair of the secret `d`.
    pub fn x25519(kid: &str, d: [u8; 32]) -> Self {
        let public = x25519_dalek::PublicKey::from(&x25519_dalek::StaticSecret::from(d));
        PrivateKey {
            public_key: PublicKey::x25519(kid, public.as_bytes()),
            d: d.to_vec(),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Per recipient key material of an envelope.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecipientWrappedKey {
    pub kid: String,
    #[serde(rename = "encryptedCEK", with = "base64_buffer")]
    pub encrypted_cek: Vec<u8>,
    pub epk: PublicKey,
    pub alg: String,
}

/// Generates a static key pair on `curve`.
pub fn generate_key(curve: Curve, kid: &str) -> PrivateKey {
    let (d, x, y) = match curve {
        Curve::X25519 => x25519::generate(),
        Curve::P256 => nist_p256::generate(),
        Curve::P384 => nist_p384::generate(),
        Curve::P521 => nist_p521::generate(),
    };
    PrivateKey {
        public_key: PublicKey {
            kid: kid.to_string(),
            x,
            y,
            curve: curve.name().to_string(),
            key_type: curve.key_type().to_string(),
        },
        d,
    }
}

/// Wraps `cek` for `recipient` using a fresh ephemeral key.
///
/// # Arguments
///
/// * `recipient` - recipient static public key
///
/// * `cek` - content encryption key, a multiple of 8 bytes and at least 16 bytes long
///
/// * `alg` - key wrapping algorithm, used as Concat KDF `AlgorithmID`
///
/// * `key_size_bits` - size of the key encryption key: 128, 192 or 256
pub fn wrap_key(
    recipient: &PublicKey,
    cek: &[u8],
    alg: &str,
    key_size_bits: usize,
) -> Result<RecipientWrappedKey, Error> {
    wrap(recipient, None, cek, alg, key_size_bits)
}

/// Like [`wrap_key`], additionally binding the wrapped key to the static
/// `sender` key. Only [`unwrap_key_from_sender`] with the sender's public key
/// recovers it.
pub fn wrap_key_with_sender(
    recipient: &PublicKey,
    sender: &PrivateKey,
    cek: &[u8],
    alg: &str,
    key_size_bits: usize,
) -> Result<RecipientWrappedKey, Error> {
    wrap(recipient, Some(sender), cek, alg, key_size_bits)
}

fn wrap(
    recipient: &PublicKey,
    sender: Option<&PrivateKey>,
    cek: &[u8],
    alg: &str,
    key_size_bits: usize,
) -> Result<RecipientWrappedKey, Error> {
    let curve = Curve::from_str(&recipient.curve)?;
    let mut agreement = curve.ephemeral_agreement(&recipient.x, &recipient.y)?;
    if let Some(sender) = sender {
        curve.check(&sender.public_key.curve)?;
        let zs = curve.static_agreement(&sender.d, &recipient.x, &recipient.y)?;
        agreement.z.extend(zs);
    }
    let kek = concat_kdf(&agreement.z, alg, None, None, key_size_bits / 8)?;
    let encrypted_cek = key_wrap(&kek, cek)?;
    trace!("wrapped cek for recipient '{}' on {}", recipient.kid, curve);

    Ok(RecipientWrappedKey {
        kid: recipient.kid.clone(),
        encrypted_cek,
        epk: PublicKey {
            kid: String::new(),
            x: agreement.epk_x,
            y: agreement.epk_y,
            curve: curve.name().to_string(),
            key_type: curve.key_type().to_string(),
        },
        alg: alg.to_string(),
    })
}

/// Recovers the content encryption key from `wrapped` with the recipient's private key.
///
/// A wrong private key surfaces as [`Error::DecryptionFailed`] from the AES-KW
/// integrity check.
pub fn unwrap_key(
    recipient: &PrivateKey,
    wrapped: &RecipientWrappedKey,
    key_size_bits: usize,
) -> Result<Vec<u8>, Error> {
    unwrap(recipient, wrapped, None, key_size_bits)
}

/// Counterpart of [`wrap_key_with_sender`]. A key wrapped by anyone else
/// than `sender` fails the integrity check.
pub fn unwrap_key_from_sender(
    recipient: &PrivateKey,
    wrapped: &RecipientWrappedKey,
    sender: &PublicKey,
    key_size_bits: usize,
) -> Result<Vec<u8>, Error> {
    unwrap(recipient, wrapped, Some(sender), key_size_bits)
}

fn unwrap(
    recipient: &PrivateKey,
    wrapped: &RecipientWrappedKey,
    sender: Option<&PublicKey>,
    key_size_bits: usize,
) -> Result<Vec<u8>, Error> {
    let own_curve = Curve::from_str(&recipient.public_key.curve)?;
    own_curve.check(&wrapped.epk.curve)?;
    let mut z = own_curve.static_agreement(&recipient.d, &wrapped.epk.x, &wrapped.epk.y)?;
    if let Some(sender) = sender {
        own_curve.check(&sender.curve)?;
        z.extend(own_curve.static_agreement(&recipient.d, &sender.x, &sender.y)?);
    }
    let kek = concat_kdf(&z, &wrapped.alg, None, None, key_size_bits / 8)?;
    key_unwrap(&kek, &wrapped.encrypted_cek)
}

fn key_wrap(kek: &[u8], cek: &[u8]) -> Result<Vec<u8>, Error> {
    let wrapped = match kek.len() {
        16 => KekAes128::new(GenericArray::from_slice(kek)).wrap_vec(cek),
        24 => KekAes192::new(GenericArray::from_slice(kek)).wrap_vec(cek),
        32 => KekAes256::new(GenericArray::from_slice(kek)).wrap_vec(cek),
        n => return Err(Error::KeyWrap(format!("unsupported key size {} bits", n * 8))),
    };
    wrapped.map_err(|e| Error::KeyWrap(e.to_string()))
}

fn key_unwrap(kek: &[u8], wrapped: &[u8]) -> Result<Vec<u8>, Error> {
    let unwrapped = match kek.len() {
        16 => KekAes128::new(GenericArray::from_slice(kek)).unwrap_vec(wrapped),
        24 => KekAes192::new(GenericArray::from_slice(kek)).unwrap_vec(wrapped),
        32 => KekAes256::new(GenericArray::from_slice(kek)).unwrap_vec(wrapped),
        n => return Err(Error::KeyWrap(format!("unsupported key size {} bits", n * 8))),
    };
    unwrapped.map_err(|_| Error::DecryptionFailed)
}

struct Agreement {
    z: Vec<u8>,
    epk_x: Vec<u8>,
    epk_y: Vec<u8>,
}

/// Left pads a big-endian integer to `size` bytes.
fn pad(bytes: &[u8], size: usize) -> Result<Vec<u8>, Error> {
    if bytes.len() > size {
        return Err(Error::KeyWrap(format!(
            "coordinate of {} bytes exceeds field size {}",
            bytes.len(),
            size
        )));
    }
    let mut padded = vec![0u8; size - bytes.len()];
    padded.extend_from_slice(bytes);
    Ok(padded)
}

mod x25519 {
    use rand::rngs::OsRng;
    use x25519_dalek::{EphemeralSecret, PublicKey, SharedSecret, StaticSecret};

    use super::Agreement;
    use crate::Error;

    fn key_bytes(bytes: &[u8]) -> Result<[u8; 32], Error> {
        bytes
            .try_into()
            .map_err(|_| Error::KeyWrap(format!("X25519 key must be 32 bytes, got {}", bytes.len())))
    }

    fn contributory(shared: SharedSecret) -> Result<Vec<u8>, Error> {
        if !shared.was_contributory() {
            return Err(Error::KeyWrap("low order X25519 public key".into()));
        }
        Ok(shared.as_bytes().to_vec())
    }

    pub(super) fn ephemeral_agreement(x: &[u8]) -> Result<Agreement, Error> {
        let recipient = PublicKey::from(key_bytes(x)?);
        let ephemeral = EphemeralSecret::random_from_rng(OsRng);
        let epk = PublicKey::from(&ephemeral);
        Ok(Agreement {
            z: contributory(ephemeral.diffie_hellman(&recipient))?,
            epk_x: epk.as_bytes().to_vec(),
            epk_y: vec![],
        })
    }

    pub(super) fn static_agreement(d: &[u8], x: &[u8]) -> Result<Vec<u8>, Error> {
        let secret = StaticSecret::from(key_bytes(d)?);
        contributory(secret.diffie_hellman(&PublicKey::from(key_bytes(x)?)))
    }

    pub(super) fn generate() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        (secret.to_bytes().to_vec(), public.as_bytes().to_vec(), vec![])
    }
}

macro_rules! nist_curve {
    ($module:ident, $curve:ident) => {
        mod $module {
            use $curve::{
                ecdh::{diffie_hellman, EphemeralSecret},
                elliptic_curve::sec1::ToEncodedPoint,
                EncodedPoint, FieldBytes, PublicKey, SecretKey,
            };
            use rand::rngs::OsRng;

            use super::{pad, Agreement};
            use crate::Error;

            fn public_key(x: &[u8], y: &[u8]) -> Result<PublicKey, Error> {
                let size = FieldBytes::default().len();
                let x = pad(x, size)?;
                let y = pad(y, size)?;
                let point = EncodedPoint::from_affine_coordinates(
                    FieldBytes::from_slice(&x),
                    FieldBytes::from_slice(&y),
                    false,
                );
                PublicKey::from_sec1_bytes(point.as_bytes())
                    .map_err(|_| Error::KeyWrap("point is not on the curve".into()))
            }

            fn coordinates(key: &PublicKey) -> Result<(Vec<u8>, Vec<u8>), Error> {
                let point = key.to_encoded_point(false);
                match (point.x(), point.y()) {
                    (Some(x), Some(y)) => Ok((x.to_vec(), y.to_vec())),
                    _ => Err(Error::KeyWrap("identity point".into())),
                }
            }

            pub(super) fn ephemeral_agreement(x: &[u8], y: &[u8]) -> Result<Agreement, Error> {
                let recipient = public_key(x, y)?;
                let ephemeral = EphemeralSecret::random(&mut OsRng);
                let shared = ephemeral.diffie_hellman(&recipient);
                let (epk_x, epk_y) = coordinates(&ephemeral.public_key())?;
                Ok(Agreement {
                    z: shared.raw_secret_bytes().to_vec(),
                    epk_x,
                    epk_y,
                })
            }

            pub(super) fn static_agreement(d: &[u8], x: &[u8], y: &[u8]) -> Result<Vec<u8>, Error> {
                let sender = public_key(x, y)?;
                let d = pad(d, FieldBytes::default().len())?;
                let secret = SecretKey::from_slice(&d)
                    .map_err(|_| Error::KeyWrap("invalid private scalar".into()))?;
                let shared = diffie_hellman(secret.to_nonzero_scalar(), sender.as_affine());
                Ok(shared.raw_secret_bytes().to_vec())
            }

            pub(super) fn generate() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
                let secret = SecretKey::random(&mut OsRng);
                let point = secret.public_key().to_encoded_point(false);
                let x = point.x().map(|x| x.to_vec()).unwrap_or_default();
                let y = point.y().map(|y| y.to_vec()).unwrap_or_default();
                (secret.to_bytes().to_vec(), x, y)
            }
        }
    };
}

nist_curve!(nist_p256, p256);
nist_curve!(nist_p384, p384);
nist_curve!(nist_p521, p521);
