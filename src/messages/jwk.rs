use crate::{util::from_base64, util::to_base64, Error, Result};

/// Octet key pair JWK (RFC 8037), used for X25519 envelope keys.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kid: String,
}

impl Jwk {
    /// X25519 public key as JWK.
    pub fn x25519(public: &[u8; 32], kid: &str) -> Self {
        Jwk {
            kty: "OKP".into(),
            crv: "X25519".into(),
            x: to_base64(public),
            kid: kid.into(),
        }
    }

    /// Raw X25519 public key.
    pub fn public_key(&self) -> Result<[u8; 32]> {
        if self.kty != "OKP" || self.crv != "X25519" {
            return Err(Error::UnsupportedCurve(format!("{}/{}", self.kty, self.crv)));
        }
        from_base64(&self.x)?
            .try_into()
            .map_err(|_| Error::Generic("X25519 key must be 32 bytes".into()))
    }
}
