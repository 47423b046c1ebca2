use crate::{
    messages::Jwk,
    util::{from_base64, to_base64},
    Error, Result,
};

/// `typ` of packed envelopes.
pub const ENVELOPE_TYPE: &str = "JWM/1.0";

/// Protected header shared by all recipients, carried base64url encoded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProtectedHeader {
    pub typ: String,
    /// `Authcrypt` or `Anoncrypt`.
    pub alg: String,
    pub enc: String,
}

impl ProtectedHeader {
    /// Base64url encoded JSON, as carried in [`Jwe::protected`].
    pub fn encode(&self) -> Result<String> {
        Ok(to_base64(serde_json::to_vec(self)?))
    }
}

/// Per recipient header.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecipientHeader {
    /// Recipient verkey (base58).
    pub kid: String,
    /// Key wrapping algorithm of `encrypted_key`.
    pub alg: String,
    pub epk: Jwk,
    /// Sender key sealed for the recipient; absent for anoncrypt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spk: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub encrypted_key: String,
    pub header: RecipientHeader,
}

/// JSON serialized JWE envelope with one entry per recipient.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Jwe {
    pub protected: String,
    pub recipients: Vec<Recipient>,
    pub aad: String,
    iv: String,
    tag: String,
    ciphertext: String,
}

impl Jwe {
    /// Constructor, which should be used after message is encrypted.
    pub fn new(
        protected: String,
        recipients: Vec<Recipient>,
        aad: String,
        iv: impl AsRef<[u8]>,
        tag: impl AsRef<[u8]>,
        ciphertext: impl AsRef<[u8]>,
    ) -> Self {
        Jwe {
            protected,
            recipients,
            aad,
            iv: to_base64(iv),
            tag: to_base64(tag),
            ciphertext: to_base64(ciphertext),
        }
    }

    /// Decoded protected header.
    pub fn protected_header(&self) -> Result<ProtectedHeader> {
        let decoded = from_base64(&self.protected).map_err(|_| Error::JweParseError)?;
        serde_json::from_slice(&decoded).map_err(|_| Error::JweParseError)
    }

    /// Additional authenticated data of the payload: `protected.aad`.
    pub fn payload_aad(&self) -> String {
        format!("{}.{}", self.protected, self.aad)
    }

    /// Getter for ciphered payload with its tag appended.
    pub fn sealed_payload(&self) -> Result<Vec<u8>> {
        let mut sealed = from_base64(&self.ciphertext)?;
        sealed.extend(from_base64(&self.tag)?);
        Ok(sealed)
    }

    /// `iv` getter
    pub fn get_iv(&self) -> Result<Vec<u8>> {
        from_base64(&self.iv)
    }
}
