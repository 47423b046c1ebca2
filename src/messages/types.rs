/// Media types of messages and envelopes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    #[serde(rename = "JWM/1.0")]
    Jwm,
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "application/ld+json")]
    JsonLd,
    #[serde(rename = "jwk+json")]
    JwkJson,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Jwm => "JWM/1.0",
            MediaType::Json => "application/json",
            MediaType::JsonLd => "application/ld+json",
            MediaType::JwkJson => "jwk+json",
        }
    }
}
