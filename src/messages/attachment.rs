use crate::{util::from_base64, util::to_base64, Error, Result};

/// Aries attachment (`~attach`) as embedded by protocol messages.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Attachment {
    #[serde(rename = "@id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "mime-type", default, skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_count: Option<usize>,
    pub data: AttachmentData,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct AttachmentData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jws: Option<serde_json::Value>,
}

impl Attachment {
    /// JSON attachment carrying `payload` base64url encoded.
    pub fn base64_json(payload: &[u8]) -> Self {
        Attachment {
            id: uuid::Uuid::new_v4().to_string(),
            mime_type: "application/json".into(),
            data: AttachmentData {
                base64: Some(to_base64(payload)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Decoded `data.base64` content.
    pub fn decoded(&self) -> Result<Vec<u8>> {
        let encoded = self
            .data
            .base64
            .as_deref()
            .ok_or_else(|| Error::Generic(format!("attachment {} has no base64 data", self.id)))?;
        from_base64(encoded)
    }
}
