/// Code reported when a protocol instance failed on our side.
pub const CODE_INTERNAL_ERROR: &str = "internal";
/// Code reported when the user refused to continue.
pub const CODE_REJECTED_ERROR: &str = "rejected";

/// Problem report sent when a protocol instance is abandoned.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProblemReport {
    #[serde(rename = "@type")]
    pub msg_type: String,
    #[serde(rename = "@id", default)]
    pub id: String,
    pub description: Code,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Code {
    pub code: String,
}

impl ProblemReport {
    /// Report of `msg_type` (protocol specific) carrying `code`.
    pub fn new(msg_type: &str, code: &str) -> Self {
        ProblemReport {
            msg_type: msg_type.into(),
            id: uuid::Uuid::new_v4().to_string(),
            description: Code { code: code.into() },
        }
    }

    pub fn code(&self) -> &str {
        &self.description.code
    }
}
