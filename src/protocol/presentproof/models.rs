use crate::messages::Attachment;

/// Present-proof message family.
pub const PRESENT_PROOF_SPEC: &str = "https://didcomm.org/present-proof/2.0/";
pub const PROPOSE_PRESENTATION_MSG_TYPE: &str = "https://didcomm.org/present-proof/2.0/propose-presentation";
pub const REQUEST_PRESENTATION_MSG_TYPE: &str = "https://didcomm.org/present-proof/2.0/request-presentation";
pub const PRESENTATION_MSG_TYPE: &str = "https://didcomm.org/present-proof/2.0/presentation";
pub const ACK_MSG_TYPE: &str = "https://didcomm.org/present-proof/2.0/ack";
pub const PROBLEM_REPORT_MSG_TYPE: &str = "https://didcomm.org/present-proof/2.0/problem-report";

/// Attachment format identifier.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Format {
    pub attach_id: String,
    pub format: String,
}

/// Prover's offer of what it could present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ProposePresentation {
    #[serde(rename = "@type")]
    pub msg_type: String,
    #[serde(rename = "@id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<Format>,
    #[serde(rename = "proposals~attach", default, skip_serializing_if = "Vec::is_empty")]
    pub proposals: Vec<Attachment>,
}

/// Verifier's request for a presentation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RequestPresentation {
    #[serde(rename = "@type")]
    pub msg_type: String,
    #[serde(rename = "@id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default)]
    pub will_confirm: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<Format>,
    #[serde(rename = "request_presentations~attach", default, skip_serializing_if = "Vec::is_empty")]
    pub request_presentations: Vec<Attachment>,
}

/// Prover's presentation, carried as base64 attachments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Presentation {
    #[serde(rename = "@type")]
    pub msg_type: String,
    #[serde(rename = "@id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<Format>,
    #[serde(rename = "presentations~attach", default)]
    pub presentations: Vec<Attachment>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Ack {
    #[serde(rename = "@type")]
    pub msg_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    pub status: String,
}

impl Ack {
    pub fn new() -> Self {
        Ack {
            msg_type: ACK_MSG_TYPE.into(),
            id: uuid::Uuid::new_v4().to_string(),
            status: "OK".into(),
        }
    }
}

/// Input supplied when continuing a suspended protocol instance.
#[derive(Debug, Clone, Default)]
pub struct ContinueOptions {
    pub(crate) presentation: Option<Presentation>,
    pub(crate) propose_presentation: Option<ProposePresentation>,
    pub(crate) request_presentation: Option<RequestPresentation>,
    pub(crate) presentation_names: Vec<String>,
}

impl ContinueOptions {
    /// Presentation to send in response to a request.
    pub fn with_presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = Some(presentation);
        self
    }

    /// Counter proposal to send instead of a presentation.
    pub fn with_propose_presentation(mut self, propose: ProposePresentation) -> Self {
        self.propose_presentation = Some(propose);
        self
    }

    /// Request to send in response to a proposal.
    pub fn with_request_presentation(mut self, request: RequestPresentation) -> Self {
        self.request_presentation = Some(request);
        self
    }

    /// Names to store received presentations under, in attachment order.
    pub fn with_presentation_names(mut self, names: Vec<String>) -> Self {
        self.presentation_names = names;
        self
    }
}
