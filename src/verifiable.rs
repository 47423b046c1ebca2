//! Verifiable presentations: the parse capability protocols rely on and a
//! store for received presentations.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    storage::{prefix_end, StorageProvider, Store},
    Error, Result, ResultExt,
};

/// Store namespace of verifiable data.
pub const NAMESPACE: &str = "verifiable";

const PRESENTATION_NAME_KEY: &str = "vpname_";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(one) => vec![one],
        OneOrMany::Many(many) => many,
    })
}

/// Verifiable presentation. Only the fields needed for indexing are typed,
/// everything else (credentials, proofs) is kept as is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Presentation {
    #[serde(rename = "@context", default, deserialize_with = "one_or_many")]
    pub context: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "one_or_many")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub holder: String,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Turns raw presentation bytes into a [`Presentation`]; proof checking
/// belongs to the implementation.
pub trait PresentationParser: Send + Sync {
    fn parse_presentation(&self, raw: &[u8]) -> Result<Presentation>;
}

/// Parses plain JSON presentations without verifying proofs.
#[derive(Default)]
pub struct JsonPresentationParser;

impl PresentationParser for JsonPresentationParser {
    fn parse_presentation(&self, raw: &[u8]) -> Result<Presentation> {
        let vp: Presentation = serde_json::from_slice(raw)?;
        if !vp.types.iter().any(|t| t == "VerifiablePresentation") {
            return Err(Error::Generic(
                "presentation type must include VerifiablePresentation".into(),
            ));
        }
        Ok(vp)
    }
}

/// Index entry of a named presentation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(skip)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject_id: String,
}

pub trait VerifiableStore: Send + Sync {
    /// Saves `vp` under the unique `name`.
    fn save_presentation(&self, name: &str, vp: &Presentation) -> Result<()>;

    fn get_presentation(&self, id: &str) -> Result<Presentation>;

    fn get_presentation_id_by_name(&self, name: &str) -> Result<String>;

    /// All named presentations.
    fn get_presentations(&self) -> Result<Vec<Record>>;
}

/// [`VerifiableStore`] over a [`Store`] namespace.
pub struct PresentationStore {
    store: Arc<dyn Store>,
}

impl PresentationStore {
    pub fn new(provider: &dyn StorageProvider) -> Result<Self> {
        Ok(Self {
            store: provider
                .open_store(NAMESPACE)
                .context("failed to open vc store")?,
        })
    }
}

fn presentation_name_key(name: &str) -> String {
    format!("{}{}", PRESENTATION_NAME_KEY, name)
}

impl VerifiableStore for PresentationStore {
    fn save_presentation(&self, name: &str, vp: &Presentation) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Generic("presentation name is mandatory".into()));
        }
        match self.get_presentation_id_by_name(name) {
            Ok(_) => return Err(Error::Generic("presentation name already exists".into())),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.context("get presentation id using name")),
        }

        let id = match vp.id.as_str() {
            // VP ids are optional
            "" => uuid::Uuid::new_v4().to_string(),
            id => id.to_string(),
        };
        let record = Record {
            name: name.into(),
            id: id.clone(),
            context: vp.context.clone(),
            types: vp.types.clone(),
            subject_id: vp.holder.clone(),
        };

        self.store
            .put(&id, &serde_json::to_vec(vp)?)
            .context("failed to put vp")?;
        self.store
            .put(&presentation_name_key(name), &serde_json::to_vec(&record)?)
            .context("store vp name to id map")
    }

    fn get_presentation(&self, id: &str) -> Result<Presentation> {
        let bytes = self.store.get(id).context("failed to get vp")?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn get_presentation_id_by_name(&self, name: &str) -> Result<String> {
        let bytes = self
            .store
            .get(&presentation_name_key(name))
            .context("fetch presentation id based on name")?;
        let record: Record = serde_json::from_slice(&bytes)?;
        Ok(record.id)
    }

    fn get_presentations(&self) -> Result<Vec<Record>> {
        let start = presentation_name_key("");
        self.store
            .iterate(&start, &prefix_end(&start))?
            .map(|(key, value)| -> Result<Record> {
                let mut record: Record = serde_json::from_slice(&value)?;
                record.name = key[PRESENTATION_NAME_KEY.len()..].to_string();
                Ok(record)
            })
            .collect()
    }
}
