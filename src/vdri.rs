//! DID resolution.
//!
//! Only the parts of a DID document needed for messaging are modeled: public
//! keys and `did-communication` service entries.

use std::{collections::HashMap, sync::RwLock};

use regex::Regex;

use crate::{messages::ReturnRoute, transport::Destination, Error, Result};

/// Service type of DIDComm endpoints.
pub const DIDCOMM_SERVICE_TYPE: &str = "did-communication";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub recipient_keys: Vec<String>,
    #[serde(default)]
    pub routing_keys: Vec<String>,
    pub service_endpoint: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    pub id: String,
    #[serde(rename = "type")]
    pub key_type: String,
    pub controller: String,
    pub public_key_base58: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Doc {
    pub id: String,
    #[serde(default)]
    pub public_key: Vec<PublicKey>,
    #[serde(default)]
    pub service: Vec<Service>,
}

impl Doc {
    /// Highest priority (lowest value) DIDComm service.
    pub fn didcomm_service(&self) -> Option<&Service> {
        self.service
            .iter()
            .filter(|s| s.service_type == DIDCOMM_SERVICE_TYPE)
            .min_by_key(|s| s.priority)
    }
}

pub trait Registry: Send + Sync {
    fn resolve(&self, did: &str) -> Result<Doc>;
}

/// Outbound destination of `did`, taken from its DIDComm service.
pub fn get_destination(did: &str, registry: &dyn Registry) -> Result<Destination> {
    let doc = registry.resolve(did)?;
    let service = doc
        .didcomm_service()
        .ok_or_else(|| Error::Generic(format!("missing DID doc service for {}", did)))?;
    if service.recipient_keys.is_empty() {
        return Err(Error::Generic(format!(
            "missing recipient keys in did-communication service of {}",
            did
        )));
    }
    Ok(Destination {
        service_endpoint: service.service_endpoint.clone(),
        recipient_keys: service.recipient_keys.clone(),
        routing_keys: service.routing_keys.clone(),
        transport_return_route: ReturnRoute::None,
    })
}

/// In memory registry for tests and embedded agents.
pub struct MemRegistry {
    docs: RwLock<HashMap<String, Doc>>,
    did_regex: Regex,
}

impl MemRegistry {
    pub fn new() -> Result<Self> {
        Ok(Self {
            docs: RwLock::new(HashMap::new()),
            did_regex: Regex::new(r"^did:[a-z0-9]+:[a-zA-Z0-9.\-_:%]+")?,
        })
    }

    pub fn store(&self, doc: Doc) -> Result<()> {
        let did = self.did_of(&doc.id)?;
        self.docs
            .write()
            .map_err(|e| Error::Generic(e.to_string()))?
            .insert(did, doc);
        Ok(())
    }

    /// Strips path, query and fragment of a DID URL.
    fn did_of(&self, did_url: &str) -> Result<String> {
        self.did_regex
            .find(did_url)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| Error::DidResolveFailed(did_url.to_string()))
    }
}

impl Registry for MemRegistry {
    fn resolve(&self, did: &str) -> Result<Doc> {
        let did = self.did_of(did)?;
        self.docs
            .read()
            .map_err(|e| Error::Generic(e.to_string()))?
            .get(&did)
            .cloned()
            .ok_or(Error::DidResolveFailed(did))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(did: &str, recipient_keys: Vec<String>) -> Doc {
        Doc {
            id: did.into(),
            public_key: vec![],
            service: vec![
                Service {
                    id: format!("{}#other", did),
                    service_type: "LinkedDomains".into(),
                    service_endpoint: "https://example.com".into(),
                    ..Default::default()
                },
                Service {
                    id: format!("{}#didcomm", did),
                    service_type: DIDCOMM_SERVICE_TYPE.into(),
                    recipient_keys,
                    routing_keys: vec!["router-key".into()],
                    service_endpoint: "https://agent.example.com".into(),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn destination_comes_from_didcomm_service() -> Result<()> {
        let registry = MemRegistry::new()?;
        registry.store(doc("did:example:alice", vec!["alice-key".into()]))?;

        let dest = get_destination("did:example:alice#key-1", &registry)?;
        assert_eq!(dest.service_endpoint, "https://agent.example.com");
        assert_eq!(dest.recipient_keys, vec!["alice-key".to_string()]);
        assert_eq!(dest.routing_keys, vec!["router-key".to_string()]);
        Ok(())
    }

    #[test]
    fn service_without_recipient_keys_is_refused() -> Result<()> {
        let registry = MemRegistry::new()?;
        registry.store(doc("did:example:bob", vec![]))?;
        assert!(get_destination("did:example:bob", &registry).is_err());
        Ok(())
    }

    #[test]
    fn unknown_did_fails_to_resolve() -> Result<()> {
        let registry = MemRegistry::new()?;
        assert!(matches!(
            registry.resolve("did:example:nobody"),
            Err(Error::DidResolveFailed(_))
        ));
        assert!(registry.resolve("not a did").is_err());
        Ok(())
    }
}
