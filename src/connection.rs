//! Connection records shared by the protocol services.

use std::sync::Arc;

use crate::{
    storage::{StorageProvider, Store},
    Result, ResultExt,
};

/// Store namespace of connection records.
pub const NAMESPACE: &str = "didexchange";

const CONN_KEY_PREFIX: &str = "conn_";
const DID_CONN_KEY_PREFIX: &str = "didconn_";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    #[serde(rename = "connectionID")]
    pub connection_id: String,
    #[serde(rename = "myDID")]
    pub my_did: String,
    #[serde(rename = "theirDID")]
    pub their_did: String,
}

/// Read and write access to connection records.
#[derive(Clone)]
pub struct ConnectionLookup {
    store: Arc<dyn Store>,
}

impl ConnectionLookup {
    pub fn new(provider: &dyn StorageProvider) -> Result<Self> {
        Ok(Self {
            store: provider
                .open_store(NAMESPACE)
                .context("failed to open connection store")?,
        })
    }

    pub fn get_connection_record(&self, connection_id: &str) -> Result<ConnectionRecord> {
        let bytes = self
            .store
            .get(&format!("{}{}", CONN_KEY_PREFIX, connection_id))
            .context(format!("connection record {}", connection_id))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Connection ID of the pairwise connection `my_did` <-> `their_did`.
    pub fn get_connection_id_by_dids(&self, my_did: &str, their_did: &str) -> Result<String> {
        let bytes = self
            .store
            .get(&did_conn_key(my_did, their_did))
            .context("connection id by DIDs")?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn save_connection_record(&self, record: &ConnectionRecord) -> Result<()> {
        self.store.put(
            &format!("{}{}", CONN_KEY_PREFIX, record.connection_id),
            &serde_json::to_vec(record)?,
        )?;
        self.store.put(
            &did_conn_key(&record.my_did, &record.their_did),
            record.connection_id.as_bytes(),
        )
    }
}

fn did_conn_key(my_did: &str, their_did: &str) -> String {
    format!("{}{}_{}", DID_CONN_KEY_PREFIX, my_did, their_did)
}
