use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};

use super::{StorageProvider, Store, StoreIterator};
use crate::{Error, Result};

/// In-memory [`Store`] ordered by key.
#[derive(Default)]
pub struct MemStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Store("lock poisoned".into())
}

impl Store for MemStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.entries
            .read()
            .map_err(poisoned)?
            .get(key)
            .cloned()
            .ok_or(Error::DataNotFound)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Store("key is mandatory".into()));
        }
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn iterate(&self, start: &str, end: &str) -> Result<StoreIterator> {
        if start > end {
            return Ok(Box::new(std::iter::empty()));
        }
        // snapshot, the lock is not held while the caller iterates
        let snapshot: Vec<(String, Vec<u8>)> = self
            .entries
            .read()
            .map_err(poisoned)?
            .range(start.to_string()..end.to_string())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(snapshot.into_iter()))
    }
}

/// Hands out one shared [`MemStore`] per name.
#[derive(Default)]
pub struct MemStoreProvider {
    stores: RwLock<HashMap<String, Arc<MemStore>>>,
}

impl MemStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageProvider for MemStoreProvider {
    fn open_store(&self, name: &str) -> Result<Arc<dyn Store>> {
        let mut stores = self.stores.write().map_err(poisoned)?;
        let store = stores
            .entry(name.to_lowercase())
            .or_insert_with(|| Arc::new(MemStore::new()))
            .clone();
        Ok(store)
    }
}
