//! Key-value storage seam.
//!
//! Protocol services persist their state through [`Store`]; the backend is
//! chosen by whoever builds the [`StorageProvider`].

mod mem;

use std::sync::Arc;

pub use mem::{MemStore, MemStoreProvider};

use crate::Result;

/// Appended to a prefix to build the exclusive upper bound of a prefix scan.
pub const END_KEY_SUFFIX: &str = "~";

/// Storage namespace.
pub trait Store: Send + Sync {
    /// Value stored under `key`, [`Error::DataNotFound`](crate::Error::DataNotFound) if absent.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;

    /// Entries with `start <= key < end`, in key order.
    fn iterate(&self, start: &str, end: &str) -> Result<StoreIterator>;
}

/// Lazily consumed `(key, value)` pairs of a range scan.
pub type StoreIterator = Box<dyn Iterator<Item = (String, Vec<u8>)> + Send>;

/// Opens named stores.
pub trait StorageProvider: Send + Sync {
    fn open_store(&self, name: &str) -> Result<Arc<dyn Store>>;
}

/// Upper bound for a scan over every key starting with `prefix`.
pub fn prefix_end(prefix: &str) -> String {
    format!("{}{}", prefix, END_KEY_SUFFIX)
}
