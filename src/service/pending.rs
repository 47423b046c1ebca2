use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tokio::sync::oneshot;

use crate::{Error, Result};

type Waiting<T> = Arc<RwLock<HashMap<String, oneshot::Sender<T>>>>;

/// Correlates outbound message IDs with the reply a caller waits for.
///
/// The lock only guards the map; values are delivered through the one-shot
/// channel after the entry was removed.
pub struct PendingReplies<T> {
    waiting: Waiting<T>,
}

impl<T> Clone for PendingReplies<T> {
    fn clone(&self) -> Self {
        Self {
            waiting: self.waiting.clone(),
        }
    }
}

impl<T> Default for PendingReplies<T> {
    fn default() -> Self {
        Self {
            waiting: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T> PendingReplies<T> {
    /// Starts waiting for the reply to `id`. The entry is removed when the
    /// returned guard is dropped, whatever the outcome.
    pub fn register(&self, id: &str) -> Result<(oneshot::Receiver<T>, PendingGuard<T>)> {
        let mut waiting = self.waiting.write().map_err(|e| Error::Generic(e.to_string()))?;
        if waiting.contains_key(id) {
            return Err(Error::Generic(format!("a reply to {} is already awaited", id)));
        }
        let (tx, rx) = oneshot::channel();
        waiting.insert(id.to_string(), tx);
        Ok((
            rx,
            PendingGuard {
                waiting: self.waiting.clone(),
                id: id.to_string(),
            },
        ))
    }

    /// Delivers `value` to the waiter of `id`. `false` if nobody waits.
    pub fn complete(&self, id: &str, value: T) -> bool {
        let sender = match self.waiting.write() {
            Ok(mut waiting) => waiting.remove(id),
            Err(_) => None,
        };
        match sender {
            Some(sender) => sender.send(value).is_ok(),
            None => false,
        }
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.waiting
            .read()
            .map(|w| w.contains_key(id))
            .unwrap_or(false)
    }
}

/// Clears a [`PendingReplies`] entry on drop.
pub struct PendingGuard<T> {
    waiting: Waiting<T>,
    id: String,
}

impl<T> Drop for PendingGuard<T> {
    fn drop(&mut self) {
        if let Ok(mut waiting) = self.waiting.write() {
            waiting.remove(&self.id);
        }
    }
}
