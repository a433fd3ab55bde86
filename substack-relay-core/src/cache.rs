//! Process-wide cache of constructed gateway clients, keyed per credential set.
//!
//! The key is a SHA-256 digest of the normalised publication URL and the api
//! key, so raw session secrets never sit in the map.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{hash_map::Entry, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::credentials::Credentials;

pub struct ClientCache<C> {
    clients: Mutex<HashMap<String, Arc<C>>>,
}

impl<C> Default for ClientCache<C> {
    fn default() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }
}

impl<C> ClientCache<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_key(credentials: &Credentials) -> String {
        let publication = credentials
            .publication_url()
            .unwrap_or_else(|_| credentials.publication_address.trim().to_string());
        let mut hasher = Sha256::new();
        hasher.update(publication.as_bytes());
        hasher.update(b"|");
        hasher.update(credentials.api_key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, credentials: &Credentials) -> Option<Arc<C>> {
        self.clients.lock().get(&Self::cache_key(credentials)).cloned()
    }

    /// Return the cached client, or build one with `factory` and cache it.
    ///
    /// The factory runs without the lock held; if another caller stored a
    /// client for the same key meanwhile, that one wins and is returned.
    pub fn get_or_try_insert_with<E, F>(
        &self,
        credentials: &Credentials,
        factory: F,
    ) -> Result<Arc<C>, E>
    where
        F: FnOnce(&Credentials) -> Result<C, E>,
    {
        let key = Self::cache_key(credentials);
        if let Some(cached) = self.clients.lock().get(&key).cloned() {
            debug!("[CACHE] Reusing cached client");
            return Ok(cached);
        }

        let client = Arc::new(factory(credentials)?);

        let mut clients = self.clients.lock();
        let stored = match clients.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                debug!("[CACHE] Stored new client");
                entry.insert(client.clone());
                client
            }
        };
        Ok(stored)
    }

    /// Drop the client for these credentials. Returns whether one was cached.
    pub fn invalidate(&self, credentials: &Credentials) -> bool {
        self.clients
            .lock()
            .remove(&Self::cache_key(credentials))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    pub fn clear(&self) {
        self.clients.lock().clear();
    }
}
