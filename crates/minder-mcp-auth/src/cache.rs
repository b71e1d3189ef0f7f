//! # Access Token Cache
//!
//! Maps a refresh-token identity to the access token last obtained for it.
//!
//! ## Keys
//!
//! Entries are keyed by [`hash_token`]: the first 16 bytes (128 bits) of the
//! SHA-256 digest of the offline token, hex-encoded. Raw offline tokens never
//! sit in the map, and keys are safe to log.
//!
//! ## Concurrency
//!
//! Two structures cooperate:
//!
//! - `entries`, a `parking_lot::RwLock` map. Readers never wait on the
//!   network: the lock is only held for a lookup or an insert.
//! - `gates`, one `tokio::sync::Mutex<()>` per identity. A caller that misses
//!   the cache takes its identity's gate, looks again, and only exchanges if
//!   the entry is still missing or stale.
//!
//! The refreshing caller inserts the new entry under the write lock *before*
//! releasing the gate. Every caller queued on that gate acquires it afterwards
//! and re-reads under the read lock, so it observes the entry and does not
//! start a second exchange. Callers for other identities use other gates and
//! are never serialized behind a slow identity provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::exchange::ExchangedToken;
use crate::inspector::is_stale;

/// Cache key for a refresh token
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..16])
}

/// A cached access token
#[derive(Debug)]
pub struct CachedAccessToken {
    access_token: SecretString,
    expires_at: SystemTime,
}

impl CachedAccessToken {
    /// When the access token expires
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Whether the token is still usable `buffer` from now
    pub fn is_fresh(&self, buffer: Duration) -> bool {
        !is_stale(self.expires_at, buffer)
    }
}

impl From<ExchangedToken> for CachedAccessToken {
    fn from(token: ExchangedToken) -> Self {
        Self {
            access_token: token.access_token,
            expires_at: token.expires_at,
        }
    }
}

/// Per-identity refresh gate
pub type RefreshGate = Arc<tokio::sync::Mutex<()>>;

/// Shared handle on one identity's refresh gate
#[derive(Debug)]
pub struct GateLease<'a> {
    cache: &'a TokenCache,
    key: String,
    gate: RefreshGate,
}

impl GateLease<'_> {
    /// Wait for exclusive use of the gate
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.gate.lock().await
    }
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        // Clones are only taken under `gates`, so the count cannot move while
        // it is held. Two references: the map's and this lease's.
        let mut gates = self.cache.gates.lock();
        if gates
            .get(&self.key)
            .is_some_and(|gate| Arc::ptr_eq(gate, &self.gate) && Arc::strong_count(gate) == 2)
        {
            gates.remove(&self.key);
        }
    }
}

/// Access token cache with per-identity refresh gates
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: RwLock<HashMap<String, CachedAccessToken>>,
    gates: Mutex<HashMap<String, RefreshGate>>,
}

impl TokenCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached access token for `key`, if it is still fresh `buffer` from now
    pub fn get_fresh(&self, key: &str, buffer: Duration) -> Option<String> {
        self.entries
            .read()
            .get(key)
            .filter(|entry| entry.is_fresh(buffer))
            .map(|entry| entry.access_token.expose_secret().clone())
    }

    /// Store a newly exchanged token
    ///
    /// Entries whose expiry has already passed are dropped at the same time.
    pub fn insert(&self, key: impl Into<String>, token: impl Into<CachedAccessToken>) {
        let now = SystemTime::now();
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(key.into(), token.into());
    }

    /// Refresh gate for `key`, created on first use
    ///
    /// The gate leaves the cache when the last [`GateLease`] for `key` is
    /// dropped, including when the future holding it is cancelled.
    pub fn gate(&self, key: &str) -> GateLease<'_> {
        let gate = self
            .gates
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();

        GateLease {
            cache: self,
            key: key.to_string(),
            gate,
        }
    }

    /// Number of identities with a refresh in progress or queued
    pub fn gate_count(&self) -> usize {
        self.gates.lock().len()
    }

    /// Number of cached entries, fresh or not
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
