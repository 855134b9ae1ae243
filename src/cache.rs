//! Geocode cache
//!
//! Maps the literal address text to the coordinate it resolved to. Entries
//! live in memory with a TTL and an entry bound (oldest insert evicted first).
//! An optional `fjall` keyspace keeps entries across restarts.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use fjall::Keyspace;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::task;

use crate::models::Coordinate;

const KEY_PREFIX: &str = "geocode:";

#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    value: T,
    expires_at: u64, // Unix timestamp (seconds)
}

/// On-disk key/value store with per-entry expiry
pub struct PersistentCache {
    store: Keyspace,
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> anyhow::Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

impl PersistentCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open()?;
        let items = db.keyspace("geocode", fjall::KeyspaceCreateOptions::default)?;
        Ok(PersistentCache { store: items })
    }

    /// Stores a serializable value with a time-to-live (TTL).
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self))]
    pub async fn put<T: Serialize + Send + Debug + 'static>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        let expires_at = SystemTime::now()
            .checked_add(ttl)
            .ok_or(anyhow!("TTL overflow"))?
            .duration_since(UNIX_EPOCH)?
            .as_secs();
        let entry = StoredEntry { value, expires_at };
        let bytes = postcard::to_stdvec(&entry)?;

        task::spawn_blocking(move || store.insert(key, bytes)).await??;
        Ok(())
    }

    /// Retrieves a value if it exists and has not expired.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub async fn get<T: DeserializeOwned + Send + 'static>(&self, key: &str) -> Result<Option<T>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes: Option<Vec<u8>> =
            task::spawn_blocking(move || get_from_store(store, key_bytes)).await??;

        let Some(bytes) = maybe_bytes else {
            tracing::debug!("Key not found");
            return Ok(None);
        };

        let entry: StoredEntry<T> = postcard::from_bytes(&bytes)?;
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        if now < entry.expires_at {
            Ok(Some(entry.value))
        } else {
            tracing::debug!("Key found but expired");
            self.remove(key).await?;
            Ok(None)
        }
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store.clone();
        task::spawn_blocking(move || store.remove(key)).await??;
        Ok(())
    }
}

struct MemoryEntry {
    coordinate: Coordinate,
    inserted_at: Instant,
    sequence: u64,
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<String, MemoryEntry>,
    /// Insert sequence → key, one record per live entry
    insertion_order: BTreeMap<u64, String>,
    next_sequence: u64,
}

impl MemoryState {
    fn remove(&mut self, address: &str) {
        if let Some(entry) = self.entries.remove(address) {
            self.insertion_order.remove(&entry.sequence);
        }
    }
}

/// Address text → coordinate cache shared by concurrent searches
pub struct GeocodeCache {
    state: RwLock<MemoryState>,
    ttl: Duration,
    max_entries: usize,
    persistent: Option<PersistentCache>,
}

impl GeocodeCache {
    /// In-memory cache only
    #[must_use]
    pub fn in_memory(ttl: Duration, max_entries: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            ttl,
            max_entries: max_entries.max(1),
            persistent: None,
        }
    }

    /// In-memory cache backed by an on-disk keyspace at `path`
    pub fn with_persistence(ttl: Duration, max_entries: usize, path: impl AsRef<Path>) -> Result<Self> {
        let mut cache = Self::in_memory(ttl, max_entries);
        cache.persistent = Some(PersistentCache::open(path)?);
        Ok(cache)
    }

    /// Cached coordinate for `address`, if present and fresh
    pub async fn get(&self, address: &str) -> Option<Coordinate> {
        if let Some(coordinate) = self.get_memory(address) {
            return Some(coordinate);
        }

        let persistent = self.persistent.as_ref()?;
        match persistent.get::<Coordinate>(&format!("{KEY_PREFIX}{address}")).await {
            Ok(Some(coordinate)) => {
                self.insert_memory(address, coordinate);
                Some(coordinate)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Persistent geocode cache read failed for '{}': {}", address, e);
                None
            }
        }
    }

    /// Record a successful geocode; last write wins
    pub async fn insert(&self, address: &str, coordinate: Coordinate) {
        self.insert_memory(address, coordinate);

        if let Some(persistent) = &self.persistent {
            if let Err(e) = persistent
                .put(&format!("{KEY_PREFIX}{address}"), coordinate, self.ttl)
                .await
            {
                tracing::warn!("Persistent geocode cache write failed for '{}': {}", address, e);
            }
        }
    }

    /// Number of entries held in memory
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every in-memory entry
    pub fn clear(&self) {
        let mut state = self.write_state();
        state.entries.clear();
        state.insertion_order.clear();
    }

    // Every update leaves the state consistent, so a poisoned lock is still usable
    fn read_state(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn get_memory(&self, address: &str) -> Option<Coordinate> {
        {
            let state = self.read_state();
            let entry = state.entries.get(address)?;
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.coordinate);
            }
        }

        tracing::debug!("Geocode cache entry for '{}' expired", address);
        let mut state = self.write_state();
        // A concurrent insert may have refreshed it meanwhile
        if state
            .entries
            .get(address)
            .is_some_and(|e| e.inserted_at.elapsed() >= self.ttl)
        {
            state.remove(address);
        }
        None
    }

    fn insert_memory(&self, address: &str, coordinate: Coordinate) {
        let mut state = self.write_state();
        state.remove(address);

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            address.to_string(),
            MemoryEntry {
                coordinate,
                inserted_at: Instant::now(),
                sequence,
            },
        );
        state.insertion_order.insert(sequence, address.to_string());

        while state.entries.len() > self.max_entries {
            let Some((_, oldest)) = state.insertion_order.pop_first() else {
                break;
            };
            state.entries.remove(&oldest);
        }
    }

    #[cfg(test)]
    fn order_len(&self) -> usize {
        self.read_state().insertion_order.len()
    }
}
