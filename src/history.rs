//! Persistent conversation history
//!
//! Exchanges are stored in a fjall keyspace under big-endian sequence numbers
//! so that key order matches insertion order. The latest sequence number is
//! kept under its own key.

use std::fmt::Display;
use std::path::Path;

use async_trait::async_trait;
use fjall::Keyspace;
use tokio::sync::Mutex;
use tokio::task;
use tracing::debug;

use crate::Result;
use crate::error::WeatherAiError;
use crate::models::Exchange;

const SEQUENCE_KEY: &[u8] = b"__sequence";

/// Order in which `recent` returns exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOrder {
    NewestFirst,
    OldestFirst,
}

/// Append-only store of past exchanges
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, exchange: Exchange) -> Result<()>;

    /// Up to `limit` of the most recent exchanges, in [`HistoryStore::order`]
    async fn recent(&self, limit: usize) -> Result<Vec<Exchange>>;

    fn order(&self) -> HistoryOrder {
        HistoryOrder::NewestFirst
    }
}

fn storage_error(e: impl Display) -> WeatherAiError {
    WeatherAiError::storage(e.to_string())
}

fn read_sequence(store: &Keyspace) -> Result<u64> {
    let Some(bytes) = store.get(SEQUENCE_KEY).map_err(storage_error)? else {
        return Ok(0);
    };
    let raw: [u8; 8] = bytes
        .to_vec()
        .try_into()
        .map_err(|_| WeatherAiError::storage("Corrupt history sequence counter"))?;
    Ok(u64::from_be_bytes(raw))
}

fn get_from_store(store: &Keyspace, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key).map_err(storage_error)?.map(|v| v.to_vec()))
}

/// History store backed by an on-disk fjall database
pub struct FjallHistoryStore {
    store: Keyspace,
    /// Serializes appends so sequence numbers are never reused
    write_lock: Mutex<()>,
}

impl FjallHistoryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open().map_err(storage_error)?;
        let store = db
            .keyspace("exchanges", fjall::KeyspaceCreateOptions::default)
            .map_err(storage_error)?;
        Ok(Self {
            store,
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl HistoryStore for FjallHistoryStore {
    #[tracing::instrument(name = "append_history", level = "debug", skip_all)]
    async fn append(&self, exchange: Exchange) -> Result<()> {
        let bytes = postcard::to_stdvec(&exchange).map_err(storage_error)?;
        let _guard = self.write_lock.lock().await;
        let store = self.store.clone();

        let sequence = task::spawn_blocking(move || -> Result<u64> {
            let next = read_sequence(&store)? + 1;
            store
                .insert(next.to_be_bytes().to_vec(), bytes)
                .map_err(storage_error)?;
            store
                .insert(SEQUENCE_KEY.to_vec(), next.to_be_bytes().to_vec())
                .map_err(storage_error)?;
            Ok(next)
        })
        .await
        .map_err(storage_error)??;

        debug!("Stored exchange #{}", sequence);
        Ok(())
    }

    #[tracing::instrument(name = "query_history", level = "debug", skip(self))]
    async fn recent(&self, limit: usize) -> Result<Vec<Exchange>> {
        let store = self.store.clone();
        let limit = limit as u64;

        let entries: Vec<Vec<u8>> = task::spawn_blocking(move || -> Result<Vec<Vec<u8>>> {
            let last = read_sequence(&store)?;
            let first = last.saturating_sub(limit) + 1;
            let mut entries = Vec::new();
            for sequence in (first..=last).rev() {
                if let Some(bytes) = get_from_store(&store, sequence.to_be_bytes().to_vec())? {
                    entries.push(bytes);
                }
            }
            Ok(entries)
        })
        .await
        .map_err(storage_error)??;

        let exchanges = entries
            .iter()
            .map(|bytes| postcard::from_bytes(bytes).map_err(storage_error))
            .collect::<Result<Vec<Exchange>>>()?;
        debug!("Loaded {} exchange(s)", exchanges.len());
        Ok(exchanges)
    }
}

/// In-process history, oldest first; used by tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryHistoryStore {
    exchanges: Mutex<Vec<Exchange>>,
}

impl MemoryHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, exchange: Exchange) -> Result<()> {
        self.exchanges.lock().await.push(exchange);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Exchange>> {
        let exchanges = self.exchanges.lock().await;
        let skip = exchanges.len().saturating_sub(limit);
        Ok(exchanges[skip..].to_vec())
    }

    fn order(&self) -> HistoryOrder {
        HistoryOrder::OldestFirst
    }
}
