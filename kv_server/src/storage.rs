//! Storage engines holding the key-value pairs below the cache.
use crate::log_storage::{LogIndexStorage, LogOptions};
use anyhow::Result;
use clap::ValueEnum;
use shared::key::{Key, KeyRange};
use shared::value::{KeyValue, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// A single change within an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Put(Key, Value),
    Delete(Key),
}

pub trait Storage {
    fn get(&self, key: &Key) -> Result<Option<Value>>;
    /// Returns at most `limit` pairs of the range in ascending key order.
    fn range(&self, range: &KeyRange, limit: Option<usize>) -> Result<Vec<KeyValue>>;
    /// Applies the mutations in order, either all of them or, if an error is
    /// returned, none of them.
    fn apply(&mut self, batch: &[Mutation]) -> Result<()>;
    fn size(&self) -> usize;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, ValueEnum, Default)]
pub enum StorageKind {
    /// append-only log files with an in-memory index
    #[default]
    #[value(name = "log")]
    Log,
    /// volatile, everything is lost on shutdown
    #[value(name = "memory")]
    Memory,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Log => write!(f, "log"),
            StorageKind::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemStorage {
    map: BTreeMap<Key, Value>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemStorage {
    fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(self.map.get(key).cloned())
    }

    fn range(&self, range: &KeyRange, limit: Option<usize>) -> Result<Vec<KeyValue>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .map
            .range::<Key, _>(range.bounds())
            .take(limit.unwrap_or(usize::MAX))
            .map(|(key, value)| KeyValue::new(key.clone(), value.clone()))
            .collect())
    }

    fn apply(&mut self, batch: &[Mutation]) -> Result<()> {
        for mutation in batch {
            match mutation {
                Mutation::Put(key, value) => {
                    self.map.insert(key.clone(), value.clone());
                }
                Mutation::Delete(key) => {
                    self.map.remove(key);
                }
            }
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.map.len()
    }
}

/// Static dispatch over the engines selectable on the command line, same as
/// [`SupportedCache`](crate::cache::SupportedCache).
pub enum SupportedStorage {
    Log(LogIndexStorage),
    Memory(MemStorage),
}

impl SupportedStorage {
    pub fn new(kind: StorageKind, data_dir: &Path, options: LogOptions) -> Result<Self> {
        match kind {
            StorageKind::Log => Ok(SupportedStorage::Log(LogIndexStorage::with_options(
                data_dir, options,
            )?)),
            StorageKind::Memory => Ok(SupportedStorage::Memory(MemStorage::new())),
        }
    }
}

impl Storage for SupportedStorage {
    fn get(&self, key: &Key) -> Result<Option<Value>> {
        match self {
            SupportedStorage::Log(storage) => storage.get(key),
            SupportedStorage::Memory(storage) => storage.get(key),
        }
    }

    fn range(&self, range: &KeyRange, limit: Option<usize>) -> Result<Vec<KeyValue>> {
        match self {
            SupportedStorage::Log(storage) => storage.range(range, limit),
            SupportedStorage::Memory(storage) => storage.range(range, limit),
        }
    }

    fn apply(&mut self, batch: &[Mutation]) -> Result<()> {
        match self {
            SupportedStorage::Log(storage) => storage.apply(batch),
            SupportedStorage::Memory(storage) => storage.apply(batch),
        }
    }

    fn size(&self) -> usize {
        match self {
            SupportedStorage::Log(storage) => storage.size(),
            SupportedStorage::Memory(storage) => storage.size(),
        }
    }
}
