//! This module combines the cache and the storage to provide a unified interface.
//!
//! The [`Store`] owns both and is driven by a single thread, so every command
//! observes the effects of all commands received before it and none after.

use crate::cache::Cache;
use crate::error::StoreError;
use crate::storage::{Mutation, Storage};
use shared::envelope::Envelope;
use shared::key::{Key, KeyRange};
use shared::value::{KeyValue, Value};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, trace};

pub type Request = Envelope<Command, Response>;
pub type Response = Result<Output, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Range {
        range: KeyRange,
        limit: Option<usize>,
        keys_only: bool,
    },
    Put {
        kv: KeyValue,
        prev_kv: bool,
    },
    BatchGet(Vec<Key>),
    BatchPut {
        kvs: Vec<KeyValue>,
        prev_kv: bool,
    },
    BatchDelete {
        keys: Vec<Key>,
        prev_kv: bool,
    },
    CompareAndPut {
        key: Key,
        expect: Value,
        value: Value,
    },
    DeleteRange {
        range: KeyRange,
        prev_kv: bool,
    },
    MoveValue {
        from_key: Key,
        to_key: Key,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Range { kvs: Vec<KeyValue>, more: bool },
    Put(Option<KeyValue>),
    BatchGet(Vec<KeyValue>),
    BatchPut(Vec<KeyValue>),
    BatchDelete(Vec<KeyValue>),
    CompareAndPut { success: bool, prev_kv: Option<KeyValue> },
    DeleteRange { deleted: usize, prev_kvs: Vec<KeyValue> },
    MoveValue(Option<KeyValue>),
}

type StoreResult<T> = Result<T, StoreError>;

pub trait KeyValueStore {
    /// Returns the pairs of `range` in key order plus whether `limit` cut the
    /// result short.
    fn range(
        &mut self,
        range: &KeyRange,
        limit: Option<usize>,
        keys_only: bool,
    ) -> StoreResult<(Vec<KeyValue>, bool)>;
    fn put(&mut self, kv: KeyValue) -> StoreResult<Option<KeyValue>>;
    fn batch_get(&mut self, keys: &[Key]) -> StoreResult<Vec<KeyValue>>;
    fn batch_put(&mut self, kvs: Vec<KeyValue>) -> StoreResult<Vec<KeyValue>>;
    fn batch_delete(&mut self, keys: &[Key]) -> StoreResult<Vec<KeyValue>>;
    fn compare_and_put(
        &mut self,
        key: &Key,
        expect: &Value,
        value: Value,
    ) -> StoreResult<(bool, Option<KeyValue>)>;
    fn delete_range(&mut self, range: &KeyRange) -> StoreResult<Vec<KeyValue>>;
    fn move_value(&mut self, from_key: &Key, to_key: &Key) -> StoreResult<Option<KeyValue>>;
}

pub struct Store<C: Cache<Key, Value>, S: Storage> {
    requests: mpsc::Receiver<Request>,
    cache: C,
    storage: S,
}

impl<C: Cache<Key, Value>, S: Storage> Store<C, S> {
    pub fn new(cache: C, storage: S, requests: mpsc::Receiver<Request>) -> Self {
        Self {
            requests,
            cache,
            storage,
        }
    }
    pub fn run(&mut self) -> anyhow::Result<()> {
        // all senders have been dropped and there is no more use of the store
        while let Some(Envelope { request, reply_to }) = self.requests.blocking_recv() {
            let res = self.execute(request);
            debug!("Response: {:?}", res);
            if reply_to.send(res).is_err() {
                debug!("Requester went away before the response was ready");
            }
        }
        trace!("Store terminating gracefully");
        Ok(())
    }
    fn execute(&mut self, cmd: Command) -> Response {
        match cmd {
            Command::Range {
                range,
                limit,
                keys_only,
            } => {
                debug!("Range request for range: {} limit: {:?}", range, limit);
                self.range(&range, limit, keys_only)
                    .map(|(kvs, more)| Output::Range { kvs, more })
            }
            Command::Put { kv, prev_kv } => {
                debug!("Put request for key: {} and value: {}", kv.key, kv.value);
                self.put(kv)
                    .map(|prev| Output::Put(prev.filter(|_| prev_kv)))
            }
            Command::BatchGet(keys) => {
                debug!("BatchGet request for {} keys", keys.len());
                self.batch_get(&keys).map(Output::BatchGet)
            }
            Command::BatchPut { kvs, prev_kv } => {
                debug!("BatchPut request for {} key-value pairs", kvs.len());
                self.batch_put(kvs)
                    .map(|prev_kvs| Output::BatchPut(keep_if(prev_kvs, prev_kv)))
            }
            Command::BatchDelete { keys, prev_kv } => {
                debug!("BatchDelete request for {} keys", keys.len());
                self.batch_delete(&keys)
                    .map(|prev_kvs| Output::BatchDelete(keep_if(prev_kvs, prev_kv)))
            }
            Command::CompareAndPut { key, expect, value } => {
                debug!(
                    "CompareAndPut request for key: {} expecting: {} with value: {}",
                    key, expect, value
                );
                self.compare_and_put(&key, &expect, value)
                    .map(|(success, prev_kv)| Output::CompareAndPut { success, prev_kv })
            }
            Command::DeleteRange { range, prev_kv } => {
                debug!("DeleteRange request for range: {}", range);
                self.delete_range(&range).map(|prev_kvs| Output::DeleteRange {
                    deleted: prev_kvs.len(),
                    prev_kvs: keep_if(prev_kvs, prev_kv),
                })
            }
            Command::MoveValue { from_key, to_key } => {
                debug!("MoveValue request from key: {} to key: {}", from_key, to_key);
                self.move_value(&from_key, &to_key).map(Output::MoveValue)
            }
        }
    }
    fn get(&mut self, key: &Key) -> StoreResult<Option<Value>> {
        if let Some(value) = self.cache.get(key) {
            trace!("Cache hit for key: {}", key);
            return Ok(Some(value));
        }
        let value = self.storage.get(key)?;
        if let Some(value) = value.as_ref() {
            self.cache.put(key, value);
        }
        Ok(value)
    }
    /// Commits the batch to storage and only then brings the cache in line
    /// with it.
    fn commit(&mut self, batch: Vec<Mutation>) -> StoreResult<()> {
        self.storage.apply(&batch)?;
        for mutation in batch.iter() {
            match mutation {
                Mutation::Put(key, value) => self.cache.put(key, value),
                Mutation::Delete(key) => self.cache.delete(key),
            }
        }
        Ok(())
    }
}

fn keep_if(kvs: Vec<KeyValue>, wanted: bool) -> Vec<KeyValue> {
    if wanted {
        kvs
    } else {
        Vec::new()
    }
}

fn ensure_key(key: &Key, what: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::invalid_argument(format!("{} must not be empty", what)));
    }
    Ok(())
}

impl<C: Cache<Key, Value>, S: Storage> KeyValueStore for Store<C, S> {
    fn range(
        &mut self,
        range: &KeyRange,
        limit: Option<usize>,
        keys_only: bool,
    ) -> StoreResult<(Vec<KeyValue>, bool)> {
        // one more than asked for tells whether there is more
        let mut kvs = self
            .storage
            .range(range, limit.map(|limit| limit.saturating_add(1)))?;
        let more = limit.map_or(false, |limit| kvs.len() > limit);
        if let Some(limit) = limit {
            kvs.truncate(limit);
        }
        if keys_only {
            kvs = kvs.into_iter().map(KeyValue::into_key_only).collect();
        }
        Ok((kvs, more))
    }
    fn put(&mut self, kv: KeyValue) -> StoreResult<Option<KeyValue>> {
        ensure_key(&kv.key, "key")?;
        let prev = self.get(&kv.key)?;
        let prev_kv = prev.map(|value| KeyValue::new(kv.key.clone(), value));
        self.commit(vec![Mutation::Put(kv.key, kv.value)])?;
        Ok(prev_kv)
    }
    fn batch_get(&mut self, keys: &[Key]) -> StoreResult<Vec<KeyValue>> {
        let mut seen = HashSet::new();
        let mut kvs = Vec::new();
        for key in keys.iter().filter(|key| seen.insert(*key)) {
            if let Some(value) = self.get(key)? {
                kvs.push(KeyValue::new(key.clone(), value));
            }
        }
        Ok(kvs)
    }
    fn batch_put(&mut self, kvs: Vec<KeyValue>) -> StoreResult<Vec<KeyValue>> {
        for kv in kvs.iter() {
            ensure_key(&kv.key, "key")?;
        }
        let mut seen = HashSet::new();
        let mut prev_kvs = Vec::new();
        for kv in kvs.iter().filter(|kv| seen.insert(&kv.key)) {
            if let Some(value) = self.get(&kv.key)? {
                prev_kvs.push(KeyValue::new(kv.key.clone(), value));
            }
        }
        let batch = kvs
            .into_iter()
            .map(|kv| Mutation::Put(kv.key, kv.value))
            .collect();
        self.commit(batch)?;
        Ok(prev_kvs)
    }
    fn batch_delete(&mut self, keys: &[Key]) -> StoreResult<Vec<KeyValue>> {
        let prev_kvs = self.batch_get(keys)?;
        if prev_kvs.is_empty() {
            return Ok(prev_kvs);
        }
        let batch = prev_kvs
            .iter()
            .map(|kv| Mutation::Delete(kv.key.clone()))
            .collect();
        self.commit(batch)?;
        Ok(prev_kvs)
    }
    fn compare_and_put(
        &mut self,
        key: &Key,
        expect: &Value,
        value: Value,
    ) -> StoreResult<(bool, Option<KeyValue>)> {
        ensure_key(key, "key")?;
        let current = self.get(key)?;
        let success = match current.as_ref() {
            Some(current) => current == expect,
            // an empty expectation means the key must not exist yet
            None => expect.is_empty(),
        };
        if success {
            self.commit(vec![Mutation::Put(key.clone(), value)])?;
        }
        Ok((success, current.map(|value| KeyValue::new(key.clone(), value))))
    }
    fn delete_range(&mut self, range: &KeyRange) -> StoreResult<Vec<KeyValue>> {
        let prev_kvs = self.storage.range(range, None)?;
        if prev_kvs.is_empty() {
            return Ok(prev_kvs);
        }
        let batch = prev_kvs
            .iter()
            .map(|kv| Mutation::Delete(kv.key.clone()))
            .collect();
        self.commit(batch)?;
        Ok(prev_kvs)
    }
    fn move_value(&mut self, from_key: &Key, to_key: &Key) -> StoreResult<Option<KeyValue>> {
        ensure_key(from_key, "from_key")?;
        ensure_key(to_key, "to_key")?;
        let Some(value) = self.get(from_key)? else {
            let current = self.get(to_key)?;
            return Ok(current.map(|value| KeyValue::new(to_key.clone(), value)));
        };
        if from_key != to_key {
            self.commit(vec![
                Mutation::Delete(from_key.clone()),
                Mutation::Put(to_key.clone(), value.clone()),
            ])?;
        }
        Ok(Some(KeyValue::new(from_key.clone(), value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEvictionStrategy, SupportedCache};
    use crate::log_storage::LogIndexStorage;
    use crate::storage::MemStorage;
    use anyhow::Result;
    use serial_test::serial;
    use std::path::PathBuf;

    type TestStore<S> = Store<SupportedCache<Key, Value>, S>;

    fn mem_store() -> TestStore<MemStorage> {
        let (_tx, rx) = mpsc::channel(1);
        Store::new(
            SupportedCache::new(CacheEvictionStrategy::Lru, 2),
            MemStorage::new(),
            rx,
        )
    }

    /// Serves reads from memory and refuses every write while `fail_writes` is set.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemStorage,
        fail_writes: bool,
    }

    impl Storage for FlakyStorage {
        fn get(&self, key: &Key) -> Result<Option<Value>> {
            self.inner.get(key)
        }
        fn range(&self, range: &KeyRange, limit: Option<usize>) -> Result<Vec<KeyValue>> {
            self.inner.range(range, limit)
        }
        fn apply(&mut self, batch: &[Mutation]) -> Result<()> {
            if self.fail_writes {
                anyhow::bail!("disk full");
            }
            self.inner.apply(batch)
        }
        fn size(&self) -> usize {
            self.inner.size()
        }
    }

    fn kv(key: &str, value: &str) -> KeyValue {
        KeyValue::new(key, value)
    }

    fn seed(store: &mut impl KeyValueStore, pairs: &[(&str, &str)]) -> StoreResult<()> {
        store.batch_put(pairs.iter().map(|(k, v)| kv(k, v)).collect())?;
        Ok(())
    }

    #[test]
    fn put_returns_previous_pair() -> StoreResult<()> {
        let mut store = mem_store();
        assert_eq!(store.put(kv("a", "1"))?, None);
        assert_eq!(store.put(kv("a", "2"))?, Some(kv("a", "1")));
        assert_eq!(store.batch_get(&[Key::from("a")])?, vec![kv("a", "2")]);
        Ok(())
    }

    #[test]
    fn put_without_prev_kv_flag_hides_previous_pair() {
        let mut store = mem_store();
        let put = |kv| Command::Put { kv, prev_kv: false };
        assert_eq!(store.execute(put(kv("a", "1"))).unwrap(), Output::Put(None));
        assert_eq!(store.execute(put(kv("a", "2"))).unwrap(), Output::Put(None));
    }

    #[test]
    fn empty_keys_are_rejected() {
        let mut store = mem_store();
        assert!(matches!(
            store.put(kv("", "1")),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.batch_put(vec![kv("a", "1"), kv("", "2")]),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.compare_and_put(&Key::default(), &Value::default(), Value::from("1")),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.move_value(&Key::from("a"), &Key::default()),
            Err(StoreError::InvalidArgument(_))
        ));
        // nothing of the rejected batch was written
        assert_eq!(store.storage.size(), 0);
    }

    #[test]
    fn range_honours_limit_and_keys_only() -> StoreResult<()> {
        let mut store = mem_store();
        seed(&mut store, &[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")])?;

        let (kvs, more) = store.range(&KeyRange::all(), Some(2), false)?;
        assert_eq!(kvs, vec![kv("a", "1"), kv("b", "2")]);
        assert!(more);

        let (kvs, more) = store.range(&KeyRange::all(), Some(4), false)?;
        assert_eq!(kvs.len(), 4);
        assert!(!more);

        let (kvs, more) = store.range(&KeyRange::new("b", "d"), None, true)?;
        assert_eq!(kvs, vec![kv("b", ""), kv("c", "")]);
        assert!(!more);

        let (kvs, _) = store.range(&KeyRange::new("c", ""), None, false)?;
        assert_eq!(kvs, vec![kv("c", "3")]);
        Ok(())
    }

    #[test]
    fn range_by_prefix() -> StoreResult<()> {
        let mut store = mem_store();
        seed(
            &mut store,
            &[("node/1", "a"), ("node/2", "b"), ("nodes", "c"), ("table/1", "d")],
        )?;
        let (kvs, _) = store.range(&KeyRange::prefix("node/"), None, false)?;
        assert_eq!(kvs, vec![kv("node/1", "a"), kv("node/2", "b")]);
        Ok(())
    }

    #[test]
    fn batch_get_skips_missing_and_duplicate_keys() -> StoreResult<()> {
        let mut store = mem_store();
        seed(&mut store, &[("a", "1"), ("b", "2")])?;
        let keys = ["b", "x", "a", "b"].map(Key::from);
        assert_eq!(store.batch_get(&keys)?, vec![kv("b", "2"), kv("a", "1")]);
        Ok(())
    }

    #[test]
    fn batch_put_last_duplicate_wins() -> StoreResult<()> {
        let mut store = mem_store();
        store.put(kv("a", "0"))?;
        let prev = store.batch_put(vec![kv("a", "1"), kv("b", "1"), kv("a", "2")])?;
        assert_eq!(prev, vec![kv("a", "0")]);
        assert_eq!(
            store.batch_get(&[Key::from("a"), Key::from("b")])?,
            vec![kv("a", "2"), kv("b", "1")]
        );
        Ok(())
    }

    #[test]
    fn batch_delete_reports_removed_pairs() -> StoreResult<()> {
        let mut store = mem_store();
        seed(&mut store, &[("a", "1"), ("b", "2"), ("c", "3")])?;
        let keys = ["a", "missing", "c", "a"].map(Key::from);
        assert_eq!(store.batch_delete(&keys)?, vec![kv("a", "1"), kv("c", "3")]);
        assert_eq!(store.storage.size(), 1);
        // the cache must not serve deleted keys
        assert!(store.batch_get(&[Key::from("a")])?.is_empty());
        Ok(())
    }

    #[test]
    fn compare_and_put_semantics() -> StoreResult<()> {
        let mut store = mem_store();
        let key = Key::from("leader");

        // absent key, empty expectation: create
        assert_eq!(
            store.compare_and_put(&key, &Value::default(), Value::from("n1"))?,
            (true, None)
        );
        // present key, empty expectation: refuse and report current
        assert_eq!(
            store.compare_and_put(&key, &Value::default(), Value::from("n2"))?,
            (false, Some(kv("leader", "n1")))
        );
        // wrong expectation
        assert_eq!(
            store.compare_and_put(&key, &Value::from("n0"), Value::from("n2"))?,
            (false, Some(kv("leader", "n1")))
        );
        // right expectation
        assert_eq!(
            store.compare_and_put(&key, &Value::from("n1"), Value::from("n2"))?,
            (true, Some(kv("leader", "n1")))
        );
        // absent key, non-empty expectation
        assert_eq!(
            store.compare_and_put(&Key::from("other"), &Value::from("x"), Value::from("y"))?,
            (false, None)
        );
        assert_eq!(
            store.batch_get(&[key, Key::from("other")])?,
            vec![kv("leader", "n2")]
        );
        Ok(())
    }

    #[test]
    fn delete_range_counts_removed_keys() {
        let mut store = mem_store();
        seed(&mut store, &[("a", "1"), ("b", "2"), ("c", "3")]).unwrap();
        let res = store.execute(Command::DeleteRange {
            range: KeyRange::new("b", shared::key::UNBOUNDED_END.to_vec()),
            prev_kv: false,
        });
        assert_eq!(
            res.unwrap(),
            Output::DeleteRange {
                deleted: 2,
                prev_kvs: vec![]
            }
        );
        assert_eq!(store.storage.size(), 1);

        let res = store.execute(Command::DeleteRange {
            range: KeyRange::all(),
            prev_kv: true,
        });
        assert_eq!(
            res.unwrap(),
            Output::DeleteRange {
                deleted: 1,
                prev_kvs: vec![kv("a", "1")]
            }
        );
    }

    #[test]
    fn move_value_semantics() -> StoreResult<()> {
        let mut store = mem_store();
        store.put(kv("src", "v"))?;

        assert_eq!(
            store.move_value(&Key::from("src"), &Key::from("dst"))?,
            Some(kv("src", "v"))
        );
        assert_eq!(
            store.batch_get(&[Key::from("src"), Key::from("dst")])?,
            vec![kv("dst", "v")]
        );

        // source gone: report what is at the destination
        assert_eq!(
            store.move_value(&Key::from("src"), &Key::from("dst"))?,
            Some(kv("dst", "v"))
        );
        assert_eq!(
            store.move_value(&Key::from("nothing"), &Key::from("nowhere"))?,
            None
        );

        // moving onto itself changes nothing
        assert_eq!(
            store.move_value(&Key::from("dst"), &Key::from("dst"))?,
            Some(kv("dst", "v"))
        );
        assert_eq!(store.batch_get(&[Key::from("dst")])?, vec![kv("dst", "v")]);
        Ok(())
    }

    #[test]
    fn failed_commit_leaves_store_and_cache_untouched() -> StoreResult<()> {
        let (_tx, rx) = mpsc::channel(1);
        let mut store = Store::new(
            SupportedCache::new(CacheEvictionStrategy::Lru, 8),
            FlakyStorage::default(),
            rx,
        );
        seed(&mut store, &[("a", "1"), ("b", "2"), ("c", "3")])?;
        let keys = ["a", "b", "c", "d"].map(Key::from);
        // warm the cache so reads below would expose a premature update
        let before = store.batch_get(&keys)?;

        store.storage.fail_writes = true;
        let failures = [
            store.batch_put(vec![kv("a", "x"), kv("d", "4")]),
            store.batch_delete(&keys),
            store.delete_range(&KeyRange::all()),
            store
                .move_value(&Key::from("a"), &Key::from("d"))
                .map(|moved| moved.into_iter().collect()),
            store.put(kv("b", "x")).map(|prev| prev.into_iter().collect()),
        ];
        for res in failures {
            assert!(matches!(res, Err(StoreError::Storage(_))));
        }
        assert!(matches!(
            store.compare_and_put(&Key::from("c"), &Value::from("3"), Value::from("x")),
            Err(StoreError::Storage(_))
        ));

        assert_eq!(store.batch_get(&keys)?, before);
        assert_eq!(store.storage.size(), 3);
        assert_eq!(
            store.range(&KeyRange::all(), None, false)?.0,
            vec![kv("a", "1"), kv("b", "2"), kv("c", "3")]
        );
        Ok(())
    }

    #[test]
    #[serial]
    fn log_backed_store_survives_restart() -> Result<()> {
        let data_dir = PathBuf::from("./data/test/store_restart");
        if data_dir.exists() {
            std::fs::remove_dir_all(&data_dir)?;
        }
        let open = || -> Result<TestStore<LogIndexStorage>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(Store::new(
                SupportedCache::new(CacheEvictionStrategy::Fifo, 8),
                LogIndexStorage::new(&data_dir)?,
                rx,
            ))
        };
        {
            let mut store = open()?;
            seed(&mut store, &[("a", "1"), ("b", "2"), ("c", "3")])?;
            store.move_value(&Key::from("a"), &Key::from("z"))?;
            store.delete_range(&KeyRange::new("b", "c"))?;
        }
        let mut store = open()?;
        let (kvs, more) = store.range(&KeyRange::all(), None, false)?;
        assert_eq!(kvs, vec![kv("c", "3"), kv("z", "1")]);
        assert!(!more);

        std::fs::remove_dir_all(&data_dir)?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn actor_answers_over_envelopes() -> Result<()> {
        let (tx, rx) = mpsc::channel::<Request>(4);
        let handle = tokio::task::spawn_blocking(move || {
            let mut store = Store::new(
                SupportedCache::new(CacheEvictionStrategy::Lfu, 4),
                MemStorage::new(),
                rx,
            );
            store.run()
        });

        let put = Command::Put {
            kv: kv("k", "v"),
            prev_kv: true,
        };
        assert_eq!(Envelope::send(put, &tx).await.unwrap()?, Output::Put(None));
        let get = Command::BatchGet(vec![Key::from("k")]);
        assert_eq!(
            Envelope::send(get, &tx).await.unwrap()?,
            Output::BatchGet(vec![kv("k", "v")])
        );

        // dropping the last sender stops the actor
        drop(tx);
        handle.await??;
        Ok(())
    }
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_compare_and_put_has_one_winner() -> Result<()> {
        let (tx, rx) = mpsc::channel::<Request>(8);
        let handle = tokio::task::spawn_blocking(move || {
            let mut store = Store::new(
                SupportedCache::new(CacheEvictionStrategy::Fifo, 4),
                MemStorage::new(),
                rx,
            );
            store.run()
        });

        let contenders = (0..16)
            .map(|i| {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let cas = Command::CompareAndPut {
                        key: Key::from("lock"),
                        expect: Value::default(),
                        value: Value::from(format!("owner{}", i)),
                    };
                    (i, Envelope::send(cas, &tx).await.unwrap())
                })
            })
            .collect::<Vec<_>>();

        let mut winners = Vec::new();
        for contender in contenders {
            let (i, res) = contender.await?;
            match res? {
                Output::CompareAndPut { success: true, prev_kv: None } => winners.push(i),
                Output::CompareAndPut { success: false, prev_kv: Some(_) } => {}
                other => panic!("unexpected output {:?}", other),
            }
        }
        assert_eq!(winners.len(), 1);

        let get = Command::BatchGet(vec![Key::from("lock")]);
        assert_eq!(
            Envelope::send(get, &tx).await.unwrap()?,
            Output::BatchGet(vec![kv("lock", &format!("owner{}", winners[0]))])
        );

        drop(tx);
        handle.await??;
        Ok(())
    }
}
