use clap::ValueEnum;
use linked_hash_map::LinkedHashMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

#[derive(Debug, PartialEq, Eq, Clone, Copy, ValueEnum, Default)]
pub enum CacheEvictionStrategy {
    #[default]
    #[clap(name = "FIFO")]
    /// first in first out
    Fifo,
    #[clap(name = "LRU")]
    /// least recently used
    Lru,
    #[clap(name = "LFU")]
    /// least frequently used
    Lfu,
}

impl std::fmt::Display for CacheEvictionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheEvictionStrategy::Fifo => write!(f, "FIFO"),
            CacheEvictionStrategy::Lru => write!(f, "LRU"),
            CacheEvictionStrategy::Lfu => write!(f, "LFU"),
        }
    }
}

/// A bounded read cache in front of the storage. A capacity of zero disables
/// caching.
pub trait Cache<K, V> {
    fn get(&mut self, key: &K) -> Option<V>;
    fn put(&mut self, key: &K, value: &V);
    fn delete(&mut self, key: &K);
    fn size(&self) -> usize;
    fn capacity(&self) -> usize;
}

pub struct FifoCache<K, V> {
    capacity: usize,
    map: HashMap<K, V>,
    queue: VecDeque<K>,
}

impl<K, V> FifoCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            queue: VecDeque::new(),
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Cache<K, V> for FifoCache<K, V> {
    fn get(&mut self, key: &K) -> Option<V> {
        self.map.get(key).cloned()
    }

    fn put(&mut self, key: &K, value: &V) {
        if self.capacity == 0 {
            return;
        }
        if let Some(cached) = self.map.get_mut(key) {
            // overwriting keeps the original insertion position
            *cached = value.clone();
            return;
        }
        if self.size() >= self.capacity {
            if let Some(old_key) = self.queue.pop_front() {
                self.map.remove(&old_key);
            }
        }

        self.queue.push_back(key.clone());
        self.map.insert(key.clone(), value.clone());
    }

    fn delete(&mut self, key: &K) {
        if self.map.remove(key).is_some() {
            self.queue.retain(|k| k != key);
        }
    }

    fn size(&self) -> usize {
        self.map.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

pub struct LruCache<K: Hash + Eq, V> {
    capacity: usize,
    map: LinkedHashMap<K, V>,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: LinkedHashMap::new(),
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Cache<K, V> for LruCache<K, V> {
    fn get(&mut self, key: &K) -> Option<V> {
        self.map.get_refresh(key).map(|value| value.clone())
    }

    fn put(&mut self, key: &K, value: &V) {
        if self.capacity == 0 {
            return;
        }
        if !self.map.contains_key(key) && self.map.len() >= self.capacity {
            self.map.pop_front();
        }
        // insert moves an existing entry to the back
        self.map.insert(key.clone(), value.clone());
    }

    fn delete(&mut self, key: &K) {
        self.map.remove(key);
    }

    fn size(&self) -> usize {
        self.map.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

pub struct LfuCache<K, V> {
    capacity: usize,
    min_freq: usize,
    freq_map: HashMap<K, usize>,
    key_freq_map: HashMap<usize, HashSet<K>>,
    values: HashMap<K, V>,
}

impl<K: Hash + Eq + Clone, V> LfuCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            min_freq: 0,
            freq_map: HashMap::new(),
            key_freq_map: HashMap::new(),
            values: HashMap::new(),
        }
    }

    fn forget_freq(&mut self, key: &K, freq: usize) {
        if let Some(keys) = self.key_freq_map.get_mut(&freq) {
            keys.remove(key);
            if keys.is_empty() {
                self.key_freq_map.remove(&freq);
            }
        }
    }

    fn update(&mut self, key: &K) {
        let Some(freq) = self.freq_map.get(key).copied() else {
            return;
        };
        self.freq_map.insert(key.clone(), freq + 1);
        self.forget_freq(key, freq);
        if self.min_freq == freq && !self.key_freq_map.contains_key(&freq) {
            self.min_freq += 1;
        }

        self.key_freq_map
            .entry(freq + 1)
            .or_insert_with(HashSet::new)
            .insert(key.clone());
    }

    fn evict(&mut self) {
        let key_to_evict = self
            .key_freq_map
            .get(&self.min_freq)
            .and_then(|keys| keys.iter().next())
            .cloned();
        if let Some(key) = key_to_evict {
            self.values.remove(&key);
            self.freq_map.remove(&key);
            self.forget_freq(&key, self.min_freq);
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Cache<K, V> for LfuCache<K, V> {
    fn get(&mut self, key: &K) -> Option<V> {
        let value = self.values.get(key).cloned()?;
        self.update(key);
        Some(value)
    }

    fn put(&mut self, key: &K, value: &V) {
        if self.capacity == 0 {
            return;
        }
        if self.values.contains_key(key) {
            self.update(key);
            self.values.insert(key.clone(), value.clone());
        } else {
            if self.values.len() >= self.capacity {
                self.evict();
            }
            self.values.insert(key.clone(), value.clone());
            self.freq_map.insert(key.clone(), 1);
            self.min_freq = 1;
            self.key_freq_map
                .entry(1)
                .or_insert_with(HashSet::new)
                .insert(key.clone());
        }
    }

    fn delete(&mut self, key: &K) {
        if self.values.remove(key).is_some() {
            if let Some(freq) = self.freq_map.remove(key) {
                self.forget_freq(key, freq);
            }
            // the next insertion resets min_freq to 1, until then recompute
            if let Some(min) = self.key_freq_map.keys().min() {
                self.min_freq = *min;
            }
        }
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// This type just exists to support static dispatch and avoid dynamic dispatch
/// with a trait object.
/// See https://www.possiblerust.com/guide/enum-or-trait-object for an explanation.
pub enum SupportedCache<K: Hash + Eq, V> {
    FifoCache(FifoCache<K, V>),
    LruCache(LruCache<K, V>),
    LfuCache(LfuCache<K, V>),
}

impl<K: Hash + Eq + Clone, V> SupportedCache<K, V> {
    pub fn new(strategy: CacheEvictionStrategy, capacity: usize) -> Self {
        match strategy {
            CacheEvictionStrategy::Fifo => SupportedCache::FifoCache(FifoCache::new(capacity)),
            CacheEvictionStrategy::Lru => SupportedCache::LruCache(LruCache::new(capacity)),
            CacheEvictionStrategy::Lfu => SupportedCache::LfuCache(LfuCache::new(capacity)),
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Cache<K, V> for SupportedCache<K, V> {
    fn get(&mut self, key: &K) -> Option<V> {
        match self {
            SupportedCache::FifoCache(cache) => cache.get(key),
            SupportedCache::LruCache(cache) => cache.get(key),
            SupportedCache::LfuCache(cache) => cache.get(key),
        }
    }

    fn put(&mut self, key: &K, value: &V) {
        match self {
            SupportedCache::FifoCache(cache) => cache.put(key, value),
            SupportedCache::LruCache(cache) => cache.put(key, value),
            SupportedCache::LfuCache(cache) => cache.put(key, value),
        }
    }

    fn delete(&mut self, key: &K) {
        match self {
            SupportedCache::FifoCache(cache) => cache.delete(key),
            SupportedCache::LruCache(cache) => cache.delete(key),
            SupportedCache::LfuCache(cache) => cache.delete(key),
        }
    }

    fn size(&self) -> usize {
        match self {
            SupportedCache::FifoCache(cache) => cache.size(),
            SupportedCache::LruCache(cache) => cache.size(),
            SupportedCache::LfuCache(cache) => cache.size(),
        }
    }

    fn capacity(&self) -> usize {
        match self {
            SupportedCache::FifoCache(cache) => cache.capacity(),
            SupportedCache::LruCache(cache) => cache.capacity(),
            SupportedCache::LfuCache(cache) => cache.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::key::Key;
    use shared::value::Value;

    fn keys() -> (Key, Key, Key) {
        (Key::from("alpha"), Key::from("beta"), Key::from("gamma"))
    }

    #[test]
    fn test_fifo_cache() {
        let mut cache = FifoCache::new(2);
        let (alpha, beta, gamma) = keys();

        // Test put
        cache.put(&alpha, &Value::from("1"));
        assert_eq!(cache.size(), 1);

        // Test get
        assert_eq!(cache.get(&alpha), Some(Value::from("1")));

        // Test delete
        cache.delete(&alpha);
        assert_eq!(cache.get(&alpha), None);

        // Test eviction
        cache.put(&alpha, &Value::from("1"));
        cache.put(&beta, &Value::from("2"));
        cache.get(&alpha); // reading does not matter for FIFO
        cache.put(&gamma, &Value::from("3"));
        assert_eq!(cache.get(&alpha), None);
        assert_eq!(cache.get(&beta), Some(Value::from("2")));
        assert_eq!(cache.get(&gamma), Some(Value::from("3")));
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn test_lru_cache() {
        let mut cache = LruCache::new(2);
        let (alpha, beta, gamma) = keys();

        cache.put(&alpha, &Value::from("1"));
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get(&alpha), Some(Value::from("1")));

        cache.delete(&alpha);
        assert_eq!(cache.get(&alpha), None);

        cache.put(&alpha, &Value::from("1"));
        cache.put(&beta, &Value::from("2"));
        cache.get(&alpha); // refresh alpha
        cache.put(&gamma, &Value::from("3")); // evicts beta as it is least recently used
        assert_eq!(cache.get(&beta), None);
        assert_eq!(cache.get(&alpha), Some(Value::from("1")));
        assert_eq!(cache.get(&gamma), Some(Value::from("3")));
    }

    #[test]
    fn test_lfu_cache() {
        let mut cache = LfuCache::new(2);
        let (alpha, beta, gamma) = keys();

        cache.put(&alpha, &Value::from("1"));
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get(&alpha), Some(Value::from("1")));

        cache.delete(&alpha);
        assert_eq!(cache.get(&alpha), None);

        cache.put(&alpha, &Value::from("1"));
        cache.put(&beta, &Value::from("2"));
        cache.get(&alpha);
        cache.get(&alpha);
        cache.put(&gamma, &Value::from("3")); // evicts beta as it is least frequently used
        assert_eq!(cache.get(&beta), None);
        assert_eq!(cache.get(&alpha), Some(Value::from("1")));
        assert_eq!(cache.get(&gamma), Some(Value::from("3")));
    }

    #[test]
    fn overwrite_does_not_evict() {
        for strategy in CacheEvictionStrategy::value_variants() {
            let mut cache = SupportedCache::new(*strategy, 2);
            let (alpha, beta, _) = keys();
            cache.put(&alpha, &Value::from("1"));
            cache.put(&beta, &Value::from("2"));
            cache.put(&beta, &Value::from("2'"));
            assert_eq!(cache.size(), 2, "{}", strategy);
            assert_eq!(cache.get(&alpha), Some(Value::from("1")), "{}", strategy);
            assert_eq!(cache.get(&beta), Some(Value::from("2'")), "{}", strategy);
        }
    }

    #[test]
    fn zero_capacity_caches_nothing() {
        for strategy in CacheEvictionStrategy::value_variants() {
            let mut cache: SupportedCache<Key, Value> = SupportedCache::new(*strategy, 0);
            cache.put(&Key::from("alpha"), &Value::from("1"));
            assert_eq!(cache.size(), 0, "{}", strategy);
            assert_eq!(cache.capacity(), 0);
        }
    }
}
