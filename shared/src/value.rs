use crate::key::{write_bytes, Key};
use protocol::meta_store;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Value {
    inner: Vec<u8>,
}

impl Value {
    pub fn new(value: Vec<u8>) -> Self {
        Self { inner: value }
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self { inner: value }
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self {
            inner: value.to_vec(),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self {
            inner: value.into_bytes(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self {
            inner: value.as_bytes().to_vec(),
        }
    }
}

impl AsRef<[u8]> for Value {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_bytes(f, &self.inner)
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Value({})", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: Key,
    pub value: Value,
}

impl KeyValue {
    pub fn new(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
    /// Drops the value, as requested by a `keys_only` range.
    pub fn into_key_only(self) -> Self {
        Self {
            key: self.key,
            value: Value::default(),
        }
    }
}

impl Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} => {}", self.key, self.value)
    }
}

impl From<(Key, Value)> for KeyValue {
    fn from((key, value): (Key, Value)) -> Self {
        Self { key, value }
    }
}

impl From<KeyValue> for meta_store::KeyValue {
    fn from(kv: KeyValue) -> Self {
        Self {
            key: kv.key.into_bytes(),
            value: kv.value.into_bytes(),
        }
    }
}

impl From<meta_store::KeyValue> for KeyValue {
    fn from(kv: meta_store::KeyValue) -> Self {
        Self {
            key: Key::from(kv.key),
            value: Value::from(kv.value),
        }
    }
}
