use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::ops::Bound;

/// An opaque byte string. Keys are ordered lexicographically by their bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Key {
    inner: Vec<u8>,
}

impl Key {
    pub fn new(key: Vec<u8>) -> Self {
        Self { inner: key }
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

impl From<Vec<u8>> for Key {
    fn from(key: Vec<u8>) -> Self {
        Self { inner: key }
    }
}

impl From<&[u8]> for Key {
    fn from(key: &[u8]) -> Self {
        Self {
            inner: key.to_vec(),
        }
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self {
            inner: key.into_bytes(),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self {
            inner: value.as_bytes().to_vec(),
        }
    }
}

impl From<Key> for Vec<u8> {
    fn from(key: Key) -> Self {
        key.inner
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_bytes(f, &self.inner)
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({})", self)
    }
}

/// Printable keys and values are shown as text, anything else as `0x`-prefixed hex.
pub(crate) fn write_bytes(f: &mut Formatter<'_>, bytes: &[u8]) -> std::fmt::Result {
    match std::str::from_utf8(bytes) {
        Ok(s) if s.chars().all(|c| !c.is_control()) => f.write_str(s),
        _ => write!(f, "0x{}", base16ct::lower::encode_string(bytes)),
    }
}

/// The `range_end` that selects every key greater than or equal to `key`.
pub const UNBOUNDED_END: &[u8] = &[0x00];

/// Returns the smallest key that is greater than all keys starting with
/// `prefix`, i.e. the exclusive end of a prefix scan.
pub fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    for i in (0..prefix.len()).rev() {
        if prefix[i] < 0xff {
            let mut end = prefix[..=i].to_vec();
            end[i] += 1;
            return end;
        }
    }
    // every byte is 0xff (or the prefix is empty): there is no upper bound
    UNBOUNDED_END.to_vec()
}

/// A selection of keys as expressed by a `(key, range_end)` pair on the wire.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyRange {
    /// exactly one key
    Single(Key),
    /// every key >= the bound
    From(Key),
    /// [start, end)
    Between { start: Key, end: Key },
}

impl KeyRange {
    pub fn new(key: impl Into<Key>, range_end: impl Into<Key>) -> Self {
        let key = key.into();
        let range_end = range_end.into();
        if range_end.is_empty() {
            Self::Single(key)
        } else if range_end.as_bytes() == UNBOUNDED_END {
            if key.as_bytes() == UNBOUNDED_END {
                Self::all()
            } else {
                Self::From(key)
            }
        } else {
            Self::Between {
                start: key,
                end: range_end,
            }
        }
    }
    pub fn all() -> Self {
        Self::From(Key::default())
    }
    pub fn prefix(prefix: impl Into<Key>) -> Self {
        let prefix = prefix.into();
        let end = prefix_end(prefix.as_bytes());
        Self::new(prefix, end)
    }
    pub fn contains(&self, key: &Key) -> bool {
        match self {
            Self::Single(single) => single == key,
            Self::From(start) => start <= key,
            Self::Between { start, end } => start <= key && key < end,
        }
    }
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(_) | Self::From(_) => false,
            Self::Between { start, end } => end <= start,
        }
    }
    /// Bounds suitable for `BTreeMap::range`. Must not be called on an empty
    /// range, as the map panics on inverted bounds.
    pub fn bounds(&self) -> (Bound<&Key>, Bound<&Key>) {
        match self {
            Self::Single(key) => (Bound::Included(key), Bound::Included(key)),
            Self::From(start) => (Bound::Included(start), Bound::Unbounded),
            Self::Between { start, end } => (Bound::Included(start), Bound::Excluded(end)),
        }
    }
}

impl Display for KeyRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(key) => write!(f, "{{{}}}", key),
            Self::From(start) => write!(f, "[{}, ..)", start),
            Self::Between { start, end } => write!(f, "[{}, {})", start, end),
        }
    }
}

impl Debug for KeyRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}
