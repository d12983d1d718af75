//! Source Dictionaries and Addresses
//!
//! A source dictionary is the tag set that identifies one metric series:
//! `{hostname → web01, metric → cpu, datacenter → lhr1}`. Its 64-bit
//! fingerprint, the **address**, decides which bucket a point lands in,
//! so it has to be a pure function of the *set* of tags, never of the
//! order a client happened to send them in.
//!
//! ## How the Address Is Computed
//!
//! The dictionary is stored as a `BTreeMap`, so iteration is always in
//! lexicographic key order. The hash input is the canonical
//! `key NUL value NUL ...` serialization of that ordering, fed through
//! SipHash-2-4 with a fixed zero key. The NUL separators keep the
//! serialization unambiguous (`{"ab"→"c"}` and `{"a"→"bc"}` hash
//! differently) and fixed keys keep the fingerprint stable across
//! processes and restarts.

use siphasher::sip::SipHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hasher;

/// 64-bit fingerprint of a [`SourceDict`].
///
/// Displays as 16 uppercase hex digits, the form used in bucket labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u64);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

/// Tag set identifying one metric series.
///
/// Canonical order is lexicographic by key, which the `BTreeMap`
/// representation enforces structurally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDict(BTreeMap<String, String>);

impl SourceDict {
    pub fn new() -> Self {
        SourceDict(BTreeMap::new())
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        SourceDict(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The stable 64-bit fingerprint of this tag set.
    ///
    /// Invariant: a pure function of the key-value *set*. Two dictionaries
    /// built in different insertion orders produce the same address.
    pub fn address(&self) -> Address {
        let mut hasher = SipHasher::new();
        for (key, value) in &self.0 {
            hasher.write(key.as_bytes());
            hasher.write(&[0]);
            hasher.write(value.as_bytes());
            hasher.write(&[0]);
        }
        Address(hasher.finish())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SourceDict {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        SourceDict::from_pairs(iter)
    }
}
