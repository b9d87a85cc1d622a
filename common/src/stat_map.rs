use std::{collections::HashMap, hash::Hash};

use crate::field::Value;

/// Keyed values that remember insertion order.
///
/// Reports and the derived passes walk stats in the order fields were first
/// recorded, so a plain [`HashMap`] is not enough.
#[derive(Debug, Clone, PartialEq)]
pub struct StatMap<K: Eq + Hash> {
    entries: Vec<(K, Value)>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash> Default for StatMap<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> StatMap<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`, a replaced key keeps its position.
    pub fn insert(&mut self, key: K, value: Value) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Inserts `key` only if absent. Returns whether the value was stored.
    pub fn insert_new(&mut self, key: K, value: Value) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.insert(key, value);
        true
    }

    pub fn get(&self, key: &K) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl<K: Eq + Hash + Clone> Extend<(K, Value)> for StatMap<K> {
    fn extend<T: IntoIterator<Item = (K, Value)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Eq + Hash + Clone> FromIterator<(K, Value)> for StatMap<K> {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Eq + Hash> IntoIterator for StatMap<K> {
    type Item = (K, Value);
    type IntoIter = std::vec::IntoIter<(K, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Reduced fields of one (benchmark, experiment) pair, keyed by field name.
pub type AggregatedStats = StatMap<String>;

impl AggregatedStats {
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(Value::as_f64)
    }
}
