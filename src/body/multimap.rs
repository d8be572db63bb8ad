//! An insertion-ordered multimap keyed by strings.

/// Keeps every value appended under a key, in arrival order.
///
/// Repeated keys are normal in form submissions, so `append` never
/// replaces. Bodies are capped at a handful of entries, which makes the
/// linear lookups cheaper than hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringMultiMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> StringMultiMap<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add `value` under `key`, keeping any earlier values.
    pub fn append(&mut self, key: impl Into<String>, value: T) {
        self.entries.push((key.into(), value));
    }

    /// The first value appended under `key`.
    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Every value under `key`, oldest first.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a T> + 'a {
        self.entries.iter().filter(move |(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Distinct keys in order of first appearance.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (key, _) in &self.entries {
            if !keys.contains(&key.as_str()) {
                keys.push(key.as_str());
            }
        }
        keys
    }

    /// Total number of values across all keys.
    pub fn value_count(&self) -> usize {
        self.entries.len()
    }

    pub fn key_count(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<T> Default for StringMultiMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for StringMultiMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.append(key, value);
        }
        map
    }
}
