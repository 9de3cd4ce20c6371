//! Case-insensitive HTTP header multimap.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Case-insensitive header multimap with canonical lowercase storage.
///
/// Lookups and removals accept any casing; names are lowercased on insert.
/// Values under one name keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HttpHeaders {
    entries: BTreeMap<String, Vec<String>>,
}

impl HttpHeaders {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to exactly one value, replacing any existing values.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(name.as_ref().to_ascii_lowercase(), vec![value.into()]);
    }

    /// Add a value under `name`, keeping existing values.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(name.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// First value under `name`, if any.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        self.entries
            .get(&name.as_ref().to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values under `name`, in insertion order.
    pub fn get_all(&self, name: impl AsRef<str>) -> &[String] {
        self.entries
            .get(&name.as_ref().to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Remove all values under `name`, returning them if present.
    pub fn remove(&mut self, name: impl AsRef<str>) -> Option<Vec<String>> {
        self.entries.remove(&name.as_ref().to_ascii_lowercase())
    }

    /// Whether any value exists under `name`.
    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.entries
            .contains_key(&name.as_ref().to_ascii_lowercase())
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs, one pair per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(name, values)| {
            values.iter().map(move |value| (name.as_str(), value.as_str()))
        })
    }

    /// Merge `defaults` underneath this map: names already present here win
    /// wholesale, names only in `defaults` are copied in.
    pub fn merge_defaults(&mut self, defaults: &HttpHeaders) {
        for (name, values) in &defaults.entries {
            if !self.entries.contains_key(name) {
                self.entries.insert(name.clone(), values.clone());
            }
        }
    }

    /// Build from an `http::HeaderMap`, lossily dropping non-UTF-8 values.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            if let Ok(value) = value.to_str() {
                headers.append(name.as_str(), value);
            }
        }
        headers
    }

    /// Convert to an `http::HeaderMap`, skipping values that are not valid
    /// header values.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in self.iter() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                map.append(name, value);
            }
        }
        map
    }
}

impl<S1, S2> FromIterator<(S1, S2)> for HttpHeaders
where
    S1: AsRef<str>,
    S2: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (S1, S2)>>(iter: T) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}
