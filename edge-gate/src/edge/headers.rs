// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Ordered, case-insensitive header multimap.
//!
//! Lookup contract:
//! - names compare ASCII case-insensitively and are stored lower-cased
//! - each name keeps its values in the order they were appended
//! - `first` returns the earliest value appended for a name
//! - names keep the order in which they were first seen

/// Header storage for edge requests and responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMultiMap {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderMultiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(name, value)` pairs, preserving their order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            map.append(name.as_ref(), value);
        }
        map
    }

    /// Append a value after any existing values for `name`.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let key = name.to_ascii_lowercase();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into()),
            None => self.entries.push((key, vec![value.into()])),
        }
    }

    /// Replace every value of `name` with a single value.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.append(name, value);
    }

    /// First value appended for `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(|v| v.as_str())
    }

    /// All values of `name`, in append order.
    pub fn values(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// True when `name` is present with at least one value.
    pub fn contains(&self, name: &str) -> bool {
        !self.values(name).is_empty()
    }

    /// Drop every value of `name` but keep the name itself, leaving an empty list.
    pub fn clear_values(&mut self, name: &str) {
        if let Some((_, values)) = self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            values.clear();
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Iterate `(name, value)` pairs; names are lower-cased.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.is_empty())
    }
}
