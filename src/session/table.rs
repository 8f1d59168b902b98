//! Ordered key → value results.

use std::collections::HashMap;

/// Final mapping from every queried key to its value, in input order.
///
/// A key queried more than once keeps the position of its first query and
/// the value of its last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    records: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: String) {
        match self.index.get(key) {
            Some(&pos) => self.records[pos].1 = value,
            None => {
                self.index.insert(key.to_string(), self.records.len());
                self.records.push((key.to_string(), value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&pos| self.records[pos].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render as `key<TAB>value` lines. Values are written verbatim.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.iter() {
            out.push_str(key);
            out.push('\t');
            out.push_str(value);
            out.push('\n');
        }
        out
    }
}
