//! Insertion-ordered frequency counting

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of a frequency table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEntry {
    pub value: String,
    pub count: u64,
}

/// Counts values while remembering the order they were first seen in
///
/// Ranking is by count, descending; equal counts keep first-seen order, so
/// the result is fully determined by the input sequence.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    index: HashMap<String, usize>,
    entries: Vec<CountEntry>,
}

impl FrequencyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: &str) {
        match self.index.get(value) {
            Some(&position) => self.entries[position].count += 1,
            None => {
                self.index.insert(value.to_string(), self.entries.len());
                self.entries.push(CountEntry {
                    value: value.to_string(),
                    count: 1,
                });
            }
        }
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `n` most frequent values
    pub fn top(&self, n: usize) -> Vec<CountEntry> {
        if n == 0 || self.is_empty() {
            return Vec::new();
        }
        let mut ranked = self.entries.clone();
        // sort_by is stable: ties stay in first-seen order
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(n);
        ranked
    }
}

impl<'a> FromIterator<&'a str> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut table = Self::new();
        for value in iter {
            table.add(value);
        }
        table
    }
}
