use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::{decode_envelope, encode_envelope, write_atomic};

/// The fixed set of counter categories (spec §3, §4.12). Counters within a
/// category are created lazily on first increment.
pub const CATEGORIES: &[&str] = &[
    "commands",
    "replies",
    "curses",
    "cursers",
    "insulted",
    "praised",
    "thanked",
    "atnoisers",
    "yubifail",
];

/// Process-wide `map[category][name] -> count`, persisted as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    categories: HashMap<String, HashMap<String, u64>>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// The only write operation: increments `category/name` by one,
    /// creating both lazily if this is the first time they're seen.
    pub fn increment(&mut self, category: &str, name: &str) {
        *self
            .categories
            .entry(category.to_string())
            .or_default()
            .entry(name.to_string())
            .or_insert(0) += 1;
    }

    pub fn get(&self, category: &str, name: &str) -> u64 {
        self.categories
            .get(category)
            .and_then(|m| m.get(name))
            .copied()
            .unwrap_or(0)
    }

    /// Names in `category` ordered by descending count, for `!top` queries.
    /// Ties broken alphabetically for deterministic output.
    pub fn get_sorted_keys(&self, category: &str) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .categories
            .get(category)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    /// Load the counters dump (spec §6's second self-describing length-
    /// prefixed binary file). Missing file yields empty counters (first
    /// boot), matching [`crate::store::ChannelStore::load`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = fs::read(path)?;
        decode_envelope(&bytes)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = encode_envelope(self)?;
        write_atomic(path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_creates_category_and_name_lazily() {
        let mut c = Counters::new();
        assert_eq!(c.get("commands", "help"), 0);
        c.increment("commands", "help");
        assert_eq!(c.get("commands", "help"), 1);
        c.increment("commands", "help");
        assert_eq!(c.get("commands", "help"), 2);
    }

    #[test]
    fn sorted_keys_descend_by_count_then_name() {
        let mut c = Counters::new();
        c.increment("commands", "b");
        c.increment("commands", "a");
        c.increment("commands", "a");
        let sorted = c.get_sorted_keys("commands");
        assert_eq!(sorted, vec![("a".to_string(), 2), ("b".to_string(), 1)]);
    }

    #[test]
    fn round_trips_through_json() {
        let mut c = Counters::new();
        c.increment("replies", "hi");
        let encoded = serde_json::to_string(&c).unwrap();
        let decoded: Counters = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.get("replies", "hi"), 1);
    }

    #[test]
    fn load_missing_file_yields_empty_counters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.db");
        let c = Counters::load(&path).unwrap();
        assert_eq!(c.get("commands", "help"), 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.db");
        let mut c = Counters::new();
        c.increment("commands", "help");
        c.increment("commands", "help");
        c.save(&path).unwrap();

        let loaded = Counters::load(&path).unwrap();
        assert_eq!(loaded.get("commands", "help"), 2);
    }
}
