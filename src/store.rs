use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::RwLock;

use aho_corasick::{AhoCorasick, MatchKind};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, VeilError};

#[derive(Debug, Default)]
struct Entries {
    /// `(token, original)` in first-insertion order.
    pairs: Vec<(String, String)>,
    /// Token -> position in `pairs`.
    index: HashMap<String, usize>,
}

impl Entries {
    fn insert(&mut self, token: String, original: String) {
        match self.index.get(&token) {
            Some(&pos) => self.pairs[pos].1 = original,
            None => {
                self.index.insert(token.clone(), self.pairs.len());
                self.pairs.push((token, original));
            }
        }
    }
}

/// Reversible token -> original mapping.
///
/// Safe to share behind an `Arc` across pipelines, buffers and threads.
/// Recording an existing token overwrites its original in place.
#[derive(Debug, Default)]
pub struct TokenStore {
    entries: RwLock<Entries>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, token: &str, original: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(token.to_string(), original.to_string());
    }

    pub fn get(&self, token: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .index
            .get(token)
            .map(|&pos| entries.pairs[pos].1.clone())
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .pairs
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all pairs in insertion order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .pairs
            .clone()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.pairs.clear();
        entries.index.clear();
    }

    /// Copy every pair of `other` into this store (last write wins).
    pub fn merge(&self, other: &TokenStore) {
        let incoming = other.entries();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        for (token, original) in incoming {
            entries.insert(token, original);
        }
    }

    /// Replace every known token in `text` with its original.
    ///
    /// All tokens are matched in one leftmost-longest pass, so a token that is
    /// a prefix of another (`T1` vs `T10`) never clobbers the longer one.
    pub fn reveal(&self, text: &str) -> Result<String> {
        let (tokens, originals): (Vec<String>, Vec<String>) = self
            .entries()
            .into_iter()
            .filter(|(token, _)| !token.is_empty())
            .unzip();
        if tokens.is_empty() {
            return Ok(text.to_string());
        }

        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&tokens)
            .map_err(|e| VeilError::Store {
                reason: format!("cannot index tokens: {e}"),
            })?;
        Ok(automaton.replace_all(text, &originals))
    }

    /// Write the mapping as a flat JSON object, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;

        tracing::info!(path = %path.display(), entries = self.len(), "saved token store");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let store: Self = serde_json::from_str(&contents)?;
        tracing::info!(path = %path.display(), entries = store.len(), "loaded token store");
        Ok(store)
    }
}

impl Serialize for TokenStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let pairs = self.entries();
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (token, original) in &pairs {
            map.serialize_entry(token, original)?;
        }
        map.end()
    }
}

struct StoreVisitor;

impl<'de> Visitor<'de> for StoreVisitor {
    type Value = TokenStore;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of token strings to original strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<TokenStore, A::Error> {
        let mut entries = Entries::default();
        while let Some((token, original)) = access.next_entry::<String, String>()? {
            entries.insert(token, original);
        }
        Ok(TokenStore {
            entries: RwLock::new(entries),
        })
    }
}

impl<'de> Deserialize<'de> for TokenStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(StoreVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_reveal() {
        let store = TokenStore::new();
        store.record("[REDACTED_1]", "alice@example.com");
        assert_eq!(
            store.reveal("mail [REDACTED_1] now").unwrap(),
            "mail alice@example.com now"
        );
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let store = TokenStore::new();
        store.record("a", "1");
        store.record("b", "2");
        store.record("a", "3");
        assert_eq!(
            store.entries(),
            vec![("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn test_prefix_tokens_do_not_collide() {
        let store = TokenStore::new();
        store.record("T1", "one");
        store.record("T10", "ten");
        assert_eq!(store.reveal("T10 T1").unwrap(), "ten one");
    }

    #[test]
    fn test_reveal_empty_store_is_identity() {
        assert_eq!(TokenStore::new().reveal("[REDACTED_1]").unwrap(), "[REDACTED_1]");
    }

    #[test]
    fn test_serialization_preserves_order() {
        let store = TokenStore::new();
        store.record("z", "last letter");
        store.record("a", "first letter");
        let json = serde_json::to_string(&store).unwrap();
        assert_eq!(json, r#"{"z":"last letter","a":"first letter"}"#);
    }

    #[test]
    fn test_load_rejects_non_string_values() {
        let result: std::result::Result<TokenStore, _> = serde_json::from_str(r#"{"t": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_merge() {
        let a = TokenStore::new();
        a.record("x", "1");
        let b = TokenStore::new();
        b.record("y", "2");
        a.merge(&b);
        assert_eq!(a.len(), 2);
        a.merge(&a);
        assert_eq!(a.len(), 2);
    }
}
