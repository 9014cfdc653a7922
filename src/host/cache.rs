//! Persistent document-symbol cache, keyed by `(relative_path, include_body)`
//! and invalidated by content hash. Mirrors the pickle-backed cache this
//! was ported from, using `bincode` as the binary serialization format and
//! a schema-versioned filename instead of a schema-versioned pickle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::symbol::UnifiedSymbol;

const CACHE_SCHEMA_VERSION: &str = "v1";

pub type DocumentSymbolsResult = (Vec<UnifiedSymbol>, Vec<UnifiedSymbol>);

#[derive(Serialize, Deserialize, Default)]
struct CacheEntry {
    content_hash: String,
    flat: Vec<UnifiedSymbol>,
    roots: Vec<UnifiedSymbol>,
}

#[derive(Serialize, Deserialize, Default)]
struct CacheFile {
    entries: HashMap<String, CacheEntry>,
}

pub struct DocumentSymbolCache {
    path: PathBuf,
    state: Mutex<CacheState>,
}

struct CacheState {
    file: CacheFile,
    dirty: bool,
}

impl DocumentSymbolCache {
    pub fn cache_path(project_root: &Path, language_id: &str) -> PathBuf {
        project_root
            .join(".codecore")
            .join("cache")
            .join(language_id)
            .join(format!("document_symbols_cache_{CACHE_SCHEMA_VERSION}.bin"))
    }

    /// Loads from disk, discarding (not erroring on) a corrupted or
    /// schema-mismatched file.
    pub fn load(project_root: &Path, language_id: &str) -> Self {
        let path = Self::cache_path(project_root, language_id);
        let file = std::fs::read(&path)
            .ok()
            .and_then(|bytes| bincode::deserialize::<CacheFile>(&bytes).ok())
            .unwrap_or_default();
        Self {
            path,
            state: Mutex::new(CacheState { file, dirty: false }),
        }
    }

    fn key(relative_path: &str, include_body: bool) -> String {
        format!("{relative_path}-{include_body}")
    }

    /// Returns the cached result only if `content_hash` still matches.
    pub fn get(&self, relative_path: &str, include_body: bool, content_hash: &str) -> Option<DocumentSymbolsResult> {
        let state = self.state.lock().expect("cache mutex poisoned");
        let key = Self::key(relative_path, include_body);
        let entry = state.file.entries.get(&key)?;
        if entry.content_hash == content_hash {
            Some((entry.flat.clone(), entry.roots.clone()))
        } else {
            None
        }
    }

    pub fn put(&self, relative_path: &str, include_body: bool, content_hash: String, result: DocumentSymbolsResult) {
        let mut state = self.state.lock().expect("cache mutex poisoned");
        let key = Self::key(relative_path, include_body);
        state.file.entries.insert(
            key,
            CacheEntry {
                content_hash,
                flat: result.0,
                roots: result.1,
            },
        );
        state.dirty = true;
    }

    /// Writes to disk only when something changed since the last save.
    pub fn save(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().expect("cache mutex poisoned");
        if !state.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = bincode::serialize(&state.file)?;
        std::fs::write(&self.path, bytes)?;
        state.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::SymbolKind;

    fn dummy_symbol() -> UnifiedSymbol {
        use crate::symbol::{Location, Position, Range};
        UnifiedSymbol {
            name: "foo".into(),
            kind: SymbolKind::FUNCTION,
            location: Location::new(PathBuf::from("/p/m.py"), "m.py".into(), Range {
                start: Position { line: 0, character: 0 },
                end: Position { line: 1, character: 0 },
            }),
            selection_range: Range {
                start: Position { line: 0, character: 4 },
                end: Position { line: 0, character: 7 },
            },
            body: None,
            children: vec![],
        }
    }

    #[test]
    fn miss_then_hit_then_invalidated_by_hash_change() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DocumentSymbolCache::load(tmp.path(), "python");
        assert!(cache.get("m.py", false, "hash1").is_none());

        cache.put("m.py", false, "hash1".into(), (vec![dummy_symbol()], vec![]));
        let hit = cache.get("m.py", false, "hash1");
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().0.len(), 1);

        assert!(cache.get("m.py", false, "hash2").is_none());
    }

    #[test]
    fn save_is_a_no_op_when_nothing_changed() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DocumentSymbolCache::load(tmp.path(), "python");
        cache.save().unwrap();
        assert!(!DocumentSymbolCache::cache_path(tmp.path(), "python").exists());

        cache.put("m.py", false, "hash1".into(), (vec![dummy_symbol()], vec![]));
        cache.save().unwrap();
        assert!(DocumentSymbolCache::cache_path(tmp.path(), "python").exists());

        let written_at = std::fs::metadata(DocumentSymbolCache::cache_path(tmp.path(), "python"))
            .unwrap()
            .modified()
            .unwrap();
        cache.save().unwrap();
        let still_at = std::fs::metadata(DocumentSymbolCache::cache_path(tmp.path(), "python"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(written_at, still_at);
    }

    #[test]
    fn corrupted_cache_file_is_discarded_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = DocumentSymbolCache::cache_path(tmp.path(), "python");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not a valid bincode payload at all").unwrap();

        let cache = DocumentSymbolCache::load(tmp.path(), "python");
        assert!(cache.get("m.py", false, "hash1").is_none());
    }
}
