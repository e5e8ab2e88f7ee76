//! Named indexes ("tables") under one data directory.
//!
//! ```text
//! <root>/<table>/index.json        text index
//! <root>/<table>/meta.json
//! <root>/<table>/audio_index.bin   acoustic index
//! ```
//!
//! Loaded searchers are cached and shared; `reload` is the only way to pick up a
//! rebuilt index.

use crate::audio::{AcousticSearcher, AudioSource, StrategyComparison};
use crate::error::{Result, RetrievalError};
use crate::persist::{load_acoustic_index, load_text_index, IndexPaths};
use crate::rank::SearchResults;
use crate::search::TextSearcher;
use crate::tokenizer::Tokenizer;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Catalog {
    root: PathBuf,
    tokenizer: Tokenizer,
    text: RwLock<HashMap<String, Arc<TextSearcher>>>,
    audio: RwLock<HashMap<String, Arc<AcousticSearcher>>>,
}

impl Catalog {
    pub fn new<P: AsRef<Path>>(root: P, tokenizer: Tokenizer) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            tokenizer,
            text: RwLock::new(HashMap::new()),
            audio: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self, table: &str) -> Result<IndexPaths> {
        validate_table_name(table)?;
        Ok(IndexPaths::new(self.root.join(table)))
    }

    pub fn create_table(&self, table: &str) -> Result<IndexPaths> {
        let paths = self.paths(table)?;
        std::fs::create_dir_all(&paths.root)?;
        tracing::info!(table, path = %paths.root.display(), "created table");
        Ok(paths)
    }

    /// Table names with a directory under the root, sorted.
    pub fn tables(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn existing_paths(&self, table: &str) -> Result<IndexPaths> {
        let paths = self.paths(table)?;
        if !paths.root.is_dir() {
            return Err(RetrievalError::TableNotFound(table.to_string()));
        }
        Ok(paths)
    }

    pub fn text_searcher(&self, table: &str) -> Result<Arc<TextSearcher>> {
        if let Some(s) = self.text.read().get(table) {
            return Ok(Arc::clone(s));
        }
        let paths = self.existing_paths(table)?;
        let searcher = Arc::new(TextSearcher::load(load_text_index(&paths)?, self.tokenizer.clone()));
        // another caller may have loaded it meanwhile; keep whichever landed first
        let mut cache = self.text.write();
        Ok(Arc::clone(cache.entry(table.to_string()).or_insert(searcher)))
    }

    pub fn acoustic_searcher(&self, table: &str) -> Result<Arc<AcousticSearcher>> {
        if let Some(s) = self.audio.read().get(table) {
            return Ok(Arc::clone(s));
        }
        let paths = self.existing_paths(table)?;
        let searcher = Arc::new(AcousticSearcher::load(load_acoustic_index(&paths)?)?);
        let mut cache = self.audio.write();
        Ok(Arc::clone(cache.entry(table.to_string()).or_insert(searcher)))
    }

    /// Rank a table's documents against keyword text, as handed over by a query front end.
    pub fn search_text(&self, table: &str, keyword_text: &str, limit: usize) -> Result<SearchResults> {
        Ok(self.text_searcher(table)?.search(keyword_text, limit))
    }

    pub fn search_audio(&self, table: &str, query: &AudioSource, limit: usize) -> Result<StrategyComparison> {
        self.acoustic_searcher(table)?.compare_source(query, limit)
    }

    /// Drop cached searchers for `table` so the next lookup re-reads from disk.
    pub fn reload(&self, table: &str) {
        let text = self.text.write().remove(table).is_some();
        let audio = self.audio.write().remove(table).is_some();
        tracing::info!(table, text, audio, "invalidated cached indexes");
    }
}

fn validate_table_name(table: &str) -> Result<()> {
    let ok = !table.is_empty()
        && table != "."
        && table != ".."
        && table.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(RetrievalError::Config(format!("invalid table name '{table}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_cannot_escape_root() {
        assert!(validate_table_name("songs").is_ok());
        assert!(validate_table_name("spotify_2024").is_ok());
        assert!(validate_table_name("../etc").is_err());
        assert!(validate_table_name("a/b").is_err());
        assert!(validate_table_name("").is_err());
    }
}
