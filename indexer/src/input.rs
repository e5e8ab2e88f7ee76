use anyhow::{Context, Result};
use resonance_core::TextDocument;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg"];

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: serde_json::Value,
    #[serde(default, alias = "body")]
    text: serde_json::Value,
}

impl InputDoc {
    fn into_document(self) -> TextDocument {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        match self.text {
            serde_json::Value::String(text) => TextDocument { id, text: Some(text) },
            _ => TextDocument::missing(id),
        }
    }
}

/// `.json` / `.jsonl` files under `input` (or `input` itself), sorted for a stable order.
fn input_files(input: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    if input.is_file() {
        return vec![input.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .map(|ext| extensions.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Read `{ "id": ..., "text": ... }` records. A null or non-string `text` is kept as a
/// missing body so the builder can reject it by id.
pub fn load_text_corpus(input: &Path) -> Result<Vec<TextDocument>> {
    let mut docs = Vec::new();
    for file in input_files(input, &["json", "jsonl"]) {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            let reader = BufReader::new(File::open(&file)?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() { continue; }
                let doc: InputDoc = serde_json::from_str(&line)
                    .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
                docs.push(doc.into_document());
            }
        } else {
            let reader = BufReader::new(File::open(&file)?);
            let json: serde_json::Value = serde_json::from_reader(reader)
                .with_context(|| format!("parsing {}", file.display()))?;
            match json {
                serde_json::Value::Array(arr) => {
                    for v in arr {
                        let doc: InputDoc = serde_json::from_value(v)?;
                        docs.push(doc.into_document());
                    }
                }
                serde_json::Value::Object(_) => {
                    let doc: InputDoc = serde_json::from_value(json)?;
                    docs.push(doc.into_document());
                }
                _ => {}
            }
        }
    }
    tracing::info!(documents = docs.len(), input = %input.display(), "loaded text corpus");
    Ok(docs)
}

/// Audio files under `dir`; the document id is the file stem.
pub fn discover_audio(dir: &Path) -> Vec<(String, PathBuf)> {
    input_files(dir, AUDIO_EXTENSIONS)
        .into_iter()
        .filter_map(|p| {
            let stem = p.file_stem()?.to_str()?.to_string();
            Some((stem, p))
        })
        .collect()
}
