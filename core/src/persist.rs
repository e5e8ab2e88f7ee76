use crate::audio::AcousticIndex;
use crate::error::{Result, RetrievalError};
use crate::index::InvertedIndex;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const TEXT_INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: usize,
    pub num_terms: usize,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn for_index(index: &InvertedIndex) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { num_docs: index.num_docs(), num_terms: index.num_terms(), created_at, version: TEXT_INDEX_VERSION }
    }
}

/// File layout of one index directory.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn text_index(&self) -> PathBuf { self.root.join("index.json") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn audio_index(&self) -> PathBuf { self.root.join("audio_index.bin") }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    match File::open(path) {
        Ok(f) => Ok(BufReader::new(f)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RetrievalError::NotFound(path.to_path_buf())),
        Err(e) => Err(e.into()),
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Write `{"index": {...}, "doc_norms": {...}}` plus the sidecar `meta.json`.
pub fn save_text_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    let mut f = create(&paths.text_index())?;
    serde_json::to_writer(&mut f, index)?;
    f.flush()?;
    save_meta(paths, &MetaFile::for_index(index))?;
    tracing::info!(path = %paths.text_index().display(), num_docs = index.num_docs(), "saved text index");
    Ok(())
}

pub fn load_text_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let index: InvertedIndex = serde_json::from_reader(open(&paths.text_index())?)?;
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let mut f = create(&paths.meta())?;
    serde_json::to_writer_pretty(&mut f, meta)?;
    f.flush()?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let meta: MetaFile = serde_json::from_reader(open(&paths.meta())?)?;
    Ok(meta)
}

pub fn save_acoustic_index(paths: &IndexPaths, index: &AcousticIndex) -> Result<()> {
    let mut f = create(&paths.audio_index())?;
    bincode::serialize_into(&mut f, index)?;
    f.flush()?;
    tracing::info!(path = %paths.audio_index().display(), num_docs = index.num_docs(), "saved acoustic index");
    Ok(())
}

/// Load and structurally validate the acoustic blob.
pub fn load_acoustic_index(paths: &IndexPaths) -> Result<AcousticIndex> {
    let index: AcousticIndex = bincode::deserialize_from(open(&paths.audio_index())?)?;
    index.validate()?;
    Ok(index)
}
