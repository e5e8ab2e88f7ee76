use super::decode::AudioSource;
use super::features::{FeatureConfig, FeatureExtractor, FrameVector};
use super::vocabulary::{AcousticVocabulary, FitReport, VocabularyConfig};
use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

pub const ACOUSTIC_INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcousticIndexConfig {
    pub features: FeatureConfig,
    pub vocabulary: VocabularyConfig,
}

/// Smoothed TF-IDF over word-count histograms:
/// `idf_j = ln((1 + n) / (1 + df_j)) + 1`, row = counts * idf, then L2-normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfTransform {
    idf: Vec<f64>,
}

impl TfidfTransform {
    pub fn fit(histograms: &[Vec<u32>], k: usize) -> Result<Self> {
        let mut df = vec![0usize; k];
        for hist in histograms {
            check_len(hist.len(), k)?;
            for (d, &c) in df.iter_mut().zip(hist) {
                if c > 0 {
                    *d += 1;
                }
            }
        }
        let n = histograms.len() as f64;
        let idf = df.iter().map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0).collect();
        Ok(Self { idf })
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    pub fn transform(&self, histogram: &[u32]) -> Result<Vec<f64>> {
        check_len(histogram.len(), self.idf.len())?;
        let mut row: Vec<f64> = histogram.iter().zip(&self.idf).map(|(&c, w)| c as f64 * w).collect();
        let norm = row.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(row)
    }
}

/// `(doc_id, raw count)` under one acoustic word. Serialized as a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, u32)", into = "(String, u32)")]
pub struct WordPosting {
    pub doc_id: String,
    pub count: u32,
}

impl From<(String, u32)> for WordPosting {
    fn from((doc_id, count): (String, u32)) -> Self {
        Self { doc_id, count }
    }
}

impl From<WordPosting> for (String, u32) {
    fn from(p: WordPosting) -> Self {
        (p.doc_id, p.count)
    }
}

/// Everything the acoustic searcher needs, persisted as one blob.
///
/// Row `i` of `histograms` and `weighted` belongs to `doc_ids[i]`. The inverted index
/// holds raw counts, not TF-IDF weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcousticIndex {
    pub version: u32,
    pub config: AcousticIndexConfig,
    pub vocabulary: AcousticVocabulary,
    pub doc_ids: Vec<String>,
    pub histograms: Vec<Vec<u32>>,
    pub tfidf: TfidfTransform,
    pub weighted: Vec<Vec<f64>>,
    pub inverted: BTreeMap<u32, Vec<WordPosting>>,
}

impl AcousticIndex {
    /// Vocabulary size K.
    pub fn k(&self) -> usize {
        self.vocabulary.size()
    }

    pub fn num_docs(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn postings(&self, word: u32) -> &[WordPosting] {
        self.inverted.get(&word).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Structural checks run after load: every row and the idf vector have length K.
    pub fn validate(&self) -> Result<()> {
        if self.version != ACOUSTIC_INDEX_VERSION {
            return Err(RetrievalError::Version { found: self.version, expected: ACOUSTIC_INDEX_VERSION });
        }
        let k = self.k();
        if self.vocabulary.dimension() != self.config.features.n_mfcc {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.config.features.n_mfcc,
                got: self.vocabulary.dimension(),
            });
        }
        check_len(self.tfidf.idf().len(), k)?;
        check_len(self.histograms.len(), self.doc_ids.len())?;
        check_len(self.weighted.len(), self.doc_ids.len())?;
        for row in &self.histograms {
            check_len(row.len(), k)?;
        }
        for row in &self.weighted {
            check_len(row.len(), k)?;
        }
        if let Some(&word) = self.inverted.keys().find(|&&w| w as usize >= k) {
            return Err(RetrievalError::DimensionMismatch { expected: k, got: word as usize + 1 });
        }
        if self.inverted != inverted_from_histograms(&self.doc_ids, &self.histograms) {
            return Err(RetrievalError::Inconsistent(
                "inverted postings do not match the stored histograms".into(),
            ));
        }
        Ok(())
    }
}

/// `word -> [(doc_id, count)]` for every non-zero count, in document order.
fn inverted_from_histograms(doc_ids: &[String], histograms: &[Vec<u32>]) -> BTreeMap<u32, Vec<WordPosting>> {
    let mut inverted: BTreeMap<u32, Vec<WordPosting>> = BTreeMap::new();
    for (doc_id, hist) in doc_ids.iter().zip(histograms) {
        for (word, &count) in hist.iter().enumerate() {
            if count > 0 {
                inverted
                    .entry(word as u32)
                    .or_default()
                    .push(WordPosting { doc_id: doc_id.clone(), count });
            }
        }
    }
    inverted
}

pub(crate) fn check_len(got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(RetrievalError::DimensionMismatch { expected, got });
    }
    Ok(())
}

/// A recording to index.
#[derive(Debug, Clone)]
pub struct AudioDocument {
    pub id: String,
    pub source: AudioSource,
}

impl AudioDocument {
    pub fn new(id: impl Into<String>, source: impl Into<AudioSource>) -> Self {
        Self { id: id.into(), source: source.into() }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AcousticBuildReport {
    pub documents: usize,
    pub fit: FitReport,
    pub extract_time: Duration,
    pub fit_time: Duration,
    pub histogram_time: Duration,
}

/// Two-phase batch build: fit the vocabulary over all frames, then histogram each
/// document against it.
#[derive(Debug, Clone)]
pub struct AcousticIndexBuilder {
    config: AcousticIndexConfig,
    extractor: FeatureExtractor,
}

impl AcousticIndexBuilder {
    pub fn new(config: AcousticIndexConfig) -> Result<Self> {
        let extractor = FeatureExtractor::new(config.features.clone())?;
        Ok(Self { config, extractor })
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Decode and featurize every document, then build. Fails on the first document
    /// that cannot be decoded.
    pub fn build(&self, documents: &[AudioDocument]) -> Result<(AcousticIndex, AcousticBuildReport)> {
        check_ids(documents.iter().map(|d| d.id.as_str()))?;
        let started = Instant::now();
        let mut corpus = Vec::with_capacity(documents.len());
        for doc in documents {
            let frames = self.extractor.extract_source(&doc.source).map_err(|e| match e {
                RetrievalError::AudioDecode { reason, .. } => {
                    RetrievalError::AudioDecode { source_name: doc.id.clone(), reason }
                }
                other => other,
            })?;
            tracing::debug!(doc_id = %doc.id, frames = frames.len(), "extracted frames");
            corpus.push((doc.id.clone(), frames));
        }
        let extract_time = started.elapsed();
        let (index, mut report) = self.build_from_frames(corpus)?;
        report.extract_time = extract_time;
        Ok((index, report))
    }

    /// Build from already-extracted frame sequences, in the given document order.
    pub fn build_from_frames(
        &self,
        corpus: Vec<(String, Vec<FrameVector>)>,
    ) -> Result<(AcousticIndex, AcousticBuildReport)> {
        check_ids(corpus.iter().map(|(id, _)| id.as_str()))?;
        let (doc_ids, sequences): (Vec<String>, Vec<Vec<FrameVector>>) = corpus.into_iter().unzip();

        let fit_started = Instant::now();
        let (vocabulary, fit) = AcousticVocabulary::fit(&sequences, &self.config.vocabulary)?;
        let fit_time = fit_started.elapsed();
        let k = vocabulary.size();

        let hist_started = Instant::now();
        let mut histograms = Vec::with_capacity(sequences.len());
        for frames in &sequences {
            let hist = vocabulary.histogram(frames)?;
            check_len(hist.len(), k)?;
            histograms.push(hist);
        }
        let inverted = inverted_from_histograms(&doc_ids, &histograms);

        let tfidf = TfidfTransform::fit(&histograms, k)?;
        let weighted = histograms.iter().map(|h| tfidf.transform(h)).collect::<Result<Vec<_>>>()?;
        let histogram_time = hist_started.elapsed();

        let index = AcousticIndex {
            version: ACOUSTIC_INDEX_VERSION,
            config: self.config.clone(),
            vocabulary,
            doc_ids,
            histograms,
            tfidf,
            weighted,
            inverted,
        };
        tracing::info!(
            num_docs = index.num_docs(),
            clusters = k,
            words_used = index.inverted.len(),
            fit_ms = fit_time.as_millis() as u64,
            "built acoustic index"
        );
        let report = AcousticBuildReport {
            documents: index.num_docs(),
            fit,
            extract_time: Duration::ZERO,
            fit_time,
            histogram_time,
        };
        Ok((index, report))
    }
}

fn check_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.is_empty() {
            return Err(RetrievalError::data("", "empty document id"));
        }
        if !seen.insert(id) {
            return Err(RetrievalError::data(id, "duplicate document id in batch"));
        }
    }
    Ok(())
}
