use super::decode::{AudioSource, Waveform};
use super::features::FeatureExtractor;
use super::index::{check_len, AcousticIndex};
use crate::error::Result;
use crate::rank::{rank_scores, top_k, EmptyReason, Hit, SearchResults};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A ranking plus the wall-clock time it took, extraction included.
#[derive(Debug, Clone)]
pub struct Timed {
    pub results: SearchResults,
    pub elapsed: Duration,
}

/// Both strategies run against the same query.
///
/// Sequential scores are cosine similarities in `[-1, 1]`; inverted scores are raw
/// count products. Compare rankings, never scores, across the two.
#[derive(Debug, Clone)]
pub struct StrategyComparison {
    pub sequential: Timed,
    pub inverted: Timed,
}

impl StrategyComparison {
    /// Document ids present in both top-k lists.
    pub fn overlap(&self) -> Vec<&str> {
        self.sequential
            .results
            .doc_ids()
            .filter(|id| self.inverted.results.doc_ids().any(|other| other == *id))
            .collect()
    }
}

/// Read-only query engine over a loaded [`AcousticIndex`].
#[derive(Debug, Clone)]
pub struct AcousticSearcher {
    index: AcousticIndex,
    extractor: FeatureExtractor,
}

impl AcousticSearcher {
    pub fn load(index: AcousticIndex) -> Result<Self> {
        index.validate()?;
        let extractor = FeatureExtractor::new(index.config.features.clone())?;
        tracing::info!(num_docs = index.num_docs(), clusters = index.k(), "acoustic index loaded");
        Ok(Self { index, extractor })
    }

    pub fn index(&self) -> &AcousticIndex {
        &self.index
    }

    /// Raw length-K word histogram of a query, or `None` when it has no frames.
    pub fn query_histogram(&self, query: &Waveform) -> Result<Option<Vec<u32>>> {
        let frames = self.extractor.extract(query);
        if frames.is_empty() {
            return Ok(None);
        }
        let hist = self.index.vocabulary.histogram(&frames)?;
        check_len(hist.len(), self.index.k())?;
        Ok(Some(hist))
    }

    /// Dense strategy: TF-IDF the query and take cosine similarity against every row.
    pub fn sequential(&self, query: &Waveform, k: usize) -> Result<SearchResults> {
        match self.query_histogram(query)? {
            Some(hist) => self.sequential_histogram(&hist, k),
            None => Ok(SearchResults::empty(EmptyReason::QueryHasNoFrames)),
        }
    }

    /// Sparse strategy: accumulate `query_count * doc_count` over shared words only.
    pub fn inverted(&self, query: &Waveform, k: usize) -> Result<SearchResults> {
        match self.query_histogram(query)? {
            Some(hist) => self.inverted_histogram(&hist, k),
            None => Ok(SearchResults::empty(EmptyReason::QueryHasNoFrames)),
        }
    }

    pub fn sequential_histogram(&self, histogram: &[u32], k: usize) -> Result<SearchResults> {
        check_len(histogram.len(), self.index.k())?;
        if self.index.num_docs() == 0 {
            return Ok(SearchResults::empty(EmptyReason::EmptyIndex));
        }
        if k == 0 {
            return Ok(SearchResults::empty(EmptyReason::ZeroLimit));
        }
        let query = self.index.tfidf.transform(histogram)?;
        let hits = self
            .index
            .doc_ids
            .iter()
            .zip(&self.index.weighted)
            .map(|(doc_id, row)| Hit { doc_id: doc_id.clone(), score: cosine(&query, row) })
            .collect();
        Ok(SearchResults::from_hits(top_k(hits, k)))
    }

    pub fn inverted_histogram(&self, histogram: &[u32], k: usize) -> Result<SearchResults> {
        check_len(histogram.len(), self.index.k())?;
        if self.index.num_docs() == 0 {
            return Ok(SearchResults::empty(EmptyReason::EmptyIndex));
        }
        if k == 0 {
            return Ok(SearchResults::empty(EmptyReason::ZeroLimit));
        }
        let mut scores: HashMap<String, f64> = HashMap::new();
        for (word, &query_count) in histogram.iter().enumerate() {
            if query_count == 0 {
                continue;
            }
            for p in self.index.postings(word as u32) {
                *scores.entry(p.doc_id.clone()).or_insert(0.0) += query_count as f64 * p.count as f64;
            }
        }
        if scores.is_empty() {
            return Ok(SearchResults::empty(EmptyReason::NoSharedWords));
        }
        Ok(SearchResults::from_hits(rank_scores(scores, k)))
    }

    /// Run both strategies on one decoded query, timing each end to end.
    pub fn compare(&self, query: &Waveform, k: usize) -> Result<StrategyComparison> {
        let started = Instant::now();
        let sequential = self.sequential(query, k)?;
        let sequential = Timed { results: sequential, elapsed: started.elapsed() };

        let started = Instant::now();
        let inverted = self.inverted(query, k)?;
        let inverted = Timed { results: inverted, elapsed: started.elapsed() };

        tracing::debug!(
            sequential_us = sequential.elapsed.as_micros() as u64,
            inverted_us = inverted.elapsed.as_micros() as u64,
            "compared acoustic strategies"
        );
        Ok(StrategyComparison { sequential, inverted })
    }

    /// Like [`compare`](Self::compare), but decodes first. An undecodable query yields
    /// empty rankings carrying the decode failure as their reason.
    pub fn compare_source(&self, source: &AudioSource, k: usize) -> Result<StrategyComparison> {
        let started = Instant::now();
        let wave = match source.decode() {
            Ok(wave) => wave,
            Err(e) => {
                let results = SearchResults::empty(EmptyReason::UndecodableQuery(e.to_string()));
                let timed = Timed { results, elapsed: started.elapsed() };
                return Ok(StrategyComparison { sequential: timed.clone(), inverted: timed });
            }
        };
        let decode_time = started.elapsed();
        let mut comparison = self.compare(&wave, k)?;
        comparison.sequential.elapsed += decode_time;
        comparison.inverted.elapsed += decode_time;
        Ok(comparison)
    }
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-12);
    }
}
