use crate::index::InvertedIndex;
use crate::rank::{rank_scores, EmptyReason, SearchResults};
use crate::tokenizer::Tokenizer;
use std::collections::HashMap;

/// Substituted for a missing or zero document norm.
pub const NORM_EPSILON: f64 = 1e-6;

/// Read-only cosine ranking over a loaded [`InvertedIndex`].
///
/// Query weights use the load-time document frequency `ln(N / (1 + |postings|))`, which
/// differs from the streaming idf baked into the stored document weights. Every call
/// uses its own accumulators, so one searcher can serve concurrent queries.
#[derive(Debug, Clone)]
pub struct TextSearcher {
    tokenizer: Tokenizer,
    index: InvertedIndex,
}

impl TextSearcher {
    pub fn load(index: InvertedIndex, tokenizer: Tokenizer) -> Self {
        tracing::info!(num_docs = index.num_docs(), num_terms = index.num_terms(), "text index loaded");
        Self { tokenizer, index }
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn search(&self, query: &str, top_k: usize) -> SearchResults {
        let start = std::time::Instant::now();
        let terms = self.tokenizer.tokenize(query);
        if terms.is_empty() {
            return SearchResults::empty(EmptyReason::EmptyQuery);
        }
        if self.index.is_empty() {
            return SearchResults::empty(EmptyReason::EmptyIndex);
        }
        if top_k == 0 {
            return SearchResults::empty(EmptyReason::ZeroLimit);
        }

        let mut query_tf: Vec<(String, u32)> = Vec::new();
        for term in terms {
            match query_tf.iter_mut().find(|(t, _)| *t == term) {
                Some((_, c)) => *c += 1,
                None => query_tf.push((term, 1)),
            }
        }

        let n_docs = self.index.num_docs() as f64;
        let matched: Vec<(&str, f64, u32)> = query_tf
            .iter()
            .filter_map(|(term, tf)| {
                let plist = self.index.postings.get(term)?;
                let idf = (n_docs / (1.0 + plist.len() as f64)).ln();
                Some((term.as_str(), *tf as f64 * idf, *tf))
            })
            .collect();
        if matched.is_empty() {
            return SearchResults::empty(EmptyReason::NoMatchingTerms);
        }

        // When every matched idf vanishes the weighted query has no direction; rank by
        // raw query counts instead.
        let degenerate = matched.iter().all(|(_, wq, _)| *wq == 0.0);
        let mut scores: HashMap<String, f64> = HashMap::new();
        let mut query_norm_sq = 0.0f64;
        for (term, wq, tf) in matched {
            let wq = if degenerate { tf as f64 } else { wq };
            query_norm_sq += wq * wq;
            for p in self.index.postings(term) {
                *scores.entry(p.doc_id.clone()).or_insert(0.0) += p.weight * wq;
            }
        }

        let query_norm = query_norm_sq.sqrt();
        for (doc_id, score) in scores.iter_mut() {
            let doc_norm = self
                .index
                .doc_norms
                .get(doc_id)
                .copied()
                .filter(|n| *n > 0.0)
                .unwrap_or(NORM_EPSILON);
            *score /= query_norm * doc_norm;
        }

        let hits = rank_scores(scores, top_k);
        tracing::debug!(query, hits = hits.len(), took_us = start.elapsed().as_micros() as u64, "text search");
        SearchResults::from_hits(hits)
    }
}
