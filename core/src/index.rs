use crate::error::{Result, RetrievalError};
use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One `(document, weight)` entry under a term. Serialized as `[doc_id, weight]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, f64)", into = "(String, f64)")]
pub struct Posting {
    pub doc_id: String,
    pub weight: f64,
}

impl From<(String, f64)> for Posting {
    fn from((doc_id, weight): (String, f64)) -> Self {
        Self { doc_id, weight }
    }
}

impl From<Posting> for (String, f64) {
    fn from(p: Posting) -> Self {
        (p.doc_id, p.weight)
    }
}

/// Term → postings in insertion order, plus one L2 norm per indexed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    #[serde(rename = "index")]
    pub postings: BTreeMap<String, Vec<Posting>>,
    pub doc_norms: BTreeMap<String, f64>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    pub fn num_docs(&self) -> usize {
        self.doc_norms.len()
    }

    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }

    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.doc_norms.is_empty()
    }
}

/// A corpus entry handed to the builder. `text` is `None` when the source value was
/// null or not text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDocument {
    pub id: String,
    pub text: Option<String>,
}

impl TextDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: Some(text.into()) }
    }

    pub fn missing(id: impl Into<String>) -> Self {
        Self { id: id.into(), text: None }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub documents: usize,
    pub new_terms: usize,
    pub postings: usize,
}

/// Single-pass, in-memory TF-IDF indexer.
///
/// Document frequency is read at the moment each document is processed, so a term's
/// idf for document `d` only reflects the documents indexed before `d`. Repeated calls
/// extend the same index.
#[derive(Debug, Clone)]
pub struct TextIndexBuilder {
    tokenizer: Tokenizer,
    index: InvertedIndex,
    // term -> distinct doc ids already holding a posting for it
    seen: HashMap<String, HashSet<String>>,
}

impl TextIndexBuilder {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer, index: InvertedIndex::new(), seen: HashMap::new() }
    }

    /// Resume building on top of a previously persisted index.
    pub fn from_index(tokenizer: Tokenizer, index: InvertedIndex) -> Self {
        let seen = index
            .postings
            .iter()
            .map(|(term, plist)| (term.clone(), plist.iter().map(|p| p.doc_id.clone()).collect()))
            .collect();
        Self { tokenizer, index, seen }
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn finish(self) -> InvertedIndex {
        self.index
    }

    /// Index a batch. `N` in `idf = ln(N / (1 + df_so_far))` is the size of this batch.
    ///
    /// The batch is validated before anything is written, so a `Data` error leaves the
    /// index untouched.
    pub fn index_documents(&mut self, corpus: &[TextDocument]) -> Result<BuildStats> {
        let mut ids = HashSet::with_capacity(corpus.len());
        for doc in corpus {
            if doc.id.is_empty() {
                return Err(RetrievalError::data("", "empty document id"));
            }
            if doc.text.is_none() {
                return Err(RetrievalError::data(&doc.id, "document text is null or not text"));
            }
            if !ids.insert(doc.id.as_str()) {
                return Err(RetrievalError::data(&doc.id, "duplicate document id in batch"));
            }
            if self.index.doc_norms.contains_key(&doc.id) {
                return Err(RetrievalError::data(&doc.id, "document already indexed"));
            }
        }

        let n = corpus.len() as f64;
        let mut stats = BuildStats { documents: corpus.len(), ..BuildStats::default() };
        for doc in corpus {
            let text = doc.text.as_deref().unwrap_or_default();
            let counts = term_counts(self.tokenizer.tokenize(text));

            let mut sum_sq = 0.0f64;
            for (term, count) in counts {
                let holders = self.seen.entry(term.clone()).or_default();
                let df_so_far = holders.len() as f64;
                let idf = (n / (1.0 + df_so_far)).ln();
                let weight = count as f64 * idf;

                let plist = self.index.postings.entry(term).or_insert_with(|| {
                    stats.new_terms += 1;
                    Vec::new()
                });
                plist.push(Posting { doc_id: doc.id.clone(), weight });
                holders.insert(doc.id.clone());
                stats.postings += 1;
                sum_sq += weight * weight;
            }
            self.index.doc_norms.insert(doc.id.clone(), sum_sq.sqrt());
        }

        tracing::info!(
            documents = stats.documents,
            new_terms = stats.new_terms,
            num_terms = self.index.num_terms(),
            num_docs = self.index.num_docs(),
            "indexed text batch"
        );
        Ok(stats)
    }
}

/// Raw counts in first-occurrence order.
fn term_counts(tokens: Vec<String>) -> Vec<(String, u32)> {
    let mut slot: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, u32)> = Vec::new();
    for token in tokens {
        match slot.get(&token) {
            Some(&i) => counts[i].1 += 1,
            None => {
                slot.insert(token.clone(), counts.len());
                counts.push((token, 1));
            }
        }
    }
    counts
}
