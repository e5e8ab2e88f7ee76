use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// A ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub doc_id: String,
    pub score: f64,
}

/// Why a search produced no hits. Not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmptyReason {
    EmptyQuery,
    NoMatchingTerms,
    NoSharedWords,
    EmptyIndex,
    QueryHasNoFrames,
    ZeroLimit,
    UndecodableQuery(String),
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::EmptyQuery => f.write_str("query has no terms after normalization"),
            EmptyReason::NoMatchingTerms => f.write_str("no query term occurs in the index"),
            EmptyReason::NoSharedWords => f.write_str("query shares no acoustic words with the index"),
            EmptyReason::EmptyIndex => f.write_str("index contains no documents"),
            EmptyReason::QueryHasNoFrames => f.write_str("query audio produced no frames"),
            EmptyReason::ZeroLimit => f.write_str("requested zero results"),
            EmptyReason::UndecodableQuery(why) => write!(f, "query audio could not be decoded: {why}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<Hit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_reason: Option<EmptyReason>,
}

impl SearchResults {
    pub fn empty(reason: EmptyReason) -> Self {
        Self { hits: Vec::new(), empty_reason: Some(reason) }
    }

    pub fn from_hits(hits: Vec<Hit>) -> Self {
        Self { hits, empty_reason: None }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|h| h.doc_id.as_str())
    }
}

/// Score descending, then document id ascending. NaN sorts last.
pub fn compare_hits(a: &Hit, b: &Hit) -> Ordering {
    match (a.score.is_nan(), b.score.is_nan()) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

pub fn top_k(mut hits: Vec<Hit>, k: usize) -> Vec<Hit> {
    if hits.len() > k && k > 0 {
        hits.select_nth_unstable_by(k - 1, compare_hits);
        hits.truncate(k);
    }
    hits.sort_by(compare_hits);
    hits.truncate(k);
    hits
}

/// Drain a score accumulator into a sorted, truncated hit list.
pub fn rank_scores(scores: HashMap<String, f64>, k: usize) -> Vec<Hit> {
    let hits = scores
        .into_iter()
        .map(|(doc_id, score)| Hit { doc_id, score })
        .collect();
    top_k(hits, k)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f64) -> Hit {
        Hit { doc_id: id.to_string(), score }
    }

    #[test]
    fn sorts_descending_with_id_tiebreak() {
        let ranked = top_k(vec![hit("b", 1.0), hit("c", 2.0), hit("a", 1.0)], 10);
        let ids: Vec<_> = ranked.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn truncates_to_k() {
        let hits = (0..20).map(|i| hit(&format!("d{i:02}"), i as f64)).collect();
        let ranked = top_k(hits, 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].doc_id, "d19");
        assert_eq!(ranked[2].doc_id, "d17");
    }

    #[test]
    fn zero_k_is_empty() {
        assert!(top_k(vec![hit("a", 1.0)], 0).is_empty());
    }

    #[test]
    fn nan_sorts_last() {
        let ranked = top_k(vec![hit("a", f64::NAN), hit("b", -1.0)], 2);
        assert_eq!(ranked[0].doc_id, "b");
    }
}
