//! Multi-modal retrieval: TF-IDF text search and bag-of-acoustic-words audio search.
//!
//! Both indexes are built in one batch pass, persisted, and reloaded read-only by
//! their searchers.

pub mod audio;
pub mod catalog;
pub mod error;
pub mod index;
pub mod persist;
pub mod rank;
pub mod search;
pub mod tokenizer;

pub use catalog::Catalog;
pub use error::{Result, RetrievalError};
pub use index::{BuildStats, InvertedIndex, Posting, TextDocument, TextIndexBuilder};
pub use rank::{EmptyReason, Hit, SearchResults};
pub use search::TextSearcher;
pub use tokenizer::{Lexicon, Tokenizer};
