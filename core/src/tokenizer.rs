use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

const ENGLISH_STOPWORDS: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","can't","cannot","could","couldn't",
    "did","didn't","do","does","doesn't","doing","don't","down","during",
    "each","few","for","from","further",
    "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
    "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
    "let's","me","more","most","mustn't","my","myself",
    "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
    "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
    "under","until","up","very",
    "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
    "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
];

lazy_static! {
    // Anything that is neither a word character nor whitespace is dropped in place,
    // so "don't" becomes "dont" and "rock-n-roll" becomes "rocknroll".
    static ref PUNCT: Regex = Regex::new(r"[^\w\s]").expect("valid regex");
    static ref ENGLISH: Arc<Lexicon> = Arc::new(Lexicon::english());
}

/// Stopword set plus stemmer. Built once and shared read-only by every tokenizer.
pub struct Lexicon {
    stopwords: HashSet<String>,
    stemmer: Stemmer,
}

impl Lexicon {
    pub fn new<I, S>(stopwords: I, algorithm: Algorithm) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stopwords: stopwords.into_iter().map(Into::into).collect(),
            stemmer: Stemmer::create(algorithm),
        }
    }

    pub fn english() -> Self {
        Self::new(ENGLISH_STOPWORDS.iter().copied(), Algorithm::English)
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    pub fn stem(&self, token: &str) -> String {
        self.stemmer.stem(token).into_owned()
    }
}

impl fmt::Debug for Lexicon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lexicon").field("stopwords", &self.stopwords.len()).finish()
    }
}

/// Text to ordered terms: NFKC, lowercase, punctuation stripped, stopwords removed, stemmed.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    lexicon: Arc<Lexicon>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self { lexicon: Arc::clone(&ENGLISH) }
    }
}

impl Tokenizer {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let stripped = PUNCT.replace_all(&normalized, "");
        stripped
            .split_whitespace()
            .filter(|token| !self.lexicon.is_stopword(token))
            .map(|token| self.lexicon.stem(token))
            .collect()
    }
}

/// Tokenize with the shared English lexicon.
pub fn tokenize(text: &str) -> Vec<String> {
    Tokenizer::default().tokenize(text)
}
