//! Acoustic retrieval: decode, featurize, quantize into a learned vocabulary, and
//! rank recordings by bag-of-acoustic-words similarity.
//!
//! ```text
//! audio ──▶ decode ──▶ MFCC frames ──▶ vocabulary ──▶ histogram ─┬─▶ TF-IDF ─▶ sequential
//!                                                                └─▶ raw counts ─▶ inverted
//! ```

pub mod decode;
pub mod features;
pub mod index;
pub mod search;
pub mod vocabulary;

pub use decode::{decode_bytes, decode_file, AudioSource, Waveform};
pub use features::{FeatureConfig, FeatureExtractor, FrameVector};
pub use index::{
    AcousticBuildReport, AcousticIndex, AcousticIndexBuilder, AcousticIndexConfig, AudioDocument,
    TfidfTransform, WordPosting,
};
pub use search::{AcousticSearcher, StrategyComparison, Timed};
pub use vocabulary::{AcousticVocabulary, FitReport, VocabularyConfig};
