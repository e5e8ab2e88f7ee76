mod input;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resonance_core::audio::{
    AcousticIndexBuilder, AcousticIndexConfig, AcousticSearcher, AudioDocument, AudioSource, FeatureConfig,
    StrategyComparison, Timed, VocabularyConfig,
};
use resonance_core::persist::{load_acoustic_index, load_text_index, save_acoustic_index, save_text_index, IndexPaths};
use resonance_core::{Catalog, SearchResults, TextIndexBuilder, TextSearcher, Tokenizer};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query TF-IDF text indexes and bag-of-acoustic-words audio indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or extend) a text index from JSON/JSONL records `{id, text}`
    BuildText {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Extend the index already in the output directory instead of starting fresh
        #[arg(long, default_value_t = false)]
        append: bool,
    },
    /// Build an acoustic index from a directory of audio files
    BuildAudio {
        /// Directory scanned for .wav/.mp3/.flac/.ogg files
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Vocabulary size K
        #[arg(long, default_value_t = 128)]
        clusters: usize,
        /// Seed for centroid initialization
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Iteration cap for clustering
        #[arg(long, default_value_t = 300)]
        max_iters: usize,
        /// Analysis hop in samples
        #[arg(long, default_value_t = 512)]
        hop_length: usize,
    },
    /// Rank text documents against keywords
    SearchText {
        /// Index directory; ignored when --table is given
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Named table under --data-dir
        #[arg(long)]
        table: Option<String>,
        #[arg(long, env = "RESONANCE_DATA_DIR", default_value = "./data")]
        data_dir: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 5)]
        k: usize,
    },
    /// Rank recordings against a query clip with both strategies
    SearchAudio {
        /// Index directory; ignored when --table is given
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Named table under --data-dir
        #[arg(long)]
        table: Option<String>,
        #[arg(long, env = "RESONANCE_DATA_DIR", default_value = "./data")]
        data_dir: PathBuf,
        /// Query audio file
        #[arg(long)]
        query: PathBuf,
        #[arg(long, default_value_t = 5)]
        k: usize,
    },
    /// Create an empty named table under the data directory
    CreateTable {
        name: String,
        #[arg(long, env = "RESONANCE_DATA_DIR", default_value = "./data")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::BuildText { input, output, append } => build_text(&input, &output, append),
        Commands::BuildAudio { input, output, clusters, seed, max_iters, hop_length } => {
            let config = AcousticIndexConfig {
                features: FeatureConfig { hop_length, ..FeatureConfig::default() },
                vocabulary: VocabularyConfig { clusters, seed, max_iters },
            };
            build_audio(&input, &output, config)
        }
        Commands::SearchText { index, table, data_dir, query, k } => {
            let results = match table {
                Some(table) => Catalog::new(&data_dir, Tokenizer::default()).search_text(&table, &query, k)?,
                None => {
                    let loaded = load_text_index(&IndexPaths::new(&index))?;
                    TextSearcher::load(loaded, Tokenizer::default()).search(&query, k)
                }
            };
            print_results("text", &results);
            Ok(())
        }
        Commands::SearchAudio { index, table, data_dir, query, k } => {
            let cmp = compare_audio(&index, table.as_deref(), &data_dir, query, k)?;
            print_timed("sequential", &cmp.sequential);
            print_timed("inverted", &cmp.inverted);
            println!("overlap: {:?}", cmp.overlap());
            Ok(())
        }
        Commands::CreateTable { name, data_dir } => {
            let paths = Catalog::new(&data_dir, Tokenizer::default()).create_table(&name)?;
            println!("created {}", paths.root.display());
            Ok(())
        }
    }
}

fn build_text(input: &std::path::Path, output: &std::path::Path, append: bool) -> Result<()> {
    let paths = IndexPaths::new(output);
    let corpus = input::load_text_corpus(input)?;
    let mut builder = if append && paths.text_index().exists() {
        TextIndexBuilder::from_index(Tokenizer::default(), load_text_index(&paths)?)
    } else {
        TextIndexBuilder::new(Tokenizer::default())
    };
    let stats = builder.index_documents(&corpus)?;
    save_text_index(&paths, builder.index())?;
    tracing::info!(documents = stats.documents, output = %output.display(), "text index build complete");
    Ok(())
}

fn build_audio(input: &std::path::Path, output: &std::path::Path, config: AcousticIndexConfig) -> Result<()> {
    let docs: Vec<AudioDocument> = input::discover_audio(input)
        .into_iter()
        .map(|(id, path)| AudioDocument::new(id, path))
        .collect();
    anyhow::ensure!(!docs.is_empty(), "no audio files found under {}", input.display());

    let builder = AcousticIndexBuilder::new(config)?;
    let (index, report) = builder.build(&docs).context("building acoustic index")?;
    save_acoustic_index(&IndexPaths::new(output), &index)?;
    println!(
        "indexed {} recordings: extract {:.2} ms, vocabulary fit {:.2} ms ({} iterations, converged: {}), histograms {:.2} ms",
        report.documents,
        report.extract_time.as_secs_f64() * 1e3,
        report.fit_time.as_secs_f64() * 1e3,
        report.fit.iterations,
        report.fit.converged,
        report.histogram_time.as_secs_f64() * 1e3,
    );
    Ok(())
}

fn compare_audio(
    index: &std::path::Path,
    table: Option<&str>,
    data_dir: &std::path::Path,
    query: PathBuf,
    k: usize,
) -> Result<StrategyComparison> {
    let source = AudioSource::Path(query);
    let cmp = match table {
        Some(table) => Catalog::new(data_dir, Tokenizer::default()).search_audio(table, &source, k)?,
        None => {
            let searcher = AcousticSearcher::load(load_acoustic_index(&IndexPaths::new(index))?)?;
            searcher.compare_source(&source, k)?
        }
    };
    Ok(cmp)
}

fn print_timed(label: &str, timed: &Timed) {
    println!("{label} ({:.2} ms):", timed.elapsed.as_secs_f64() * 1e3);
    print_results(label, &timed.results);
}

fn print_results(label: &str, results: &SearchResults) {
    if let Some(reason) = &results.empty_reason {
        println!("  no {label} results: {reason}");
        return;
    }
    for hit in &results.hits {
        println!("  {} -> score={:.4}", hit.doc_id, hit.score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_core::RetrievalError;

    #[test]
    fn search_audio_accepts_a_table() {
        let cli = Cli::try_parse_from([
            "indexer", "search-audio", "--table", "clips", "--data-dir", "/tmp/data", "--query", "q.wav",
        ])
        .unwrap();
        match cli.command {
            Commands::SearchAudio { table, data_dir, .. } => {
                assert_eq!(table.as_deref(), Some("clips"));
                assert_eq!(data_dir, PathBuf::from("/tmp/data"));
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn search_audio_routes_tables_through_the_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let err = compare_audio(dir.path(), Some("clips"), dir.path(), PathBuf::from("q.wav"), 3).unwrap_err();
        let err = err.downcast::<RetrievalError>().unwrap();
        assert!(matches!(err, RetrievalError::TableNotFound(ref t) if t == "clips"));
    }
}
