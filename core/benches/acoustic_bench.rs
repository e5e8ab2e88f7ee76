use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use resonance_core::audio::{AcousticIndexBuilder, AcousticIndexConfig, AcousticSearcher, VocabularyConfig};

/// Random frame sequences stand in for decoded recordings so only the strategies are measured.
fn synthetic_corpus(docs: usize, frames: usize, dim: usize, seed: u64) -> Vec<(String, Vec<Vec<f32>>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..docs)
        .map(|d| {
            let center: Vec<f32> = (0..dim).map(|_| rng.gen_range(-20.0..20.0)).collect();
            let seq = (0..frames)
                .map(|_| center.iter().map(|c| c + rng.gen_range(-3.0..3.0)).collect())
                .collect();
            (format!("doc{d:05}"), seq)
        })
        .collect()
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("acoustic_search");
    for &docs in &[100usize, 1000] {
        let config = AcousticIndexConfig {
            vocabulary: VocabularyConfig { clusters: 64, seed: 11, max_iters: 25 },
            ..AcousticIndexConfig::default()
        };
        let builder = AcousticIndexBuilder::new(config).expect("valid config");
        let corpus = synthetic_corpus(docs, 40, 13, 0xC0FFEE);
        let (index, _) = builder.build_from_frames(corpus).expect("build");
        let query = index.histograms[docs / 2].clone();
        let searcher = AcousticSearcher::load(index).expect("load");

        group.bench_with_input(BenchmarkId::new("sequential", docs), &query, |b, q| {
            b.iter(|| searcher.sequential_histogram(black_box(q), 10))
        });
        group.bench_with_input(BenchmarkId::new("inverted", docs), &query, |b, q| {
            b.iter(|| searcher.inverted_histogram(black_box(q), 10))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_strategies);
criterion_main!(benches);
