use criterion::{criterion_group, criterion_main, Criterion};
use resonance_core::tokenizer::tokenize;

fn bench_tokenize(c: &mut Criterion) {
    let text = "Running runners ran past the café, singing \"Bohemian Rhapsody\" at 120 bpm. "
        .repeat(200);
    c.bench_function("tokenize_paragraphs", |b| b.iter(|| tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
