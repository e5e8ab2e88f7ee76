mod common;

use common::{chord, corpus, small_config, wav_bytes, SAMPLE_RATE};
use resonance_core::audio::{
    AcousticIndex, AcousticIndexBuilder, AcousticSearcher, AudioDocument, AudioSource, FeatureExtractor, Waveform,
};
use resonance_core::persist::{load_acoustic_index, save_acoustic_index, IndexPaths};
use resonance_core::{EmptyReason, RetrievalError};

fn build_index() -> AcousticIndex {
    let builder = AcousticIndexBuilder::new(small_config()).unwrap();
    let docs: Vec<AudioDocument> = corpus().into_iter().map(|(id, wave)| AudioDocument::new(id, wave)).collect();
    let (index, report) = builder.build(&docs).unwrap();
    assert_eq!(report.documents, 3);
    index
}

#[test]
fn every_histogram_has_length_k() {
    let index = build_index();
    assert_eq!(index.k(), 8);
    assert_eq!(index.doc_ids, vec!["low", "mid", "high"]);
    assert!(index.histograms.iter().all(|h| h.len() == 8));
    assert!(index.weighted.iter().all(|row| row.len() == 8));

    let searcher = AcousticSearcher::load(index).unwrap();
    let query = searcher.query_histogram(&chord(&[700.0])).unwrap().unwrap();
    assert_eq!(query.len(), 8);
}

#[test]
fn inverted_index_holds_raw_counts() {
    let index = build_index();
    for (row, doc_id) in index.histograms.iter().zip(&index.doc_ids) {
        for (word, &count) in row.iter().enumerate() {
            let posting = index.postings(word as u32).iter().find(|p| &p.doc_id == doc_id);
            match posting {
                Some(p) => assert_eq!(p.count, count),
                None => assert_eq!(count, 0),
            }
        }
    }
    let frames = FeatureExtractor::new(index.config.features.clone()).unwrap().extract(&chord(&[220.0]));
    assert_eq!(index.histograms[0].iter().sum::<u32>() as usize, frames.len());
}

#[test]
fn own_audio_ranks_itself_first_sequentially() {
    let searcher = AcousticSearcher::load(build_index()).unwrap();
    for (id, wave) in corpus() {
        let results = searcher.sequential(&wave, 3).unwrap();
        assert_eq!(results.hits[0].doc_id, id);
        assert!((results.hits[0].score - 1.0).abs() < 1e-9);
        for pair in results.hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}

#[test]
fn strategies_overlap_for_indexed_documents() {
    let searcher = AcousticSearcher::load(build_index()).unwrap();
    for (id, wave) in corpus() {
        let cmp = searcher.compare(&wave, 2).unwrap();
        assert!(cmp.sequential.results.len() <= 2);
        assert!(cmp.inverted.results.len() <= 2);
        assert!(cmp.overlap().contains(&id.as_str()), "{id} missing from overlap");
        assert_eq!(cmp.inverted.results.hits[0].doc_id, id);
    }
}

#[test]
fn inverted_scores_are_count_products() {
    let index = build_index();
    let own = index.histograms[0].clone();
    let expected: f64 = own.iter().map(|&c| (c as f64) * (c as f64)).sum();
    let searcher = AcousticSearcher::load(index).unwrap();
    let results = searcher.inverted_histogram(&own, 3).unwrap();
    assert_eq!(results.hits[0].doc_id, "low");
    assert_eq!(results.hits[0].score, expected);
}

#[test]
fn no_shared_words_is_an_empty_result() {
    let index = build_index();
    let k = index.k();
    // find a word nobody uses, if any; otherwise an all-zero query also shares nothing
    let unused = (0..k as u32).find(|w| index.postings(*w).is_empty());
    let mut query = vec![0u32; k];
    if let Some(w) = unused {
        query[w as usize] = 5;
    }
    let searcher = AcousticSearcher::load(index).unwrap();
    let results = searcher.inverted_histogram(&query, 3).unwrap();
    assert!(results.is_empty());
    assert_eq!(results.empty_reason, Some(EmptyReason::NoSharedWords));
}

#[test]
fn wrong_histogram_length_is_rejected() {
    let searcher = AcousticSearcher::load(build_index()).unwrap();
    let err = searcher.sequential_histogram(&[1, 2, 3], 3).unwrap_err();
    assert!(matches!(err, RetrievalError::DimensionMismatch { expected: 8, got: 3 }));
    let err = searcher.inverted_histogram(&[0; 9], 3).unwrap_err();
    assert!(matches!(err, RetrievalError::DimensionMismatch { expected: 8, got: 9 }));
}

#[test]
fn silent_query_has_no_frames() {
    let searcher = AcousticSearcher::load(build_index()).unwrap();
    let empty = Waveform::new(Vec::new(), SAMPLE_RATE);
    let results = searcher.sequential(&empty, 3).unwrap();
    assert_eq!(results.empty_reason, Some(EmptyReason::QueryHasNoFrames));
}

#[test]
fn undecodable_query_reports_reason() {
    let searcher = AcousticSearcher::load(build_index()).unwrap();
    let source = AudioSource::Bytes { data: b"not audio at all".to_vec(), extension: None };
    let cmp = searcher.compare_source(&source, 3).unwrap();
    assert!(matches!(cmp.sequential.results.empty_reason, Some(EmptyReason::UndecodableQuery(_))));
    assert!(matches!(cmp.inverted.results.empty_reason, Some(EmptyReason::UndecodableQuery(_))));
}

#[test]
fn undecodable_document_fails_build_naming_it() {
    let builder = AcousticIndexBuilder::new(small_config()).unwrap();
    let mut docs: Vec<AudioDocument> = corpus().into_iter().map(|(id, w)| AudioDocument::new(id, w)).collect();
    docs.push(AudioDocument {
        id: "corrupt".into(),
        source: AudioSource::Bytes { data: vec![0u8; 64], extension: Some("mp3".into()) },
    });
    match builder.build(&docs).unwrap_err() {
        RetrievalError::AudioDecode { source_name, .. } => assert_eq!(source_name, "corrupt"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn wav_bytes_decode_and_match() {
    let index = build_index();
    let searcher = AcousticSearcher::load(index).unwrap();
    let source = AudioSource::Bytes { data: wav_bytes(&chord(&[4800.0])), extension: Some("wav".into()) };
    let cmp = searcher.compare_source(&source, 1).unwrap();
    assert_eq!(cmp.sequential.results.hits[0].doc_id, "high");
    assert_eq!(cmp.inverted.results.hits[0].doc_id, "high");
}

#[test]
fn persist_round_trip_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let index = build_index();
    save_acoustic_index(&paths, &index).unwrap();
    let reloaded = load_acoustic_index(&paths).unwrap();
    assert_eq!(reloaded, index);

    let query = chord(&[1200.0, 1500.0]);
    let before = AcousticSearcher::load(index).unwrap().compare(&query, 3).unwrap();
    let after = AcousticSearcher::load(reloaded).unwrap().compare(&query, 3).unwrap();
    assert_eq!(before.sequential.results, after.sequential.results);
    assert_eq!(before.inverted.results, after.inverted.results);
}

#[test]
fn build_is_deterministic_for_a_seed() {
    assert_eq!(build_index(), build_index());
}

#[test]
fn too_few_frames_for_vocabulary() {
    let mut config = small_config();
    config.vocabulary.clusters = 10_000;
    let builder = AcousticIndexBuilder::new(config).unwrap();
    let docs = vec![AudioDocument::new("only", chord(&[440.0]))];
    assert!(matches!(builder.build(&docs), Err(RetrievalError::InsufficientFrames { .. })));
}

#[test]
fn stale_inverted_postings_fail_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());

    let mut index = build_index();
    let word = *index.inverted.keys().next().unwrap();
    index.inverted.get_mut(&word).unwrap()[0].count += 1;
    save_acoustic_index(&paths, &index).unwrap();
    assert!(matches!(load_acoustic_index(&paths), Err(RetrievalError::Inconsistent(_))));

    let mut index = build_index();
    let word = *index.inverted.keys().next().unwrap();
    index.inverted.get_mut(&word).unwrap()[0].doc_id = "ghost".into();
    assert!(matches!(AcousticSearcher::load(index), Err(RetrievalError::Inconsistent(_))));
}
