#![allow(dead_code)]

use resonance_core::audio::{AcousticIndexConfig, FeatureConfig, VocabularyConfig, Waveform};
use std::f32::consts::PI;

pub const SAMPLE_RATE: u32 = 16_000;

/// Sum of sines at the given frequencies, one second long.
pub fn chord(freqs: &[f32]) -> Waveform {
    let n = SAMPLE_RATE as usize;
    let scale = 0.6 / freqs.len().max(1) as f32;
    let samples = (0..n)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() * scale
        })
        .collect();
    Waveform::new(samples, SAMPLE_RATE)
}

/// Three clearly distinct recordings.
pub fn corpus() -> Vec<(String, Waveform)> {
    vec![
        ("low".to_string(), chord(&[220.0])),
        ("mid".to_string(), chord(&[1200.0, 1500.0])),
        ("high".to_string(), chord(&[4800.0])),
    ]
}

pub fn small_config() -> AcousticIndexConfig {
    AcousticIndexConfig {
        features: FeatureConfig::default(),
        vocabulary: VocabularyConfig { clusters: 8, seed: 3, max_iters: 100 },
    }
}

/// Minimal 16-bit mono PCM WAV container.
pub fn wav_bytes(wave: &Waveform) -> Vec<u8> {
    let data_len = (wave.samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&wave.sample_rate.to_le_bytes());
    out.extend_from_slice(&(wave.sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in &wave.samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}
