//! MFCC frame extraction.
//!
//! Centered STFT with a periodic Hann window, Slaney mel filterbank, power-to-dB with
//! top-db clipping, then an orthonormal DCT-II over the mel bands.

use super::decode::{AudioSource, Waveform};
use crate::error::{Result, RetrievalError};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

/// One short-time feature vector (`n_mfcc` cepstral coefficients).
pub type FrameVector = Vec<f32>;

const AMIN: f32 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Cepstral coefficients kept per frame (default: 13).
    pub n_mfcc: usize,
    /// Analysis window / FFT size in samples (default: 2048).
    pub n_fft: usize,
    /// Hop between frames in samples (default: 512).
    pub hop_length: usize,
    /// Mel bands (default: 128).
    pub n_mels: usize,
    pub fmin: f32,
    /// Upper mel edge; `None` means Nyquist.
    pub fmax: Option<f32>,
    /// Dynamic range kept below the loudest bin, in dB (default: 80).
    pub top_db: Option<f32>,
    /// Pad `n_fft / 2` zeros on both sides so frame `t` is centered on sample `t * hop`.
    pub center: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_mfcc: 13,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            fmin: 0.0,
            fmax: None,
            top_db: Some(80.0),
            center: true,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_fft < 2 || self.hop_length == 0 || self.n_mels == 0 || self.n_mfcc == 0 {
            return Err(RetrievalError::Config(
                "n_fft must be >= 2 and hop_length, n_mels, n_mfcc must be non-zero".into(),
            ));
        }
        if self.n_mfcc > self.n_mels {
            return Err(RetrievalError::Config(format!(
                "n_mfcc ({}) cannot exceed n_mels ({})",
                self.n_mfcc, self.n_mels
            )));
        }
        Ok(())
    }
}

/// Sliding-window MFCC extractor. Scratch buffers are per call, so one extractor can
/// be shared across threads.
#[derive(Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    dct: Vec<f32>,
}

impl fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureExtractor").field("config", &self.config).finish()
    }
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        let fft = FftPlanner::new().plan_fft_forward(config.n_fft);
        let n = config.n_fft as f32;
        // periodic Hann
        let window = (0..config.n_fft)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n).cos()))
            .collect();
        let dct = dct_ortho_basis(config.n_mfcc, config.n_mels);
        Ok(Self { config, fft, window, dct })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.config.n_mfcc
    }

    /// Decode `source` and extract its frames.
    pub fn extract_source(&self, source: &AudioSource) -> Result<Vec<FrameVector>> {
        let wave = source.decode()?;
        Ok(self.extract(&wave))
    }

    pub fn extract(&self, wave: &Waveform) -> Vec<FrameVector> {
        let mel_db = self.log_mel(wave);
        mel_db
            .iter()
            .map(|bands| {
                self.dct
                    .chunks_exact(self.config.n_mels)
                    .map(|basis| basis.iter().zip(bands).map(|(b, x)| b * x).sum::<f32>())
                    .collect::<FrameVector>()
            })
            .collect()
    }

    /// Log-power mel spectrogram, `[frames][n_mels]` in dB.
    fn log_mel(&self, wave: &Waveform) -> Vec<Vec<f32>> {
        let cfg = &self.config;
        if wave.samples.is_empty() || wave.sample_rate == 0 {
            return Vec::new();
        }

        let pad = if cfg.center { cfg.n_fft / 2 } else { 0 };
        let padded_len = wave.samples.len() + 2 * pad;
        if padded_len < cfg.n_fft {
            return Vec::new();
        }
        let num_frames = 1 + (padded_len - cfg.n_fft) / cfg.hop_length;
        let num_bins = cfg.n_fft / 2 + 1;
        let filterbank = mel_filterbank(wave.sample_rate, cfg.n_fft, cfg.n_mels, cfg.fmin, cfg.fmax);

        let sample_at = |i: usize| -> f32 {
            if i < pad {
                return 0.0;
            }
            wave.samples.get(i - pad).copied().unwrap_or(0.0)
        };

        let mut buf = vec![Complex::new(0.0f32, 0.0); cfg.n_fft];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];
        let mut power = vec![0.0f32; num_bins];
        let mut frames = Vec::with_capacity(num_frames);
        let mut loudest = f32::NEG_INFINITY;

        for t in 0..num_frames {
            let start = t * cfg.hop_length;
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = Complex::new(sample_at(start + i) * self.window[i], 0.0);
            }
            self.fft.process_with_scratch(&mut buf, &mut scratch);
            for (p, c) in power.iter_mut().zip(&buf[..num_bins]) {
                *p = c.re * c.re + c.im * c.im;
            }

            let bands: Vec<f32> = filterbank
                .chunks_exact(num_bins)
                .map(|weights| {
                    let energy: f32 = weights.iter().zip(&power).map(|(w, p)| w * p).sum();
                    10.0 * energy.max(AMIN).log10()
                })
                .collect();
            loudest = bands.iter().copied().fold(loudest, f32::max);
            frames.push(bands);
        }

        if let Some(top_db) = cfg.top_db {
            let floor = loudest - top_db;
            for v in frames.iter_mut().flatten() {
                *v = v.max(floor);
            }
        }
        frames
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        F_SP * mel
    }
}

/// Slaney-normalized triangular filters, row-major `[n_mels][n_fft / 2 + 1]`.
fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f32, fmax: Option<f32>) -> Vec<f32> {
    let num_bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;
    let fmax = fmax.unwrap_or(nyquist).min(nyquist);

    let mel_lo = hz_to_mel(fmin);
    let mel_hi = hz_to_mel(fmax);
    let edges: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_lo + (mel_hi - mel_lo) * i as f32 / (n_mels + 1) as f32))
        .collect();
    let bin_hz: Vec<f32> = (0..num_bins).map(|b| b as f32 * sample_rate as f32 / n_fft as f32).collect();

    let mut weights = vec![0.0f32; n_mels * num_bins];
    for m in 0..n_mels {
        let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
        let enorm = 2.0 / (right - left).max(f32::EPSILON);
        for (b, &f) in bin_hz.iter().enumerate() {
            let lower = (f - left) / (center - left).max(f32::EPSILON);
            let upper = (right - f) / (right - center).max(f32::EPSILON);
            weights[m * num_bins + b] = lower.min(upper).max(0.0) * enorm;
        }
    }
    weights
}

/// Orthonormal DCT-II rows, `[n_out][n_in]`.
fn dct_ortho_basis(n_out: usize, n_in: usize) -> Vec<f32> {
    let n = n_in as f32;
    let mut basis = Vec::with_capacity(n_out * n_in);
    for k in 0..n_out {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        for i in 0..n_in {
            basis.push(scale * (PI * k as f32 * (2 * i + 1) as f32 / (2.0 * n)).cos());
        }
    }
    basis
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, secs: f32, sr: u32) -> Waveform {
        let n = (secs * sr as f32) as usize;
        let samples = (0..n).map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin() * 0.5).collect();
        Waveform::new(samples, sr)
    }

    #[test]
    fn frame_count_follows_hop() {
        let ex = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let wave = tone(440.0, 1.0, 16000);
        let frames = ex.extract(&wave);
        assert_eq!(frames.len(), 1 + 16000 / 512);
        assert!(frames.iter().all(|f| f.len() == 13));
        assert!(frames.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn empty_waveform_has_no_frames() {
        let ex = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        assert!(ex.extract(&Waveform::new(Vec::new(), 16000)).is_empty());
    }

    #[test]
    fn short_clip_still_yields_a_centered_frame() {
        let ex = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        assert_eq!(ex.extract(&tone(440.0, 0.01, 16000)).len(), 1);
    }

    #[test]
    fn different_tones_differ() {
        let ex = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let a = ex.extract(&tone(220.0, 0.5, 16000));
        let b = ex.extract(&tone(3000.0, 0.5, 16000));
        let mid = a.len() / 2;
        let dist: f32 = a[mid].iter().zip(&b[mid]).map(|(x, y)| (x - y).powi(2)).sum();
        assert!(dist > 1.0);
    }

    #[test]
    fn dct_basis_is_orthonormal() {
        let basis = dct_ortho_basis(4, 8);
        for r in 0..4 {
            for s in 0..4 {
                let dot: f32 = (0..8).map(|i| basis[r * 8 + i] * basis[s * 8 + i]).sum();
                let expected = if r == s { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn rejects_more_coefficients_than_bands() {
        let cfg = FeatureConfig { n_mfcc: 20, n_mels: 10, ..FeatureConfig::default() };
        assert!(matches!(FeatureExtractor::new(cfg), Err(RetrievalError::Config(_))));
    }

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0f32, 300.0, 999.0, 1000.0, 4000.0, 8000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 0.5);
        }
    }
}
