//! Audio decoding via Symphonia.
//!
//! Accepts WAV, MP3, FLAC and OGG/Vorbis from a file or an in-memory buffer and
//! downmixes to mono `f32`.

use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Mono PCM samples at a known rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Where a recording comes from.
#[derive(Debug, Clone)]
pub enum AudioSource {
    Path(PathBuf),
    /// Encoded bytes; `extension` is only a probing hint.
    Bytes { data: Vec<u8>, extension: Option<String> },
    Decoded(Waveform),
}

impl AudioSource {
    pub fn decode(&self) -> Result<Waveform> {
        match self {
            AudioSource::Path(path) => decode_file(path),
            AudioSource::Bytes { data, extension } => decode_bytes(data.clone(), extension.as_deref()),
            AudioSource::Decoded(wave) => Ok(wave.clone()),
        }
    }
}

impl From<PathBuf> for AudioSource {
    fn from(path: PathBuf) -> Self {
        AudioSource::Path(path)
    }
}

impl From<Waveform> for AudioSource {
    fn from(wave: Waveform) -> Self {
        AudioSource::Decoded(wave)
    }
}

pub fn decode_file(path: &Path) -> Result<Waveform> {
    let name = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| RetrievalError::decode(&name, e))?;
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    decode_stream(Box::new(file), hint, &name)
}

pub fn decode_bytes(data: Vec<u8>, extension: Option<&str>) -> Result<Waveform> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    decode_stream(Box::new(Cursor::new(data)), hint, "<memory>")
}

fn decode_stream(source: Box<dyn MediaSource>, hint: Hint, name: &str) -> Result<Waveform> {
    let mss = MediaSourceStream::new(source, Default::default());
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| RetrievalError::decode(name, format!("unrecognized format: {e}")))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| RetrievalError::decode(name, "no audio track"))?;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| RetrievalError::decode(name, "unknown sample rate"))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| RetrievalError::decode(name, format!("unsupported codec: {e}")))?;

    let mut mono: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(RetrievalError::decode(name, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(source = name, "skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(RetrievalError::decode(name, e)),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let needed = decoded.capacity() * channels;
        if sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            downmix_into(buf.samples(), channels, &mut mono);
        }
    }

    Ok(Waveform { samples: mono, sample_rate })
}

/// Average interleaved channels into `out`.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(interleaved.chunks_exact(channels).map(|frame| frame.iter().sum::<f32>() * scale));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let mut out = Vec::new();
        downmix_into(&[1.0, 0.0, 0.5, 0.5], 2, &mut out);
        assert_eq!(out, vec![0.5, 0.5]);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_bytes(b"definitely not audio".to_vec(), None).unwrap_err();
        assert!(matches!(err, RetrievalError::AudioDecode { .. }));
    }

    #[test]
    fn missing_file_fails_to_decode() {
        let err = decode_file(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(matches!(err, RetrievalError::AudioDecode { .. }));
    }
}
