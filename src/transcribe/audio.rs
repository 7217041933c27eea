//! Audio decoding for uploaded recordings.
//!
//! Whisper wants 16kHz mono f32; uploads arrive as WAV files at whatever
//! rate and channel count the recorder used, so everything funnels through
//! a mono mixdown and an averaging downsampler.

use std::io::Cursor;
use std::path::Path;

use super::TranscriptionError;

/// Whisper's required sample rate
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Container format of an uploaded recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
}

impl AudioFormat {
    /// Guess the format from a file extension. Only WAV is decodable
    /// locally; everything else is reported as unsupported up front
    /// instead of failing inside the decoder.
    pub fn from_path(path: &Path) -> Result<Self, TranscriptionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "wav" => Ok(AudioFormat::Wav),
            other => Err(TranscriptionError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Decode audio bytes into 16kHz mono f32 samples normalized to [-1.0, 1.0].
pub fn decode_audio(
    bytes: &[u8],
    format: Option<AudioFormat>,
) -> Result<Vec<f32>, TranscriptionError> {
    match format.unwrap_or(AudioFormat::Wav) {
        AudioFormat::Wav => decode_wav(bytes),
    }
}

fn decode_wav(bytes: &[u8]) -> Result<Vec<f32>, TranscriptionError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| TranscriptionError::UnsupportedFormat(format!("not a WAV file: {}", e)))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|v| v as f32 / max).map_err(|e| {
                        TranscriptionError::UnsupportedFormat(format!("bad sample: {}", e))
                    })
                })
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| {
                s.map_err(|e| TranscriptionError::UnsupportedFormat(format!("bad sample: {}", e)))
            })
            .collect::<Result<_, _>>()?,
    };

    let mono = mix_to_mono(&interleaved, spec.channels as usize);
    Ok(resample_to_16k(&mono, spec.sample_rate))
}

/// Average interleaved channels down to one.
fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Downsample by averaging sample windows. Good enough for speech; upload
/// rates below 16kHz are passed through unchanged rather than interpolated.
fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    if source_rate <= WHISPER_SAMPLE_RATE {
        return samples.to_vec();
    }
    let ratio = source_rate as f64 / WHISPER_SAMPLE_RATE as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;

    (0..out_len)
        .map(|i| {
            let start = (i as f64 * ratio) as usize;
            let end = (((i + 1) as f64 * ratio) as usize).min(samples.len());
            let window = &samples[start..end.max(start + 1)];
            window.iter().sum::<f32>() / window.len() as f32
        })
        .collect()
}
