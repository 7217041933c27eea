pub mod audio;
mod normalize;
mod whisper;

pub use audio::{decode_audio, AudioFormat, WHISPER_SAMPLE_RATE};
pub use normalize::normalize_transcript;
pub use whisper::{
    download_model, is_model_downloaded, model_path, WhisperModel, WhisperTranscriber,
};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transcript is empty")]
    EmptyTranscript,
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to download model: {0}")]
    ModelDownload(String),
    #[error("Failed to initialize Whisper: {0}")]
    ModelInit(String),
    #[error("Transcription failed: {0}")]
    Inference(String),
    #[error("Transcription timed out after {0}s")]
    Timeout(u64),
}

/// External ASR collaborator: audio bytes in, raw text out.
///
/// No assumptions about language or accuracy. An empty transcription is a
/// legal collaborator response; the workflow routes it to `Failed` via
/// [`normalize_transcript`].
#[async_trait]
pub trait Transcribe: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        format_hint: Option<AudioFormat>,
    ) -> Result<String, TranscriptionError>;
}
