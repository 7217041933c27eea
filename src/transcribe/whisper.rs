//! Whisper.cpp integration for local speech-to-text.
//!
//! Uses the whisper-rs crate which provides Rust bindings to whisper.cpp.
//! The model is loaded once at startup and shared for the process lifetime.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{audio, AudioFormat, Transcribe, TranscriptionError};

/// Available Whisper model sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperModel {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    /// Get the Hugging Face URL for this model
    pub fn hf_url(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.bin",
            WhisperModel::Base => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin",
            WhisperModel::Small => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.bin",
            WhisperModel::Medium => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-medium.bin",
            WhisperModel::Large => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3.bin",
        }
    }

    /// Get the filename for this model
    pub fn filename(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "ggml-tiny.bin",
            WhisperModel::Base => "ggml-base.bin",
            WhisperModel::Small => "ggml-small.bin",
            WhisperModel::Medium => "ggml-medium.bin",
            WhisperModel::Large => "ggml-large-v3.bin",
        }
    }

    /// Get approximate model size in MB
    pub fn size_mb(&self) -> u64 {
        match self {
            WhisperModel::Tiny => 75,
            WhisperModel::Base => 142,
            WhisperModel::Small => 466,
            WhisperModel::Medium => 1500,
            WhisperModel::Large => 3100,
        }
    }
}

impl std::fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WhisperModel::Tiny => write!(f, "tiny"),
            WhisperModel::Base => write!(f, "base"),
            WhisperModel::Small => write!(f, "small"),
            WhisperModel::Medium => write!(f, "medium"),
            WhisperModel::Large => write!(f, "large"),
        }
    }
}

impl std::str::FromStr for WhisperModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(WhisperModel::Tiny),
            "base" => Ok(WhisperModel::Base),
            "small" => Ok(WhisperModel::Small),
            "medium" => Ok(WhisperModel::Medium),
            "large" => Ok(WhisperModel::Large),
            _ => Err(format!(
                "Unknown model: {}. Use tiny, base, small, medium, or large",
                s
            )),
        }
    }
}

/// Get the models directory path
pub fn models_dir() -> PathBuf {
    PathBuf::from("models").join("whisper")
}

/// Get the path to a specific model file
pub fn model_path(model: WhisperModel) -> PathBuf {
    models_dir().join(model.filename())
}

/// Check if a model is already downloaded
pub fn is_model_downloaded(model: WhisperModel) -> bool {
    let path = model_path(model);
    if !path.exists() {
        return false;
    }

    // Check if file size is reasonable (at least 50% of expected)
    if let Ok(metadata) = fs::metadata(&path) {
        let expected_bytes = model.size_mb() * 1024 * 1024;
        return metadata.len() >= expected_bytes / 2;
    }

    false
}

/// Download a Whisper model from Hugging Face
pub fn download_model(model: WhisperModel) -> Result<PathBuf, TranscriptionError> {
    let path = model_path(model);

    if is_model_downloaded(model) {
        info!("Model {} already downloaded at {:?}", model, path);
        return Ok(path);
    }

    fs::create_dir_all(models_dir())?;

    info!(
        "Downloading Whisper {} model (~{}MB)...",
        model,
        model.size_mb()
    );

    let url = model.hf_url();

    let response = reqwest::blocking::Client::new()
        .get(url)
        .send()
        .map_err(|e| TranscriptionError::ModelDownload(format!("HTTP request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(TranscriptionError::ModelDownload(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }

    let total_size = response.content_length().unwrap_or(0);

    let pb = indicatif::ProgressBar::new(total_size);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let temp_path = path.with_extension("bin.tmp");
    let mut file = File::create(&temp_path)?;

    let bytes = response
        .bytes()
        .map_err(|e| TranscriptionError::ModelDownload(format!("Failed to read response: {}", e)))?;

    file.write_all(&bytes)?;
    pb.set_position(bytes.len() as u64);
    pb.finish_with_message("Download complete");

    fs::rename(&temp_path, &path)?;

    info!("Model downloaded to {:?}", path);

    Ok(path)
}

/// Local ASR collaborator backed by whisper.cpp.
///
/// Holds the loaded model context for the whole process; inference runs on
/// the blocking thread pool so the workflow's async side stays responsive.
pub struct WhisperTranscriber {
    ctx: Arc<WhisperContext>,
    model: WhisperModel,
    /// Language hint passed to whisper ("auto" when unset)
    language: Option<String>,
    n_threads: i32,
}

impl WhisperTranscriber {
    /// Load a transcriber, downloading the model first if needed.
    pub fn new(model: WhisperModel, language: Option<String>) -> Result<Self, TranscriptionError> {
        let path = download_model(model)?;

        info!("Loading Whisper {} model...", model);

        let ctx = WhisperContext::new_with_params(
            path.to_str().unwrap_or_default(),
            WhisperContextParameters::default(),
        )
        .map_err(|e| TranscriptionError::ModelInit(format!("Failed to load model: {}", e)))?;

        // Use available CPU threads (leave 1 for system)
        let n_threads = std::thread::available_parallelism()
            .map(|p| (p.get() as i32 - 1).max(1))
            .unwrap_or(4);

        info!(
            "Whisper model loaded successfully (using {} threads)",
            n_threads
        );

        Ok(Self {
            ctx: Arc::new(ctx),
            model,
            language,
            n_threads,
        })
    }

    pub fn model(&self) -> WhisperModel {
        self.model
    }

    /// Run whisper inference on 16kHz mono samples. Blocking.
    fn run_inference(
        ctx: &WhisperContext,
        samples: &[f32],
        language: Option<&str>,
        n_threads: i32,
    ) -> Result<String, TranscriptionError> {
        // Greedy sampling: short utterances don't benefit from beam search
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(n_threads);
        params.set_language(Some(language.unwrap_or("auto")));
        params.set_translate(false);
        params.set_token_timestamps(false);
        params.set_single_segment(false);
        // Skip segments whisper thinks are silence or noise
        params.set_no_speech_thold(0.6);
        params.set_suppress_non_speech_tokens(true);
        params.set_no_context(true);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_print_special(false);

        let mut state = ctx
            .create_state()
            .map_err(|e| TranscriptionError::Inference(format!("Failed to create state: {}", e)))?;

        state
            .full(params, samples)
            .map_err(|e| TranscriptionError::Inference(format!("Inference failed: {}", e)))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| TranscriptionError::Inference(format!("Failed to get segments: {}", e)))?;

        let mut text = String::new();
        for i in 0..num_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| TranscriptionError::Inference(format!("Failed to get text: {}", e)))?;
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(segment);
        }

        Ok(text)
    }
}

#[async_trait]
impl Transcribe for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio_bytes: &[u8],
        format_hint: Option<AudioFormat>,
    ) -> Result<String, TranscriptionError> {
        let samples = audio::decode_audio(audio_bytes, format_hint)?;

        info!(
            "Transcribing {:.2}s of audio with Whisper {}",
            samples.len() as f64 / audio::WHISPER_SAMPLE_RATE as f64,
            self.model
        );

        let ctx = Arc::clone(&self.ctx);
        let language = self.language.clone();
        let n_threads = self.n_threads;

        let text = tokio::task::spawn_blocking(move || {
            Self::run_inference(&ctx, &samples, language.as_deref(), n_threads)
        })
        .await
        .map_err(|e| TranscriptionError::Inference(format!("Worker panicked: {}", e)))??;

        if text.is_empty() {
            warn!("Whisper produced no text for this recording");
        }

        Ok(text)
    }
}
