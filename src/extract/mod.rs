pub mod groq;
mod parser;
mod schema;
mod validate;

pub use groq::GroqExtractor;
pub use parser::{parse_response, ExtractionBatch, ParseStatus};
pub use schema::{build_request, SCHEMA_VERSION};
pub use validate::{validate_batch, validate_candidate, ValidatedBatch, ValidationError};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("API key not configured (set GROQ_API_KEY)")]
    MissingApiKey,
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Extractor returned an empty response")]
    EmptyResponse,
    #[error("Extraction timed out after {0}s")]
    Timeout(u64),
}

/// External language-model collaborator mapping free text to raw text.
///
/// The response has no enforced output grammar. Despite the schema prompt,
/// it may wrap JSON in prose or return nothing structured at all; recovering
/// structure is [`parse_response`]'s job, never the caller's assumption.
#[async_trait]
pub trait Extract: Send + Sync {
    async fn extract(&self, prompt: &str) -> Result<String, ExtractorError>;
}
