//! Review workflow: one upload's pass from audio to accepted records.
//!
//! A [`ReviewSession`] carries the mutable state; [`Workflow`] owns the two
//! external collaborators and sequences the transitions. The transition
//! table is authoritative: callers (the REPL, a UI) can only request
//! actions, and an action illegal for the current state is rejected without
//! mutating anything.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::extract::{
    build_request, parse_response, validate_batch, Extract, ExtractorError, ParseStatus,
    ValidatedBatch,
};
use crate::record::TransactionRecord;
use crate::transcribe::{normalize_transcript, AudioFormat, Transcribe, TranscriptionError};

/// Default timeout for the transcription collaborator
const TRANSCRIBE_TIMEOUT_SECS: u64 = 120;
/// Default timeout for the extraction collaborator
const EXTRACT_TIMEOUT_SECS: u64 = 60;

/// Where the session currently is in the review cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Idle,
    Uploaded,
    Transcribed,
    TranscriptEditing,
    Extracting,
    Extracted,
    RecordEditing,
    Accepted,
    Discarded,
    Failed,
}

impl ReviewState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewState::Accepted | ReviewState::Discarded)
    }
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Action '{action}' is not valid in state {state}")]
    InvalidTransition {
        state: ReviewState,
        action: &'static str,
    },
    #[error("No active session; upload audio first")]
    NoSession,
    #[error("Edited record rejected: {0}")]
    InvalidEdit(#[from] crate::extract::ValidationError),
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
    #[error(transparent)]
    Extractor(#[from] ExtractorError),
}

/// Mutable state tying one audio upload to its in-progress pipeline.
/// Exclusively owned by its workflow; replaced wholesale on a new upload.
#[derive(Debug)]
pub struct ReviewSession {
    pub session_id: String,
    pub audio: Vec<u8>,
    pub format: Option<AudioFormat>,
    /// Transcript exactly as the ASR collaborator produced it
    pub raw_transcript: Option<String>,
    /// Normalized, possibly human-edited transcript (may equal raw)
    pub transcript: Option<String>,
    /// Extractor response exactly as received
    pub raw_response: Option<String>,
    pub parse_status: Option<ParseStatus>,
    pub batch: Option<ValidatedBatch>,
    pub state: ReviewState,
    /// Human-readable reason when state is Failed
    pub failure: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl ReviewSession {
    fn new(audio: Vec<u8>, format: Option<AudioFormat>) -> Self {
        let started_at = chrono::Utc::now();
        Self {
            session_id: started_at.format("%Y%m%d_%H%M%S").to_string(),
            audio,
            format,
            raw_transcript: None,
            transcript: None,
            raw_response: None,
            parse_status: None,
            batch: None,
            state: ReviewState::Uploaded,
            failure: None,
            started_at,
        }
    }

    fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Session {} failed: {}", self.session_id, reason);
        self.failure = Some(reason);
        self.state = ReviewState::Failed;
    }
}

/// Sequences one session at a time through the review cycle.
///
/// The collaborators are process-wide singletons passed in at startup and
/// never reinitialized mid-session. Both external calls are awaited inline:
/// the workflow accepts no other action while one is outstanding.
pub struct Workflow {
    transcriber: Arc<dyn Transcribe>,
    extractor: Arc<dyn Extract>,
    session: Option<ReviewSession>,
    transcribe_timeout: Duration,
    extract_timeout: Duration,
}

impl Workflow {
    pub fn new(transcriber: Arc<dyn Transcribe>, extractor: Arc<dyn Extract>) -> Self {
        Self {
            transcriber,
            extractor,
            session: None,
            transcribe_timeout: Duration::from_secs(env_secs(
                "TRANSCRIBE_TIMEOUT_SECS",
                TRANSCRIBE_TIMEOUT_SECS,
            )),
            extract_timeout: Duration::from_secs(env_secs(
                "EXTRACT_TIMEOUT_SECS",
                EXTRACT_TIMEOUT_SECS,
            )),
        }
    }

    pub fn state(&self) -> ReviewState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(ReviewState::Idle)
    }

    pub fn session(&self) -> Option<&ReviewSession> {
        self.session.as_ref()
    }

    /// Start a session for freshly uploaded audio.
    ///
    /// An in-progress session is discarded and replaced; a session that
    /// already reached Accepted or Discarded must be cleared with
    /// [`Workflow::reset`] first, so its outcome can't be silently reused.
    pub fn upload(
        &mut self,
        audio: Vec<u8>,
        format: Option<AudioFormat>,
    ) -> Result<&ReviewSession, WorkflowError> {
        if self.state().is_terminal() {
            return Err(WorkflowError::InvalidTransition {
                state: self.state(),
                action: "upload",
            });
        }
        if let Some(old) = self.session.take() {
            info!("Discarding in-progress session {}", old.session_id);
        }

        let session = ReviewSession::new(audio, format);
        info!("Session {} created", session.session_id);
        Ok(&*self.session.insert(session))
    }

    /// Drop the current session, returning to Idle.
    pub fn reset(&mut self) {
        if let Some(old) = self.session.take() {
            info!("Session {} cleared", old.session_id);
        }
    }

    /// Run the ASR collaborator on the uploaded audio.
    ///
    /// Legal from Uploaded, or from Failed as a retry. An empty transcript
    /// is a failure: the extractor must never see empty input.
    pub async fn transcribe(&mut self) -> Result<&str, WorkflowError> {
        let session = self.session.as_mut().ok_or(WorkflowError::NoSession)?;
        if !matches!(session.state, ReviewState::Uploaded | ReviewState::Failed) {
            return Err(WorkflowError::InvalidTransition {
                state: session.state,
                action: "transcribe",
            });
        }

        let call = self.transcriber.transcribe(&session.audio, session.format);
        let raw = match timeout(self.transcribe_timeout, call).await {
            Err(_) => {
                let secs = self.transcribe_timeout.as_secs();
                session.fail(format!("transcription timed out after {}s", secs));
                return Err(TranscriptionError::Timeout(secs).into());
            }
            Ok(Err(e)) => {
                session.fail(e.to_string());
                return Err(e.into());
            }
            Ok(Ok(raw)) => raw,
        };

        match normalize_transcript(&raw) {
            Ok(normalized) => {
                info!(
                    "Session {} transcribed ({} chars)",
                    session.session_id,
                    normalized.len()
                );
                session.raw_transcript = Some(raw);
                session.state = ReviewState::Transcribed;
                Ok(&*session.transcript.insert(normalized))
            }
            Err(e) => {
                session.fail("transcription produced no text");
                Err(e.into())
            }
        }
    }

    /// Open the transcript for editing.
    pub fn edit_transcript(&mut self) -> Result<(), WorkflowError> {
        let session = self.session.as_mut().ok_or(WorkflowError::NoSession)?;
        if session.state != ReviewState::Transcribed {
            return Err(WorkflowError::InvalidTransition {
                state: session.state,
                action: "edit transcript",
            });
        }
        session.state = ReviewState::TranscriptEditing;
        Ok(())
    }

    /// Confirm an edited transcript, looping back to Transcribed.
    /// Edits are re-normalized; an edit that empties the transcript is
    /// rejected and the session stays in editing.
    pub fn confirm_transcript(&mut self, text: &str) -> Result<(), WorkflowError> {
        let session = self.session.as_mut().ok_or(WorkflowError::NoSession)?;
        if session.state != ReviewState::TranscriptEditing {
            return Err(WorkflowError::InvalidTransition {
                state: session.state,
                action: "confirm transcript",
            });
        }
        let normalized = normalize_transcript(text)?;
        session.transcript = Some(normalized);
        session.state = ReviewState::Transcribed;
        Ok(())
    }

    /// Run the extraction collaborator on the confirmed transcript.
    ///
    /// Legal from Transcribed, from Extracted (re-run after an empty or
    /// wrong result), or from Failed as a retry. The session sits in
    /// Extracting while the call is outstanding, which is what rejects a
    /// re-entrant dispatch. Parse and validation failures still land in
    /// Extracted: an empty batch is an outcome the human must see, not a
    /// workflow failure.
    pub async fn extract(&mut self) -> Result<&ValidatedBatch, WorkflowError> {
        let session = self.session.as_mut().ok_or(WorkflowError::NoSession)?;
        let state_ok = matches!(
            session.state,
            ReviewState::Transcribed | ReviewState::Extracted | ReviewState::Failed
        );
        let transcript = match session.transcript.as_deref() {
            Some(t) if state_ok => t,
            _ => {
                return Err(WorkflowError::InvalidTransition {
                    state: session.state,
                    action: "extract",
                });
            }
        };

        let prompt = build_request(transcript);
        session.state = ReviewState::Extracting;

        let raw = match timeout(self.extract_timeout, self.extractor.extract(&prompt)).await {
            Err(_) => {
                let secs = self.extract_timeout.as_secs();
                session.fail(format!("extraction timed out after {}s", secs));
                return Err(ExtractorError::Timeout(secs).into());
            }
            Ok(Err(e)) => {
                session.fail(e.to_string());
                return Err(e.into());
            }
            Ok(Ok(raw)) => raw,
        };

        let batch = parse_response(&raw);
        let validated = validate_batch(&batch);
        info!(
            "Session {} extracted: {} accepted, {} rejected, parse {:?}",
            session.session_id,
            validated.records().len(),
            validated.errors().len(),
            batch.status
        );

        session.raw_response = Some(raw);
        session.parse_status = Some(batch.status);
        session.state = ReviewState::Extracted;
        Ok(&*session.batch.insert(validated))
    }

    /// Open the extracted records for editing.
    pub fn edit_records(&mut self) -> Result<(), WorkflowError> {
        let session = self.session.as_mut().ok_or(WorkflowError::NoSession)?;
        if session.state != ReviewState::Extracted {
            return Err(WorkflowError::InvalidTransition {
                state: session.state,
                action: "edit records",
            });
        }
        session.state = ReviewState::RecordEditing;
        Ok(())
    }

    /// Confirm human-edited records, looping back to Extracted.
    ///
    /// Edited records pass back through the validator so manual input obeys
    /// the same invariants as extracted input; a rejected edit leaves the
    /// session in editing with the previous batch intact.
    pub fn confirm_records(
        &mut self,
        records: Vec<TransactionRecord>,
    ) -> Result<(), WorkflowError> {
        let session = self.session.as_mut().ok_or(WorkflowError::NoSession)?;
        if session.state != ReviewState::RecordEditing {
            return Err(WorkflowError::InvalidTransition {
                state: session.state,
                action: "confirm records",
            });
        }

        let candidates: Vec<serde_json::Value> = records
            .iter()
            .map(|r| serde_json::to_value(r).unwrap_or_default())
            .collect();
        let batch = crate::extract::ExtractionBatch {
            candidates,
            status: session.parse_status.unwrap_or(ParseStatus::Clean),
        };
        let validated = validate_batch(&batch);
        if let Some(err) = validated.errors().first() {
            return Err(WorkflowError::InvalidEdit((*err).clone()));
        }

        session.batch = Some(validated);
        session.state = ReviewState::Extracted;
        Ok(())
    }

    /// Accept the session's records. Terminal.
    pub fn accept(&mut self) -> Result<Vec<TransactionRecord>, WorkflowError> {
        let session = self.session.as_mut().ok_or(WorkflowError::NoSession)?;
        if session.state != ReviewState::Extracted {
            return Err(WorkflowError::InvalidTransition {
                state: session.state,
                action: "accept",
            });
        }
        let records: Vec<TransactionRecord> = session
            .batch
            .as_ref()
            .map(|b| b.records().into_iter().cloned().collect())
            .unwrap_or_default();
        session.state = ReviewState::Accepted;
        info!(
            "Session {} accepted with {} record(s)",
            session.session_id,
            records.len()
        );
        Ok(records)
    }

    /// Discard the session's records. Terminal.
    pub fn discard(&mut self) -> Result<(), WorkflowError> {
        let session = self.session.as_mut().ok_or(WorkflowError::NoSession)?;
        if session.state != ReviewState::Extracted {
            return Err(WorkflowError::InvalidTransition {
                state: session.state,
                action: "discard",
            });
        }
        session.state = ReviewState::Discarded;
        info!("Session {} discarded", session.session_id);
        Ok(())
    }
}

fn env_secs(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
