use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

mod extract;
mod record;
mod session;
mod transcribe;

use extract::{GroqExtractor, SCHEMA_VERSION};
use record::{TransactionRecord, TransactionType};
use session::{ReviewState, Workflow, WorkflowError};
use transcribe::{AudioFormat, TranscriptionError, WhisperModel, WhisperTranscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let model: WhisperModel = std::env::var("WHISPER_MODEL")
        .unwrap_or_else(|_| "small".to_string())
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let language = std::env::var("WHISPER_LANGUAGE").ok();

    // Both collaborators are created once here and live for the whole
    // process; the workflow only ever borrows them.
    let transcriber =
        Arc::new(WhisperTranscriber::new(model, language).context("Failed to load Whisper model")?);
    let extractor =
        Arc::new(GroqExtractor::from_env().context("Failed to configure Groq extractor")?);

    info!(
        "Ready: Whisper {} + Groq {} (schema {})",
        transcriber.model(),
        extractor.model(),
        SCHEMA_VERSION
    );

    let mut workflow = Workflow::new(transcriber, extractor);

    println!("voxledger - speak a transaction, review it, accept it");
    println!("Commands: load <wav> | transcribe | edit <text> | extract | show");
    println!("          set <n> <field> <value> | accept | discard | reset | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt(workflow.state());
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        let outcome = match command {
            "quit" | "exit" => break,
            "load" => load(&mut workflow, rest),
            "transcribe" => workflow.transcribe().await.map(|t| {
                println!("Transcript: {}", t);
            }),
            "edit" => edit_transcript(&mut workflow, rest),
            "extract" => workflow.extract().await.map(|batch| {
                println!(
                    "Extracted {} record(s), {} rejected",
                    batch.records().len(),
                    batch.errors().len()
                );
            }),
            "show" => {
                show(&workflow);
                Ok(())
            }
            "set" => set_field(&mut workflow, rest),
            "accept" => workflow.accept().map(|records| {
                for record in &records {
                    println!("{}", record.to_json_pretty());
                }
                println!(
                    "Accepted {} record(s). Use 'reset' to start over.",
                    records.len()
                );
            }),
            "discard" => workflow.discard().map(|()| {
                println!("Discarded. Use 'reset' to start over.");
            }),
            "reset" => {
                workflow.reset();
                Ok(())
            }
            other => {
                println!("Unknown command: {}", other);
                Ok(())
            }
        };

        // Invalid actions are reported and the session stays where it was
        if let Err(e) = outcome {
            println!("Error: {}", e);
        }
    }

    Ok(())
}

fn print_prompt(state: ReviewState) {
    use std::io::Write;
    print!("[{}] > ", state);
    let _ = std::io::stdout().flush();
}

fn load(workflow: &mut Workflow, path: &str) -> Result<(), WorkflowError> {
    if path.is_empty() {
        println!("Usage: load <path-to-wav>");
        return Ok(());
    }
    let path = Path::new(path);
    let format = AudioFormat::from_path(path).map_err(WorkflowError::Transcription)?;
    let audio = std::fs::read(path)
        .map_err(|e| WorkflowError::Transcription(TranscriptionError::Io(e)))?;
    let session = workflow.upload(audio, Some(format))?;
    println!(
        "Session {} created ({} bytes)",
        session.session_id,
        session.audio.len()
    );
    Ok(())
}

fn edit_transcript(workflow: &mut Workflow, text: &str) -> Result<(), WorkflowError> {
    // A rejected confirm leaves the session in the editing state; re-enter
    // it there instead of failing the transition check.
    if workflow.state() != ReviewState::TranscriptEditing {
        workflow.edit_transcript()?;
    }
    workflow.confirm_transcript(text)?;
    println!("Transcript updated");
    Ok(())
}

/// Apply one field edit to one extracted record, via the editing cycle so
/// the change is re-validated like any other input.
fn set_field(workflow: &mut Workflow, args: &str) -> Result<(), WorkflowError> {
    let mut parts = args.splitn(3, ' ');
    let (Some(index), Some(field), Some(value)) = (parts.next(), parts.next(), parts.next())
    else {
        println!("Usage: set <record#> <field> <value>   (fields: amount, type, bank, mode, merchant, date, ref, tags)");
        return Ok(());
    };
    let Ok(index) = index.parse::<usize>() else {
        println!("Record number must be an integer");
        return Ok(());
    };

    let mut records: Vec<TransactionRecord> = workflow
        .session()
        .and_then(|s| s.batch.as_ref())
        .map(|b| b.records().into_iter().cloned().collect())
        .unwrap_or_default();

    let Some(record) = records.get_mut(index) else {
        println!("No record #{}", index);
        return Ok(());
    };
    if let Err(reason) = apply_field(record, field, value) {
        println!("{}", reason);
        return Ok(());
    }

    if workflow.state() != ReviewState::RecordEditing {
        workflow.edit_records()?;
    }
    workflow.confirm_records(records)?;
    println!("Record #{} updated", index);
    Ok(())
}

fn apply_field(record: &mut TransactionRecord, field: &str, value: &str) -> Result<(), String> {
    let value = value.trim();
    let optional = |v: &str| {
        if v == "null" || v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    };

    match field {
        "amount" => {
            record.amount = if value == "null" {
                None
            } else {
                Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Not a number: {}", value))?,
                )
            }
        }
        "type" => {
            record.transaction_type = if value == "null" {
                None
            } else {
                Some(
                    value
                        .parse::<TransactionType>()
                        .map_err(|_| "Type must be Debit or Credit".to_string())?,
                )
            }
        }
        "bank" => record.bank_name = optional(value),
        "mode" => record.payment_mode = value.to_string(),
        "merchant" => record.merchant = optional(value),
        "date" => record.transaction_date = optional(value),
        "ref" => record.reference_number = optional(value),
        "tags" => {
            record.tags = value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        }
        other => return Err(format!("Unknown field: {}", other)),
    }
    Ok(())
}

fn show(workflow: &Workflow) {
    let Some(session) = workflow.session() else {
        println!("No active session");
        return;
    };

    println!("Session {} [{}]", session.session_id, session.state);
    if let Some(reason) = &session.failure {
        println!("Failure: {}", reason);
    }
    if let Some(transcript) = &session.transcript {
        println!("Transcript: {}", transcript);
    }
    if let Some(status) = session.parse_status {
        println!("Parse status: {:?}", status);
    }
    match &session.batch {
        Some(batch) if batch.is_empty() => {
            println!("No transaction details were extracted. Edit the transcript and re-run 'extract', or enter records manually.");
        }
        Some(batch) => {
            for (i, outcome) in batch.outcomes.iter().enumerate() {
                match outcome {
                    Ok(record) => println!("#{}\n{}", i, record.to_json_pretty()),
                    Err(e) => println!("#{} rejected: {}", i, e),
                }
            }
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::extract::{Extract, ExtractorError};
    use crate::transcribe::Transcribe;

    struct FakeTranscriber {
        transcript: String,
    }

    #[async_trait]
    impl Transcribe for FakeTranscriber {
        async fn transcribe(
            &self,
            _audio: &[u8],
            _format: Option<AudioFormat>,
        ) -> Result<String, TranscriptionError> {
            Ok(self.transcript.clone())
        }
    }

    struct FakeExtractor {
        response: String,
    }

    #[async_trait]
    impl Extract for FakeExtractor {
        async fn extract(&self, _prompt: &str) -> Result<String, ExtractorError> {
            Ok(self.response.clone())
        }
    }

    fn workflow(transcript: &str, response: &str) -> Workflow {
        Workflow::new(
            Arc::new(FakeTranscriber {
                transcript: transcript.to_string(),
            }),
            Arc::new(FakeExtractor {
                response: response.to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn test_edit_command_recovers_after_rejected_edit() {
        let mut wf = workflow("spent 500 at tomato", "[]");
        wf.upload(vec![0u8; 4], None).unwrap();
        wf.transcribe().await.unwrap();

        // An empty edit is rejected mid-cycle, leaving the session in
        // TranscriptEditing; the command must still work on the next try.
        assert!(edit_transcript(&mut wf, "   ").is_err());
        assert_eq!(wf.state(), ReviewState::TranscriptEditing);

        edit_transcript(&mut wf, "spent 500 at Zomato").unwrap();
        assert_eq!(wf.state(), ReviewState::Transcribed);
        assert_eq!(
            wf.session().unwrap().transcript.as_deref(),
            Some("spent 500 at Zomato")
        );
    }

    #[tokio::test]
    async fn test_set_command_recovers_after_rejected_edit() {
        let mut wf = workflow("spent 500 somewhere", r#"{"amount": 500}"#);
        wf.upload(vec![0u8; 4], None).unwrap();
        wf.transcribe().await.unwrap();
        wf.extract().await.unwrap();

        // Blanking the only informative field empties the record, which the
        // validator rejects; the session is left in RecordEditing.
        assert!(set_field(&mut wf, "0 amount null").is_err());
        assert_eq!(wf.state(), ReviewState::RecordEditing);

        set_field(&mut wf, "0 merchant Zomato").unwrap();
        assert_eq!(wf.state(), ReviewState::Extracted);

        let records: Vec<TransactionRecord> = wf
            .session()
            .and_then(|s| s.batch.as_ref())
            .map(|b| b.records().into_iter().cloned().collect())
            .unwrap_or_default();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, Some(500.0));
        assert_eq!(records[0].merchant.as_deref(), Some("Zomato"));
    }
}
