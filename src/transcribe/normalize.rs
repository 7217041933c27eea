//! Transcript normalization.
//!
//! ASR output arrives with stray whitespace, newlines, and tabs. Only the
//! spacing is cleaned here: casing and word content are left alone, since
//! mishearing correction ("tomato" -> "Zomato") is the extractor's job.

use super::TranscriptionError;

/// Clean up whitespace in a raw transcript without touching its words.
///
/// Returns `EmptyTranscript` for empty or whitespace-only input; the
/// workflow must not hand an empty transcript to the extractor.
pub fn normalize_transcript(raw: &str) -> Result<String, TranscriptionError> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Err(TranscriptionError::EmptyTranscript);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_input_unchanged() {
        assert_eq!(
            normalize_transcript("today I spent 500 at dominoze").unwrap(),
            "today I spent 500 at dominoze"
        );
    }

    #[test]
    fn test_collapses_whitespace_runs() {
        assert_eq!(
            normalize_transcript("  paid\t200 \n to  zomato ").unwrap(),
            "paid 200 to zomato"
        );
    }

    #[test]
    fn test_casing_untouched() {
        assert_eq!(normalize_transcript("Paid VIA SBI").unwrap(), "Paid VIA SBI");
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            normalize_transcript(""),
            Err(TranscriptionError::EmptyTranscript)
        ));
        assert!(matches!(
            normalize_transcript("  \n\t "),
            Err(TranscriptionError::EmptyTranscript)
        ));
    }
}
