//! The extraction schema prompt and request builder.
//!
//! The extractor has no other source of truth for the record shape: every
//! field the validator checks must be named here, along with the null
//! policy, the Cash default, and the multi-record rule. A change to
//! `TransactionRecord` must touch this file and `validate.rs` together.

/// Bumped whenever the instructional contract below changes shape.
pub const SCHEMA_VERSION: &str = "v2";

const SCHEMA_PROMPT: &str = r#"The user described a financial transaction by voice. The speech was transcribed to text and that text is your input. It may be short, ungrammatical, and simple, e.g.: "today I spent 500 at dominoze".

The transcription model can mishear words, especially merchant names - "I spent 500 at tomato" likely means Zomato, not tomato. Think about what the speaker plausibly meant and correct such mistakes.

Extract these details and reply with JSON only, no other text:
{"amount": 105, "transaction_type": "Debit", "bank_name": "SBI", "merchant": "Auto Fuel Station", "payment_mode": "Credit Card", "transaction_date": "19-03-25", "reference_number": "507775912830", "tags": ["Transport"]}

Rules:
- "amount" is a non-negative number.
- "transaction_type" is "Debit" or "Credit".
- "transaction_date" uses DD-MM-YY.
- "tags" is a list of category strings.
- Any detail not present in the input must be null, except "payment_mode": when no mode is mentioned, use "Cash".
- If the input describes several purchases, reply with a JSON array containing one object per purchase, in the order they were mentioned."#;

/// Assemble the full prompt for one normalized transcript.
///
/// Pure string assembly, no business logic. The transcript must already be
/// normalized and non-empty.
pub fn build_request(normalized_transcript: &str) -> String {
    format!("{}\nMessage: {}", SCHEMA_PROMPT, normalized_transcript)
}
