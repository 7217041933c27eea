//! Structural validation of candidate records.
//!
//! Candidates arrive as loose JSON from a model that doesn't always respect
//! the schema's field names or types, so lookup is alias-tolerant and value
//! coercion is lenient where the policy allows it. Validation is
//! independent per candidate: one bad record in a batch never invalidates
//! its neighbors.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::parser::ExtractionBatch;
use crate::record::{TransactionRecord, TransactionType, DEFAULT_PAYMENT_MODE};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount is not a non-negative number: {0}")]
    InvalidAmount(String),
    #[error("Candidate is not a JSON object")]
    NotAnObject,
    #[error("Every extractable field is null or empty")]
    EmptyRecord,
}

/// Per-candidate outcomes for one batch, in original mention order.
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    pub outcomes: Vec<Result<TransactionRecord, ValidationError>>,
}

impl ValidatedBatch {
    /// Accepted records only, order preserved.
    pub fn records(&self) -> Vec<&TransactionRecord> {
        self.outcomes
            .iter()
            .filter_map(|o| o.as_ref().ok())
            .collect()
    }

    /// Rejected candidates only, order preserved.
    pub fn errors(&self) -> Vec<&ValidationError> {
        self.outcomes
            .iter()
            .filter_map(|o| o.as_ref().err())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }
}

/// Validate every candidate in a batch independently.
pub fn validate_batch(batch: &ExtractionBatch) -> ValidatedBatch {
    let outcomes = batch
        .candidates
        .iter()
        .map(validate_candidate)
        .collect::<Vec<_>>();

    let rejected = outcomes.iter().filter(|o| o.is_err()).count();
    if rejected > 0 {
        debug!(
            "Validated batch: {} accepted, {} rejected",
            outcomes.len() - rejected,
            rejected
        );
    }

    ValidatedBatch { outcomes }
}

/// Validate one candidate against the record schema.
pub fn validate_candidate(candidate: &Value) -> Result<TransactionRecord, ValidationError> {
    let object = candidate.as_object().ok_or(ValidationError::NotAnObject)?;

    // Alias-tolerant lookup: the model reuses the example's loose key names
    // ("Transaction Type", "marchent", "paied to whom") as often as ours.
    let lookup = |aliases: &[&str]| -> Option<&Value> {
        object
            .iter()
            .find(|(key, value)| {
                !value.is_null() && aliases.contains(&normalize_key(key).as_str())
            })
            .map(|(_, value)| value)
    };

    let amount = match lookup(&["amount"]) {
        Some(value) => Some(coerce_amount(value)?),
        None => None,
    };

    // Unknown type strings map to null rather than rejecting the record
    let transaction_type = lookup(&["transactiontype", "type"])
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<TransactionType>().ok());

    let bank_name = lookup(&["bankname", "bank"]).and_then(non_empty_string);

    let payment_mode = lookup(&["paymentmode", "transactionmode", "mode", "cardtype"])
        .and_then(non_empty_string)
        .unwrap_or_else(|| DEFAULT_PAYMENT_MODE.to_string());

    let merchant = lookup(&["merchant", "marchent", "paiedtowhom", "paidtowhom"])
        .and_then(non_empty_string);

    // Dates that don't fit DD-MM-YY become null, same soft policy as the
    // transaction type
    let transaction_date = lookup(&["transactiondate", "date"])
        .and_then(non_empty_string)
        .filter(|s| is_valid_date(s));

    let reference_number = lookup(&["referencenumber", "reference"]).and_then(reference_string);

    let tags = lookup(&["tags", "tag"]).map(coerce_tags).unwrap_or_default();

    let record = TransactionRecord {
        amount,
        transaction_type,
        bank_name,
        payment_mode,
        merchant,
        transaction_date,
        reference_number,
        tags,
    };

    if record.is_empty() {
        return Err(ValidationError::EmptyRecord);
    }

    Ok(record)
}

/// Lowercase a key and strip spaces, underscores, and hyphens so that
/// "Transaction Type", "transaction_type", and "TransactionType" collide.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Accept JSON numbers and numeric strings; anything else, or a negative
/// value, is a hard per-record error.
fn coerce_amount(value: &Value) -> Result<f64, ValidationError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n >= 0.0 && n.is_finite() => Ok(n),
        _ => Err(ValidationError::InvalidAmount(value.to_string())),
    }
}

fn non_empty_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Reference numbers are free text but models sometimes emit them as JSON
/// numbers; keep those as their decimal spelling.
fn reference_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        _ => non_empty_string(value),
    }
}

fn is_valid_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%d-%m-%y").is_ok()
}

/// Trimmed, non-empty strings in original order. A bare string becomes a
/// single tag; non-string array elements are skipped.
fn coerce_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(non_empty_string)
            .collect(),
        Value::String(_) => non_empty_string(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_original_prompt_key_names_accepted() {
        // Key spellings straight out of the extractor's worked example
        let candidate = json!({
            "Amount": 105,
            "Transaction Type": "Debit",
            "Bank Name": "SBI",
            "marchent": "Auto Fuel Station",
            "Transaction Mode": "Credit Card",
            "Transaction Date": "19-03-25",
            "Reference Number": "507775912830",
            "tag": ["Transport"]
        });
        let record = validate_candidate(&candidate).unwrap();
        assert_eq!(record.amount, Some(105.0));
        assert_eq!(record.transaction_type, Some(TransactionType::Debit));
        assert_eq!(record.bank_name.as_deref(), Some("SBI"));
        assert_eq!(record.merchant.as_deref(), Some("Auto Fuel Station"));
        assert_eq!(record.payment_mode, "Credit Card");
        assert_eq!(record.transaction_date.as_deref(), Some("19-03-25"));
        assert_eq!(record.reference_number.as_deref(), Some("507775912830"));
        assert_eq!(record.tags, vec!["Transport"]);
    }

    #[test]
    fn test_missing_payment_mode_defaults_to_cash() {
        let candidate = json!({"amount": 500, "merchant": "Domino's", "payment_mode": null});
        let record = validate_candidate(&candidate).unwrap();
        assert_eq!(record.payment_mode, "Cash");

        let candidate = json!({"amount": 500, "payment_mode": "  "});
        let record = validate_candidate(&candidate).unwrap();
        assert_eq!(record.payment_mode, "Cash");
    }

    #[test]
    fn test_amount_coercion() {
        let record = validate_candidate(&json!({"amount": "250.50"})).unwrap();
        assert_eq!(record.amount, Some(250.5));

        let err = validate_candidate(&json!({"amount": -3})).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAmount(_)));

        let err = validate_candidate(&json!({"amount": "five hundred"})).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAmount(_)));
    }

    #[test]
    fn test_unknown_transaction_type_becomes_null() {
        let candidate = json!({"amount": 10, "transaction_type": "UPI"});
        let record = validate_candidate(&candidate).unwrap();
        assert_eq!(record.transaction_type, None);
    }

    #[test]
    fn test_malformed_date_becomes_null() {
        let candidate = json!({"amount": 10, "transaction_date": "March 19th"});
        let record = validate_candidate(&candidate).unwrap();
        assert_eq!(record.transaction_date, None);

        let candidate = json!({"amount": 10, "transaction_date": "19-03-25"});
        let record = validate_candidate(&candidate).unwrap();
        assert_eq!(record.transaction_date.as_deref(), Some("19-03-25"));
    }

    #[test]
    fn test_tags_trimmed_and_filtered() {
        let candidate = json!({"amount": 1, "tags": [" Food ", "", 7, "Dining"]});
        let record = validate_candidate(&candidate).unwrap();
        assert_eq!(record.tags, vec!["Food", "Dining"]);

        let candidate = json!({"amount": 1, "tags": "Transport"});
        let record = validate_candidate(&candidate).unwrap();
        assert_eq!(record.tags, vec!["Transport"]);
    }

    #[test]
    fn test_all_null_record_rejected_despite_payment_mode() {
        let candidate = json!({
            "amount": null,
            "transaction_type": null,
            "merchant": null,
            "payment_mode": "Cash"
        });
        let err = validate_candidate(&candidate).unwrap_err();
        assert_eq!(err, ValidationError::EmptyRecord);
    }

    #[test]
    fn test_non_object_candidate_rejected() {
        assert_eq!(
            validate_candidate(&json!("just text")).unwrap_err(),
            ValidationError::NotAnObject
        );
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let batch = crate::extract::parse_response(
            r#"[{"amount": 80, "merchant": "coffee"},
                {"amount": "nonsense"},
                {"amount": 250, "merchant": "lunch"}]"#,
        );
        let validated = validate_batch(&batch);
        assert_eq!(validated.len(), 3);
        assert_eq!(validated.records().len(), 2);
        assert_eq!(validated.errors().len(), 1);
        assert_eq!(validated.records()[0].amount, Some(80.0));
        assert_eq!(validated.records()[1].amount, Some(250.0));
        assert!(validated.outcomes[1].is_err());
    }

    #[test]
    fn test_round_trip_through_serialization() {
        let record = TransactionRecord {
            amount: Some(500.0),
            transaction_type: Some(TransactionType::Debit),
            bank_name: None,
            payment_mode: "Cash".to_string(),
            merchant: Some("Domino's".to_string()),
            transaction_date: Some("19-03-25".to_string()),
            reference_number: None,
            tags: vec!["Food".to_string()],
        };
        let serialized = serde_json::to_string(&record).unwrap();
        let batch = crate::extract::parse_response(&serialized);
        let validated = validate_batch(&batch);
        assert_eq!(validated.records(), vec![&record]);
    }
}
