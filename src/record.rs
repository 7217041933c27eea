//! Structured transaction records extracted from spoken descriptions.

use serde::{Deserialize, Serialize};

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Debit,
    Credit,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Debit => write!(f, "Debit"),
            TransactionType::Credit => write!(f, "Credit"),
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = ();

    /// Case-insensitive. Unknown strings are an `Err`, which the validator
    /// maps to `None` rather than rejecting the record.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debit" => Ok(TransactionType::Debit),
            "credit" => Ok(TransactionType::Credit),
            _ => Err(()),
        }
    }
}

/// One purchase or payment event extracted from one utterance segment.
///
/// Every field is optional except `payment_mode`: an utterance that names no
/// mode gets `"Cash"`, so absence of information there is distinguishable
/// from a genuinely unextractable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Amount spent or received, non-negative when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Debit or Credit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    /// Bank named in the utterance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    /// Payment mode, never empty; defaults to "Cash"
    pub payment_mode: String,
    /// Merchant, mishearing-corrected by the extractor ("tomato" -> "Zomato")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    /// Date in DD-MM-YY form, no timezone semantics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<String>,
    /// Transaction reference number read out by the speaker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
    /// Category tags in mention order (possibly empty)
    #[serde(default)]
    pub tags: Vec<String>,
}

pub const DEFAULT_PAYMENT_MODE: &str = "Cash";

impl Default for TransactionRecord {
    fn default() -> Self {
        Self {
            amount: None,
            transaction_type: None,
            bank_name: None,
            payment_mode: DEFAULT_PAYMENT_MODE.to_string(),
            merchant: None,
            transaction_date: None,
            reference_number: None,
            tags: Vec::new(),
        }
    }
}

impl TransactionRecord {
    /// True when nothing besides the always-present payment mode carries
    /// information. Such records are rejected as empty extractions.
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.transaction_type.is_none()
            && self.bank_name.is_none()
            && self.merchant.is_none()
            && self.transaction_date.is_none()
            && self.reference_number.is_none()
            && self.tags.is_empty()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_from_str() {
        assert_eq!("debit".parse::<TransactionType>(), Ok(TransactionType::Debit));
        assert_eq!(" Credit ".parse::<TransactionType>(), Ok(TransactionType::Credit));
        assert!("upi".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_default_record_is_empty() {
        let record = TransactionRecord::default();
        assert!(record.is_empty());
        assert_eq!(record.payment_mode, "Cash");
    }

    #[test]
    fn test_any_field_makes_record_non_empty() {
        let record = TransactionRecord {
            merchant: Some("Zomato".to_string()),
            ..Default::default()
        };
        assert!(!record.is_empty());

        let record = TransactionRecord {
            tags: vec!["Food".to_string()],
            ..Default::default()
        };
        assert!(!record.is_empty());
    }

    #[test]
    fn test_serde_round_trip() {
        let record = TransactionRecord {
            amount: Some(500.0),
            transaction_type: Some(TransactionType::Debit),
            merchant: Some("Domino's".to_string()),
            tags: vec!["Food".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: TransactionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
