use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    /// Convert to string for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    /// Parse from the wire/storage representation
    pub fn parse(s: &str) -> Result<Self, TransactionValidationError> {
        match s {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            _ => Err(TransactionValidationError::InvalidType),
        }
    }
}

/// A single income or expense record, always owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub kind: TransactionType,
    /// Always non-negative; direction is carried by `kind`
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn generate_id() -> String {
        format!("txn_{}", uuid::Uuid::new_v4())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransactionValidationError {
    #[error("Type must be either \"income\" or \"expense\"")]
    InvalidType,
    #[error("Amount must be greater than 0")]
    NonPositiveAmount,
    #[error("Category is required")]
    MissingCategory,
    #[error("Description cannot exceed 500 characters")]
    DescriptionTooLong,
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}
