use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// PHC-formatted argon2 hash, never serialized to clients
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn generate_id() -> String {
        format!("user_{}", uuid::Uuid::new_v4())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UserValidationError {
    #[error("Please provide name, email, and password.")]
    MissingFields,
    #[error("Password must be at least 6 characters long.")]
    PasswordTooShort,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("An account with this email already exists.")]
    EmailTaken,
}
