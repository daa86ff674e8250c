//! One-time login codes.
//!
//! Codes live in an external store keyed by email so that restarts do not
//! invalidate an in-flight login. Failed attempts are counted on a separate
//! key with an atomic increment, so concurrent wrong guesses cannot reset
//! each other's count.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Codes expire five minutes after issue.
pub const OTP_TTL_SECONDS: u64 = 300;
/// Wrong guesses allowed before the code is discarded.
pub const MAX_OTP_ATTEMPTS: u64 = 5;

/// A pending login, parked between password check and code verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtpRecord {
    pub code: String,
    pub user_id: String,
    pub user_name: String,
    pub expires_at: DateTime<Utc>,
}

/// Random six-digit code, never starting with zero.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000u32).to_string()
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store (or replace) the pending record and reset the attempt counter.
    async fn put(&self, email: &str, record: &OtpRecord, ttl_seconds: u64)
        -> Result<(), AppError>;

    async fn get(&self, email: &str) -> Result<Option<OtpRecord>, AppError>;

    /// Drop the record and its attempt counter.
    async fn delete(&self, email: &str) -> Result<(), AppError>;

    /// Atomically bump the wrong-guess counter, returning the new total.
    async fn record_failed_attempt(&self, email: &str) -> Result<u64, AppError>;
}

#[derive(Clone)]
pub struct RedisOtpStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisOtpStore {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }

    fn record_key(email: &str) -> String {
        format!("otp:{email}")
    }

    fn attempts_key(email: &str) -> String {
        format!("otp_attempts:{email}")
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put(
        &self,
        email: &str,
        record: &OtpRecord,
        ttl_seconds: u64,
    ) -> Result<(), AppError> {
        let payload = serde_json::to_string(record).map_err(|e| AppError::Internal(e.into()))?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(Self::record_key(email), payload, ttl_seconds)
            .await?;
        conn.del::<_, ()>(Self::attempts_key(email)).await?;
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<OtpRecord>, AppError> {
        let mut conn = self.manager.clone();
        let payload: Option<String> = conn.get(Self::record_key(email)).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(|e| AppError::Internal(e.into())))
            .transpose()
    }

    async fn delete(&self, email: &str) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(Self::record_key(email)).await?;
        conn.del::<_, ()>(Self::attempts_key(email)).await?;
        Ok(())
    }

    async fn record_failed_attempt(&self, email: &str) -> Result<u64, AppError> {
        let mut conn = self.manager.clone();
        let attempts: u64 = conn.incr(Self::attempts_key(email), 1).await?;
        if attempts == 1 {
            // Counter dies with the code even if verification never finishes
            conn.expire::<_, ()>(Self::attempts_key(email), OTP_TTL_SECONDS as i64)
                .await?;
        }
        Ok(attempts)
    }
}

/// In-process store for tests and redis-less development.
#[derive(Default)]
pub struct MemoryOtpStore {
    entries: tokio::sync::Mutex<std::collections::HashMap<String, (OtpRecord, u64)>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn put(
        &self,
        email: &str,
        record: &OtpRecord,
        _ttl_seconds: u64,
    ) -> Result<(), AppError> {
        self.entries
            .lock()
            .await
            .insert(email.to_string(), (record.clone(), 0));
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<OtpRecord>, AppError> {
        Ok(self
            .entries
            .lock()
            .await
            .get(email)
            .map(|(record, _)| record.clone()))
    }

    async fn delete(&self, email: &str) -> Result<(), AppError> {
        self.entries.lock().await.remove(email);
        Ok(())
    }

    async fn record_failed_attempt(&self, email: &str) -> Result<u64, AppError> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(email) {
            Some((_, attempts)) => {
                *attempts += 1;
                Ok(*attempts)
            }
            None => Ok(1),
        }
    }
}
