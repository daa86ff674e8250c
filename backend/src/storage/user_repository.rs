use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::domain::models::User;
use crate::error::AppError;
use crate::storage::DbConnection;

#[derive(Clone)]
pub struct UserRepository {
    db: DbConnection,
}

impl UserRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn insert(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, is_active, created_at, last_login)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.created_at.to_rfc3339())
        .bind(user.last_login.map(|d| d.to_rfc3339()))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(row_to_user).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(row_to_user).transpose()
    }

    /// True if another user (different id) already owns this email.
    pub async fn email_taken_by_other(&self, email: &str, user_id: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT id FROM users WHERE email = ? AND id != ?")
            .bind(email)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.is_some())
    }

    pub async fn update_profile(&self, id: &str, name: &str, email: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET name = ?, email = ? WHERE id = ?")
            .bind(name)
            .bind(email)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    pub async fn update_password(&self, id: &str, password_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    pub async fn set_last_login(&self, id: &str, when: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(when.to_rfc3339())
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> Result<User, AppError> {
    let created_at: String = row.get("created_at");
    let last_login: Option<String> = row.get("last_login");
    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        created_at: parse_rfc3339(&created_at)?,
        last_login: last_login.as_deref().map(parse_rfc3339).transpose()?,
    })
}

pub(crate) fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("malformed timestamp {s:?} in storage: {e}")))
}
