//! SQLite persistence layer.
//!
//! `DbConnection` owns the pool and bootstraps the schema; the repositories
//! wrap user-scoped queries for each aggregate. Gamification sub-entities
//! (streaks, achievements, challenges) live in their own tables keyed by
//! user id so updates can be targeted instead of rewriting whole profiles.

pub mod gamification_repository;
pub mod transaction_repository;
pub mod user_repository;

pub use gamification_repository::GamificationRepository;
pub use transaction_repository::TransactionRepository;
pub use user_repository::UserRepository;

use std::sync::Arc;

use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};

use crate::error::AppError;

/// DbConnection manages database access for all repositories.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection, creating the database file and
    /// schema if they do not exist yet.
    pub async fn new(url: &str) -> Result<Self, AppError> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?;
        }

        let pool = SqlitePool::connect(url).await?;
        Self::setup_schema(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize a test database with a unique shared-cache memory name.
    #[cfg(test)]
    pub async fn init_test() -> Result<Self, AppError> {
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);
        Self::new(&db_url).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn setup_schema(pool: &SqlitePool) -> Result<(), AppError> {
        // One statement per call: sqlx prepares each query individually.
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                last_login TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_user_date
                ON transactions (user_id, date DESC)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS gamification_profiles (
                user_id TEXT PRIMARY KEY,
                level INTEGER NOT NULL DEFAULT 1,
                total_points INTEGER NOT NULL DEFAULT 0,
                total_transactions INTEGER NOT NULL DEFAULT 0,
                total_saved REAL NOT NULL DEFAULT 0,
                budget_goals_achieved INTEGER NOT NULL DEFAULT 0,
                investments_made INTEGER NOT NULL DEFAULT 0,
                months_active INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS streaks (
                user_id TEXT NOT NULL,
                streak_key TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                last_date TEXT,
                longest INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, streak_key)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS achievements (
                user_id TEXT NOT NULL,
                template_id TEXT NOT NULL,
                is_unlocked INTEGER NOT NULL DEFAULT 0,
                unlocked_at TEXT,
                PRIMARY KEY (user_id, template_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS challenges (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                template_id TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('active', 'completed')),
                current_progress REAL NOT NULL DEFAULT 0,
                deadline TEXT NOT NULL,
                completed_at TEXT,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_challenges_user_status
                ON challenges (user_id, status)
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(pool).await?;
        }

        Ok(())
    }
}
