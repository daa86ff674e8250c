use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::domain::models::{Transaction, TransactionType};
use crate::error::AppError;
use crate::storage::user_repository::parse_rfc3339;
use crate::storage::DbConnection;

/// Optional filters for listing a user's transactions.
#[derive(Debug, Default, Clone)]
pub struct TransactionFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub kind: Option<TransactionType>,
    pub category: Option<String>,
}

#[derive(Clone)]
pub struct TransactionRepository {
    db: DbConnection,
}

impl TransactionRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn insert(&self, transaction: &Transaction) -> Result<(), AppError> {
        let tags = serde_json::to_string(&transaction.tags)
            .map_err(|e| AppError::Internal(e.into()))?;
        sqlx::query(
            "INSERT INTO transactions (id, user_id, kind, amount, category, description, date, tags, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&transaction.id)
        .bind(&transaction.user_id)
        .bind(transaction.kind.as_str())
        .bind(transaction.amount)
        .bind(&transaction.category)
        .bind(&transaction.description)
        .bind(transaction.date.to_rfc3339())
        .bind(tags)
        .bind(transaction.created_at.to_rfc3339())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn find_by_id(
        &self,
        user_id: &str,
        transaction_id: &str,
    ) -> Result<Option<Transaction>, AppError> {
        let row = sqlx::query("SELECT * FROM transactions WHERE id = ? AND user_id = ?")
            .bind(transaction_id)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(row_to_transaction).transpose()
    }

    /// List a user's transactions newest-first, with optional filters.
    pub async fn list(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        // RFC 3339 timestamps in UTC sort lexicographically, so string
        // comparisons against the date column are chronological.
        let mut sql = String::from("SELECT * FROM transactions WHERE user_id = ?");
        if filter.start.is_some() {
            sql.push_str(" AND date >= ?");
        }
        if filter.end.is_some() {
            sql.push_str(" AND date <= ?");
        }
        if filter.kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        if filter.category.is_some() {
            sql.push_str(" AND category = ?");
        }
        sql.push_str(" ORDER BY date DESC, created_at DESC");

        let mut query = sqlx::query(&sql).bind(user_id);
        if let Some(start) = filter.start {
            query = query.bind(start.to_rfc3339());
        }
        if let Some(end) = filter.end {
            query = query.bind(end.to_rfc3339());
        }
        if let Some(kind) = filter.kind {
            query = query.bind(kind.as_str());
        }
        if let Some(category) = &filter.category {
            query = query.bind(category.clone());
        }

        let rows = query.fetch_all(self.db.pool()).await?;
        rows.into_iter().map(row_to_transaction).collect()
    }

    /// Every transaction the user has ever recorded, for achievement checks.
    pub async fn list_all(&self, user_id: &str) -> Result<Vec<Transaction>, AppError> {
        self.list(user_id, &TransactionFilter::default()).await
    }

    /// Transactions on or after `since`, newest-first.
    pub async fn list_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, AppError> {
        self.list(
            user_id,
            &TransactionFilter {
                start: Some(since),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn update(&self, transaction: &Transaction) -> Result<bool, AppError> {
        let tags = serde_json::to_string(&transaction.tags)
            .map_err(|e| AppError::Internal(e.into()))?;
        let result = sqlx::query(
            "UPDATE transactions
             SET kind = ?, amount = ?, category = ?, description = ?, date = ?, tags = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(transaction.kind.as_str())
        .bind(transaction.amount)
        .bind(&transaction.category)
        .bind(&transaction.description)
        .bind(transaction.date.to_rfc3339())
        .bind(tags)
        .bind(&transaction.id)
        .bind(&transaction.user_id)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, user_id: &str, transaction_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ? AND user_id = ?")
            .bind(transaction_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every transaction the user owns, returning how many went.
    pub async fn delete_all(&self, user_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM transactions WHERE user_id = ?")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Distinct category names the user has used, alphabetical.
    pub async fn distinct_categories(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT DISTINCT category FROM transactions WHERE user_id = ? ORDER BY category",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().map(|r| r.get("category")).collect())
    }
}

fn row_to_transaction(row: sqlx::sqlite::SqliteRow) -> Result<Transaction, AppError> {
    let kind: String = row.get("kind");
    let date: String = row.get("date");
    let created_at: String = row.get("created_at");
    let tags: String = row.get("tags");
    Ok(Transaction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: TransactionType::parse(&kind)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("bad kind in storage: {e}")))?,
        amount: row.get("amount"),
        category: row.get("category"),
        description: row.get("description"),
        date: parse_rfc3339(&date)?,
        tags: serde_json::from_str(&tags).map_err(|e| AppError::Internal(e.into()))?,
        created_at: parse_rfc3339(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_transaction(
        user_id: &str,
        kind: TransactionType,
        amount: f64,
        category: &str,
        date: DateTime<Utc>,
    ) -> Transaction {
        Transaction {
            id: Transaction::generate_id(),
            user_id: user_id.to_string(),
            kind,
            amount,
            category: category.to_string(),
            description: String::new(),
            date,
            tags: vec![],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_newest_first() {
        let db = DbConnection::init_test().await.expect("test db");
        let repo = TransactionRepository::new(db);

        let older = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        repo.insert(&sample_transaction("u1", TransactionType::Expense, 50.0, "Food", older))
            .await
            .expect("insert");
        repo.insert(&sample_transaction("u1", TransactionType::Income, 900.0, "Salary", newer))
            .await
            .expect("insert");

        let listed = repo.list_all("u1").await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].category, "Salary");
        assert_eq!(listed[1].category, "Food");
    }

    #[tokio::test]
    async fn test_list_is_user_scoped() {
        let db = DbConnection::init_test().await.expect("test db");
        let repo = TransactionRepository::new(db);

        let date = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        repo.insert(&sample_transaction("u1", TransactionType::Expense, 10.0, "Food", date))
            .await
            .expect("insert");
        repo.insert(&sample_transaction("u2", TransactionType::Expense, 20.0, "Food", date))
            .await
            .expect("insert");

        let listed = repo.list_all("u1").await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount, 10.0);
    }

    #[tokio::test]
    async fn test_filters() {
        let db = DbConnection::init_test().await.expect("test db");
        let repo = TransactionRepository::new(db);

        let jan = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        repo.insert(&sample_transaction("u1", TransactionType::Expense, 10.0, "Food", jan))
            .await
            .expect("insert");
        repo.insert(&sample_transaction("u1", TransactionType::Income, 500.0, "Salary", feb))
            .await
            .expect("insert");

        let filter = TransactionFilter {
            start: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        let listed = repo.list("u1", &filter).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].kind, TransactionType::Income);

        let filter = TransactionFilter {
            kind: Some(TransactionType::Expense),
            ..Default::default()
        };
        let listed = repo.list("u1", &filter).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].category, "Food");

        let filter = TransactionFilter {
            category: Some("Salary".to_string()),
            ..Default::default()
        };
        let listed = repo.list("u1", &filter).await.expect("list");
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = DbConnection::init_test().await.expect("test db");
        let repo = TransactionRepository::new(db);

        let date = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut txn = sample_transaction("u1", TransactionType::Expense, 10.0, "Food", date);
        repo.insert(&txn).await.expect("insert");

        txn.amount = 25.0;
        assert!(repo.update(&txn).await.expect("update"));
        let found = repo
            .find_by_id("u1", &txn.id)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.amount, 25.0);

        // Wrong owner cannot touch it
        assert!(!repo.delete("u2", &txn.id).await.expect("delete"));
        assert!(repo.delete("u1", &txn.id).await.expect("delete"));
        assert!(repo
            .find_by_id("u1", &txn.id)
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn test_distinct_categories_and_delete_all() {
        let db = DbConnection::init_test().await.expect("test db");
        let repo = TransactionRepository::new(db);

        let date = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        for category in ["Food", "Travel", "Food"] {
            repo.insert(&sample_transaction("u1", TransactionType::Expense, 5.0, category, date))
                .await
                .expect("insert");
        }

        let categories = repo.distinct_categories("u1").await.expect("categories");
        assert_eq!(categories, vec!["Food".to_string(), "Travel".to_string()]);

        let removed = repo.delete_all("u1").await.expect("delete_all");
        assert_eq!(removed, 3);
        assert!(repo.list_all("u1").await.expect("list").is_empty());
    }
}
