//! Transaction CRUD plus the aggregates the advice composer and clients read.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Utc};
use tracing::{info, warn};

use crate::domain::gamification_service::GamificationService;
use crate::domain::models::{
    StreakKey, Transaction, TransactionType, TransactionValidationError,
};
use crate::error::AppError;
use crate::storage::transaction_repository::TransactionFilter;
use crate::storage::TransactionRepository;

const MAX_DESCRIPTION_LEN: usize = 500;

/// Validated input for a create or update.
#[derive(Debug, Clone)]
pub struct TransactionInput {
    pub kind: String,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub date: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Income/expense/net totals over a listed set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub income: f64,
    pub expenses: f64,
    pub count: usize,
}

impl Totals {
    pub fn net(&self) -> f64 {
        self.income - self.expenses
    }

    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut totals = Totals {
            count: transactions.len(),
            ..Default::default()
        };
        for t in transactions {
            match t.kind {
                TransactionType::Income => totals.income += t.amount,
                TransactionType::Expense => totals.expenses += t.amount,
            }
        }
        totals
    }
}

/// Per-month and per-category groupings over a trailing window.
#[derive(Debug, Clone, Default)]
pub struct SpendingStats {
    /// "YYYY-MM" → (income, expenses)
    pub monthly: BTreeMap<String, (f64, f64)>,
    /// category → (income, expenses)
    pub by_category: BTreeMap<String, (f64, f64)>,
    pub period_months: u32,
}

#[derive(Clone)]
pub struct TransactionService {
    transactions: TransactionRepository,
    gamification: GamificationService,
}

impl TransactionService {
    pub fn new(transactions: TransactionRepository, gamification: GamificationService) -> Self {
        Self {
            transactions,
            gamification,
        }
    }

    fn validate(user_id: &str, input: &TransactionInput) -> Result<Transaction, AppError> {
        let kind = TransactionType::parse(&input.kind)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        if input.amount <= 0.0 {
            return Err(AppError::InvalidInput(
                TransactionValidationError::NonPositiveAmount.to_string(),
            ));
        }
        let category = input.category.trim();
        if category.is_empty() {
            return Err(AppError::InvalidInput(
                TransactionValidationError::MissingCategory.to_string(),
            ));
        }
        let description = input.description.clone().unwrap_or_default();
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(AppError::InvalidInput(
                TransactionValidationError::DescriptionTooLong.to_string(),
            ));
        }
        let date = match &input.date {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| {
                    AppError::InvalidInput(
                        TransactionValidationError::InvalidDate(raw.clone()).to_string(),
                    )
                })?,
            None => Utc::now(),
        };

        Ok(Transaction {
            id: Transaction::generate_id(),
            user_id: user_id.to_string(),
            kind,
            amount: input.amount,
            category: category.to_string(),
            description,
            date,
            tags: input.tags.clone().unwrap_or_default(),
            created_at: Utc::now(),
        })
    }

    /// Validate and persist, then run the gamification side effects
    /// best-effort: a failure there is logged and never blocks or rolls
    /// back the committed write.
    pub async fn create(
        &self,
        user_id: &str,
        input: TransactionInput,
    ) -> Result<Transaction, AppError> {
        let transaction = Self::validate(user_id, &input)?;
        self.transactions.insert(&transaction).await?;
        info!(user_id = %user_id, id = %transaction.id, "transaction recorded");

        if let Err(e) = self
            .gamification
            .touch_streak(user_id, StreakKey::DailyTransaction)
            .await
        {
            warn!(user_id = %user_id, "streak touch failed after create: {e}");
        }
        if let Err(e) = self
            .gamification
            .record_transaction_stats(user_id, &transaction)
            .await
        {
            warn!(user_id = %user_id, "stats update failed after create: {e}");
        }
        if let Err(e) = self.gamification.evaluate_achievements(user_id).await {
            warn!(user_id = %user_id, "achievement evaluation failed after create: {e}");
        }

        Ok(transaction)
    }

    pub async fn list(
        &self,
        user_id: &str,
        filter: TransactionFilter,
    ) -> Result<(Vec<Transaction>, Totals), AppError> {
        let transactions = self.transactions.list(user_id, &filter).await?;
        let totals = Totals::from_transactions(&transactions);
        Ok((transactions, totals))
    }

    pub async fn get(&self, user_id: &str, transaction_id: &str) -> Result<Transaction, AppError> {
        self.transactions
            .find_by_id(user_id, transaction_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found.".to_string()))
    }

    pub async fn update(
        &self,
        user_id: &str,
        transaction_id: &str,
        input: TransactionInput,
    ) -> Result<Transaction, AppError> {
        let existing = self.get(user_id, transaction_id).await?;
        let mut updated = Self::validate(user_id, &input)?;
        updated.id = existing.id;
        updated.created_at = existing.created_at;
        if !self.transactions.update(&updated).await? {
            return Err(AppError::NotFound("Transaction not found.".to_string()));
        }
        Ok(updated)
    }

    pub async fn delete(&self, user_id: &str, transaction_id: &str) -> Result<(), AppError> {
        if !self.transactions.delete(user_id, transaction_id).await? {
            return Err(AppError::NotFound("Transaction not found.".to_string()));
        }
        info!(user_id = %user_id, id = %transaction_id, "transaction deleted");
        Ok(())
    }

    pub async fn clear_all(&self, user_id: &str) -> Result<u64, AppError> {
        let removed = self.transactions.delete_all(user_id).await?;
        info!(user_id = %user_id, removed, "cleared all transactions");
        Ok(removed)
    }

    pub async fn categories(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        self.transactions.distinct_categories(user_id).await
    }

    /// Monthly income/expense pairs and per-category expense totals over
    /// the trailing `months` calendar months (including the current one).
    pub async fn stats(&self, user_id: &str, months: u32) -> Result<SpendingStats, AppError> {
        let months = months.max(1);
        let since = Utc::now() - Duration::days(31 * months as i64);
        let transactions = self.transactions.list_since(user_id, since).await?;

        let mut stats = SpendingStats {
            period_months: months,
            ..Default::default()
        };
        for t in &transactions {
            let bucket = format!("{:04}-{:02}", t.date.year(), t.date.month());
            let monthly = stats.monthly.entry(bucket).or_default();
            let category = stats.by_category.entry(t.category.clone()).or_default();
            match t.kind {
                TransactionType::Income => {
                    monthly.0 += t.amount;
                    category.0 += t.amount;
                }
                TransactionType::Expense => {
                    monthly.1 += t.amount;
                    category.1 += t.amount;
                }
            }
        }
        Ok(stats)
    }
}
