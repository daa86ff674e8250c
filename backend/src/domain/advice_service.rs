//! AI financial advice: summarize the user's history into hard numbers,
//! render them into an advisor prompt, and forward to a text-generation
//! collaborator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::domain::models::{Transaction, TransactionType};
use crate::error::AppError;
use crate::storage::TransactionRepository;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Share of net savings considered investable.
const INVESTMENT_SHARE: f64 = 0.7;
/// Months of average expenses the emergency fund should cover.
const EMERGENCY_FUND_MONTHS: f64 = 6.0;

/// The slow, fallible text-generation collaborator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AppError>;
}

/// Gemini `generateContent` REST client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        if self.api_key.is_empty() {
            return Err(AppError::Upstream(
                "Gemini API key not configured.".to_string(),
            ));
        }

        let url = format!(
            "{GEMINI_ENDPOINT}/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "text generation API returned {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await?;
        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                AppError::Upstream("text generation API returned no candidates".to_string())
            })
    }
}

/// Derived view of a transaction history, all amounts in rupees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialSummary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_savings: f64,
    /// Percent of income kept
    pub savings_rate: f64,
    /// Percent of income spent
    pub expense_ratio: f64,
    /// First-to-last month change, percent
    pub income_growth: f64,
    pub expense_growth: f64,
    /// Largest first, at most five
    pub top_expense_categories: Vec<(String, f64)>,
    /// Largest first, at most three
    pub top_income_categories: Vec<(String, f64)>,
    pub avg_monthly_income: f64,
    pub avg_monthly_expenses: f64,
    pub emergency_fund_recommended: f64,
    pub emergency_fund_status: String,
    pub emergency_fund_gap: f64,
    pub investment_capacity: f64,
}

fn top_categories(
    transactions: &[Transaction],
    kind: TransactionType,
    limit: usize,
) -> Vec<(String, f64)> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for t in transactions.iter().filter(|t| t.kind == kind) {
        *totals.entry(t.category.clone()).or_default() += t.amount;
    }
    let mut sorted: Vec<(String, f64)> = totals.into_iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(limit);
    sorted
}

/// Whole months spanned by the history (30-day buckets), at least 1.
/// Expects newest-first ordering, as the repository returns.
pub fn months_covered(transactions: &[Transaction]) -> u32 {
    let (Some(newest), Some(oldest)) = (transactions.first(), transactions.last()) else {
        return 1;
    };
    let days = (newest.date - oldest.date).num_days().max(0) as f64;
    ((days / 30.0).ceil() as u32).max(1)
}

/// Reduce a newest-first history to the advisor's summary numbers.
pub fn summarize(transactions: &[Transaction]) -> FinancialSummary {
    let total_income: f64 = transactions
        .iter()
        .filter(|t| t.kind == TransactionType::Income)
        .map(|t| t.amount)
        .sum();
    let total_expenses: f64 = transactions
        .iter()
        .filter(|t| t.kind == TransactionType::Expense)
        .map(|t| t.amount)
        .sum();
    let net_savings = total_income - total_expenses;
    let savings_rate = if total_income > 0.0 {
        net_savings / total_income * 100.0
    } else {
        0.0
    };
    let expense_ratio = if total_income > 0.0 {
        total_expenses / total_income * 100.0
    } else {
        0.0
    };

    // First vs last calendar month with data
    let mut monthly: HashMap<String, (f64, f64)> = HashMap::new();
    for t in transactions {
        let bucket = t.date.format("%Y-%m").to_string();
        let entry = monthly.entry(bucket).or_default();
        match t.kind {
            TransactionType::Income => entry.0 += t.amount,
            TransactionType::Expense => entry.1 += t.amount,
        }
    }
    let mut months: Vec<&String> = monthly.keys().collect();
    months.sort();
    let (mut income_growth, mut expense_growth) = (0.0, 0.0);
    if months.len() >= 2 {
        let first = monthly[months[0]];
        let last = monthly[months[months.len() - 1]];
        if first.0 > 0.0 {
            income_growth = (last.0 - first.0) / first.0 * 100.0;
        }
        if first.1 > 0.0 {
            expense_growth = (last.1 - first.1) / first.1 * 100.0;
        }
    }

    let months = months_covered(transactions) as f64;
    let avg_monthly_income = total_income / months;
    let avg_monthly_expenses = total_expenses / months;

    let emergency_fund_recommended = avg_monthly_expenses * EMERGENCY_FUND_MONTHS;
    let emergency_fund_status = if net_savings >= emergency_fund_recommended {
        "Adequate".to_string()
    } else {
        "Insufficient".to_string()
    };
    let emergency_fund_gap = (emergency_fund_recommended - net_savings).max(0.0);
    let investment_capacity = (net_savings * INVESTMENT_SHARE).max(0.0);

    FinancialSummary {
        total_income,
        total_expenses,
        net_savings,
        savings_rate,
        expense_ratio,
        income_growth,
        expense_growth,
        top_expense_categories: top_categories(transactions, TransactionType::Expense, 5),
        top_income_categories: top_categories(transactions, TransactionType::Income, 3),
        avg_monthly_income,
        avg_monthly_expenses,
        emergency_fund_recommended,
        emergency_fund_status,
        emergency_fund_gap,
        investment_capacity,
    }
}

fn format_category_list(categories: &[(String, f64)], total: f64, with_share: bool) -> String {
    if categories.is_empty() {
        return "None recorded".to_string();
    }
    categories
        .iter()
        .map(|(category, amount)| {
            if with_share && total > 0.0 {
                format!("{category}: ₹{amount:.2} ({:.1}%)", amount / total * 100.0)
            } else {
                format!("{category}: ₹{amount:.2}")
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn advice_prompt(summary: &FinancialSummary, data_points: usize, months: u32) -> String {
    format!(
        "You are a personal finance advisor. Analyze this EXACT financial data and give \
SPECIFIC advice based ONLY on these numbers. Do NOT give generic advice.\n\n\
USER'S ACTUAL FINANCIAL DATA ({data_points} transactions over {months} month(s)):\n\
INCOME:\n\
- Total Income: ₹{ti:.2}\n\
- Monthly Average: ₹{ami:.2}\n\
- Sources: {sources}\n\n\
EXPENSES:\n\
- Total Expenses: ₹{te:.2}\n\
- Monthly Average: ₹{ame:.2}\n\
- Top Spending: {spending}\n\n\
SAVINGS:\n\
- Net Savings: ₹{ns:.2}\n\
- Savings Rate: {sr:.1}%\n\
- Emergency Fund Status: {efs} (Gap: ₹{efg:.2})\n\
- Available for Investment: ₹{ic:.2}\n\n\
INSTRUCTIONS: You MUST reference the EXACT numbers above. Cover: a financial health \
score justified by the {sr:.1}% savings rate, budget optimization naming the top \
spending category to cut, a monthly savings target from the ₹{ami:.2} average income, \
an investment plan for the ₹{ic:.2} available (specific SIP allocations), and three \
action items for this month with exact ₹ amounts.",
        ti = summary.total_income,
        ami = summary.avg_monthly_income,
        sources = format_category_list(&summary.top_income_categories, 0.0, false),
        te = summary.total_expenses,
        ame = summary.avg_monthly_expenses,
        spending =
            format_category_list(&summary.top_expense_categories, summary.total_expenses, true),
        ns = summary.net_savings,
        sr = summary.savings_rate,
        efs = summary.emergency_fund_status,
        efg = summary.emergency_fund_gap,
        ic = summary.investment_capacity,
    )
}

fn chat_prompt(summary: Option<&FinancialSummary>, data_points: usize, message: &str) -> String {
    let context = match summary {
        Some(s) => format!(
            "USER'S ACTUAL FINANCIAL DATA:\n\
Total Transactions: {data_points}\n\
Total Income: ₹{:.2}\n\
Total Expenses: ₹{:.2}\n\
Net Savings: ₹{:.2}\n\
Savings Rate: {:.1}%\n\
Income Sources: {}\n\
Expense Categories: {}\n",
            s.total_income,
            s.total_expenses,
            s.net_savings,
            s.savings_rate,
            format_category_list(&s.top_income_categories, 0.0, false),
            format_category_list(&s.top_expense_categories, s.total_expenses, false),
        ),
        None => "The user has not recorded any transactions yet.\n".to_string(),
    };

    format!(
        "You are a helpful Indian personal finance assistant. Answer the user's question \
using their ACTUAL financial data below.\n\n{context}\n\
USER'S QUESTION: {message}\n\n\
RULES: quote their exact ₹ amounts, categories, and percentages where relevant; give \
specific advice, not generic tips; for investment questions calculate concrete SIP \
amounts; use Indian financial instruments (PPF, ELSS, SIP, Section 80C) where they \
fit; keep the answer concise. If the question is not about finance, politely redirect \
to financial topics.\n\nAnswer:"
    )
}

/// The static quick-tips list: (category, tip, priority).
pub const QUICK_TIPS: &[(&str, &str, &str)] = &[
    (
        "Savings",
        "Follow the 50/30/20 rule: 50% needs, 30% wants, 20% savings and investments",
        "high",
    ),
    (
        "Investment",
        "Start SIP in diversified mutual funds and ELSS for tax benefits",
        "medium",
    ),
    (
        "Emergency Fund",
        "Build 6-12 months of expenses in high-yield savings or liquid funds",
        "high",
    ),
    (
        "Debt",
        "Pay off high-interest credit card debt before investing",
        "high",
    ),
    (
        "Tax Planning",
        "Maximize Section 80C (₹1.5L) with PPF, ELSS, and NSC investments",
        "medium",
    ),
    (
        "Insurance",
        "Get adequate term life insurance and health insurance for 80D benefits",
        "high",
    ),
    (
        "Gold Investment",
        "Consider digital gold or gold ETFs for portfolio diversification",
        "low",
    ),
];

/// A full advice run: generated text plus the numbers it was grounded on.
#[derive(Debug)]
pub struct AdviceOutcome {
    pub advice: String,
    pub summary: FinancialSummary,
    pub data_points: usize,
    pub months_covered: u32,
}

#[derive(Clone)]
pub struct AdviceService {
    transactions: TransactionRepository,
    generator: Arc<dyn TextGenerator>,
}

impl AdviceService {
    pub fn new(transactions: TransactionRepository, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            transactions,
            generator,
        }
    }

    /// Summarize the full history and ask the generator for tailored advice.
    pub async fn advise(&self, user_id: &str) -> Result<AdviceOutcome, AppError> {
        let history = self.transactions.list_all(user_id).await?;
        if history.is_empty() {
            return Err(AppError::InvalidInput(
                "No transaction data found. Please add some transactions first.".to_string(),
            ));
        }

        let summary = summarize(&history);
        let months = months_covered(&history);
        let prompt = advice_prompt(&summary, history.len(), months);
        let advice = self.generator.generate(&prompt).await?;
        info!(user_id = %user_id, data_points = history.len(), "advice generated");

        Ok(AdviceOutcome {
            advice,
            summary,
            data_points: history.len(),
            months_covered: months,
        })
    }

    /// Free-form question answered with the user's numbers as context.
    /// Works with an empty history; the prompt just says so.
    pub async fn chat(&self, user_id: &str, message: &str) -> Result<String, AppError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::InvalidInput("Message is required".to_string()));
        }

        let history = self.transactions.list_all(user_id).await?;
        let summary = if history.is_empty() {
            None
        } else {
            Some(summarize(&history))
        };
        let prompt = chat_prompt(summary.as_ref(), history.len(), message);
        self.generator.generate(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DbConnection;
    use chrono::{DateTime, TimeZone, Utc};

    fn txn(kind: TransactionType, amount: f64, category: &str, date: DateTime<Utc>) -> Transaction {
        Transaction {
            id: Transaction::generate_id(),
            user_id: "u1".to_string(),
            kind,
            amount,
            category: category.to_string(),
            description: String::new(),
            date,
            tags: vec![],
            created_at: date,
        }
    }

    #[test]
    fn test_summary_numbers() {
        let jan = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let mar = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        // Newest-first, as the repository lists
        let history = vec![
            txn(TransactionType::Income, 20_000.0, "Salary", mar),
            txn(TransactionType::Expense, 6_000.0, "Rent", mar),
            txn(TransactionType::Income, 10_000.0, "Salary", jan),
            txn(TransactionType::Expense, 3_000.0, "Rent", jan),
            txn(TransactionType::Expense, 1_000.0, "Food", jan),
        ];

        let summary = summarize(&history);
        assert_eq!(summary.total_income, 30_000.0);
        assert_eq!(summary.total_expenses, 10_000.0);
        assert_eq!(summary.net_savings, 20_000.0);
        assert!((summary.savings_rate - 66.666).abs() < 0.01);
        assert!((summary.expense_ratio - 33.333).abs() < 0.01);
        // Jan→Mar: income 10k→20k (+100%), expenses 4k→6k (+50%)
        assert!((summary.income_growth - 100.0).abs() < 0.01);
        assert!((summary.expense_growth - 50.0).abs() < 0.01);
        assert_eq!(summary.top_expense_categories[0].0, "Rent");
        assert_eq!(summary.top_expense_categories[0].1, 9_000.0);
        assert_eq!(summary.top_income_categories, vec![("Salary".to_string(), 30_000.0)]);

        // 60 days → 2 months
        assert_eq!(months_covered(&history), 2);
        assert_eq!(summary.avg_monthly_income, 15_000.0);
        assert_eq!(summary.avg_monthly_expenses, 5_000.0);

        assert_eq!(summary.emergency_fund_recommended, 30_000.0);
        assert_eq!(summary.emergency_fund_status, "Insufficient");
        assert_eq!(summary.emergency_fund_gap, 10_000.0);
        assert_eq!(summary.investment_capacity, 14_000.0);
    }

    #[test]
    fn test_summary_with_no_income() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let history = vec![txn(TransactionType::Expense, 500.0, "Food", now)];
        let summary = summarize(&history);
        assert_eq!(summary.savings_rate, 0.0);
        assert_eq!(summary.expense_ratio, 0.0);
        assert_eq!(summary.investment_capacity, 0.0);
        assert_eq!(summary.emergency_fund_status, "Insufficient");
    }

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, AppError> {
            Ok(prompt.to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, AppError> {
            Err(AppError::Upstream("generator offline".to_string()))
        }
    }

    async fn service(generator: Arc<dyn TextGenerator>) -> AdviceService {
        let db = DbConnection::init_test().await.expect("test db");
        AdviceService::new(TransactionRepository::new(db), generator)
    }

    #[tokio::test]
    async fn test_advise_requires_transactions() {
        let service = service(Arc::new(EchoGenerator)).await;
        assert!(matches!(
            service.advise("u1").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_advise_grounds_prompt_in_numbers() {
        let service = service(Arc::new(EchoGenerator)).await;
        let now = Utc::now();
        service
            .transactions
            .insert(&txn(TransactionType::Income, 9_000.0, "Salary", now))
            .await
            .expect("insert");
        service
            .transactions
            .insert(&txn(TransactionType::Expense, 4_000.0, "Rent", now))
            .await
            .expect("insert");

        let outcome = service.advise("u1").await.expect("advise");
        assert_eq!(outcome.data_points, 2);
        assert_eq!(outcome.months_covered, 1);
        assert!(outcome.advice.contains("₹9000.00"));
        assert!(outcome.advice.contains("Rent: ₹4000.00 (100.0%)"));
        assert_eq!(outcome.summary.net_savings, 5_000.0);
    }

    #[tokio::test]
    async fn test_generator_failure_surfaces_as_upstream() {
        let service = service(Arc::new(FailingGenerator)).await;
        service
            .transactions
            .insert(&txn(TransactionType::Income, 100.0, "Salary", Utc::now()))
            .await
            .expect("insert");
        assert!(matches!(
            service.advise("u1").await,
            Err(AppError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_chat_validates_message_and_works_without_history() {
        let service = service(Arc::new(EchoGenerator)).await;
        assert!(matches!(
            service.chat("u1", "   ").await,
            Err(AppError::InvalidInput(_))
        ));

        let answer = service.chat("u1", "How should I start saving?").await.expect("chat");
        assert!(answer.contains("has not recorded any transactions"));
        assert!(answer.contains("How should I start saving?"));
    }
}
