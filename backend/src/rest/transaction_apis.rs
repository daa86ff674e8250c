use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use shared::{
    CreateTransactionRequest, FlowStat, MessageResponse, StatsResponse, TransactionDto,
    TransactionListResponse, TransactionSummary,
};
use tracing::info;

use crate::domain::models::{Transaction, TransactionType, TransactionValidationError};
use crate::domain::transaction_service::TransactionInput;
use crate::error::AppError;
use crate::rest::{AppState, AuthUser};
use crate::storage::transaction_repository::TransactionFilter;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/categories", get(categories))
        .route("/stats", get(stats))
        .route("/clear-all", delete(clear_all))
        .route("/:id", get(get_one).put(update).delete(remove))
}

fn transaction_dto(t: &Transaction) -> TransactionDto {
    TransactionDto {
        id: t.id.clone(),
        kind: t.kind.as_str().to_string(),
        amount: t.amount,
        category: t.category.clone(),
        description: t.description.clone(),
        date: t.date.to_rfc3339(),
        tags: t.tags.clone(),
    }
}

fn input_from(request: CreateTransactionRequest) -> TransactionInput {
    TransactionInput {
        kind: request.kind,
        amount: request.amount,
        category: request.category,
        description: request.description,
        date: request.date,
        tags: request.tags,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    /// RFC 3339
    start_date: Option<String>,
    /// RFC 3339
    end_date: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    category: Option<String>,
}

fn parse_bound(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, AppError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&chrono::Utc))
        .map_err(|_| {
            AppError::InvalidInput(
                TransactionValidationError::InvalidDate(raw.to_string()).to_string(),
            )
        })
}

impl ListQuery {
    fn into_filter(self) -> Result<TransactionFilter, AppError> {
        Ok(TransactionFilter {
            start: self.start_date.as_deref().map(parse_bound).transpose()?,
            end: self.end_date.as_deref().map(parse_bound).transpose()?,
            kind: self
                .kind
                .as_deref()
                .map(|k| {
                    TransactionType::parse(k).map_err(|e| AppError::InvalidInput(e.to_string()))
                })
                .transpose()?,
            category: self.category,
        })
    }
}

async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<TransactionListResponse>, AppError> {
    info!("GET /api/transactions - query: {:?}", query);
    let filter = query.into_filter()?;
    let (transactions, totals) = state.transaction_service.list(&user.id, filter).await?;
    Ok(Json(TransactionListResponse {
        transactions: transactions.iter().map(transaction_dto).collect(),
        summary: TransactionSummary {
            total_income: totals.income,
            total_expenses: totals.expenses,
            net_amount: totals.net(),
            count: totals.count,
        },
    }))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<Json<TransactionDto>, AppError> {
    info!("POST /api/transactions");
    let created = state
        .transaction_service
        .create(&user.id, input_from(request))
        .await?;
    Ok(Json(transaction_dto(&created)))
}

async fn get_one(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TransactionDto>, AppError> {
    info!("GET /api/transactions/{id}");
    let transaction = state.transaction_service.get(&user.id, &id).await?;
    Ok(Json(transaction_dto(&transaction)))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<Json<TransactionDto>, AppError> {
    info!("PUT /api/transactions/{id}");
    let updated = state
        .transaction_service
        .update(&user.id, &id, input_from(request))
        .await?;
    Ok(Json(transaction_dto(&updated)))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    info!("DELETE /api/transactions/{id}");
    state.transaction_service.delete(&user.id, &id).await?;
    Ok(Json(MessageResponse {
        message: "Transaction deleted.".to_string(),
    }))
}

async fn categories(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<String>>, AppError> {
    info!("GET /api/transactions/categories");
    Ok(Json(state.transaction_service.categories(&user.id).await?))
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    months: Option<u32>,
}

async fn stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let months = query.months.unwrap_or(6);
    info!("GET /api/transactions/stats - months: {months}");
    let stats = state.transaction_service.stats(&user.id, months).await?;
    Ok(Json(StatsResponse {
        monthly_stats: stats
            .monthly
            .into_iter()
            .map(|(month, (income, expenses))| (month, FlowStat { income, expenses }))
            .collect(),
        category_stats: stats
            .by_category
            .into_iter()
            .map(|(category, (income, expenses))| (category, FlowStat { income, expenses }))
            .collect(),
        period: format!("{} month(s)", stats.period_months),
    }))
}

async fn clear_all(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    info!("DELETE /api/transactions/clear-all");
    let removed = state.transaction_service.clear_all(&user.id).await?;
    Ok(Json(MessageResponse {
        message: format!("Deleted {removed} transactions."),
    }))
}
