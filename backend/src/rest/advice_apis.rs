use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use shared::{
    AdviceMetadata, AdviceResponse, CategoryAmount, ChatRequest, ChatResponse,
    FinancialSummaryDto, QuickTip, QuickTipsResponse,
};
use tracing::info;

use crate::domain::advice_service::{FinancialSummary, QUICK_TIPS};
use crate::error::AppError;
use crate::rest::{AppState, AuthUser};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(advice))
        .route("/quick-tips", get(quick_tips))
        .route("/chat", post(chat))
}

fn category_amounts(pairs: &[(String, f64)]) -> Vec<CategoryAmount> {
    pairs
        .iter()
        .map(|(category, amount)| CategoryAmount {
            category: category.clone(),
            amount: *amount,
        })
        .collect()
}

fn summary_dto(s: &FinancialSummary) -> FinancialSummaryDto {
    FinancialSummaryDto {
        total_income: s.total_income,
        total_expenses: s.total_expenses,
        net_savings: s.net_savings,
        savings_rate: s.savings_rate,
        expense_ratio: s.expense_ratio,
        income_growth: s.income_growth,
        expense_growth: s.expense_growth,
        top_expense_categories: category_amounts(&s.top_expense_categories),
        top_income_categories: category_amounts(&s.top_income_categories),
        avg_monthly_income: s.avg_monthly_income,
        avg_monthly_expenses: s.avg_monthly_expenses,
        emergency_fund_recommended: s.emergency_fund_recommended,
        emergency_fund_status: s.emergency_fund_status.clone(),
        emergency_fund_gap: s.emergency_fund_gap,
        investment_capacity: s.investment_capacity,
    }
}

async fn advice(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<AdviceResponse>, AppError> {
    info!("POST /api/ai-advice");
    let outcome = state.advice_service.advise(&user.id).await?;
    Ok(Json(AdviceResponse {
        advice: outcome.advice,
        financial_summary: summary_dto(&outcome.summary),
        metadata: AdviceMetadata {
            analysis_date: Utc::now().to_rfc3339(),
            data_points: outcome.data_points,
            period_analyzed: format!("{} month(s)", outcome.months_covered),
        },
    }))
}

async fn quick_tips(AuthUser(_user): AuthUser) -> Json<QuickTipsResponse> {
    info!("GET /api/ai-advice/quick-tips");
    Json(QuickTipsResponse {
        tips: QUICK_TIPS
            .iter()
            .map(|(category, tip, priority)| QuickTip {
                category: category.to_string(),
                tip: tip.to_string(),
                priority: priority.to_string(),
            })
            .collect(),
    })
}

async fn chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    info!("POST /api/ai-advice/chat");
    let response = state.advice_service.chat(&user.id, &request.message).await?;
    Ok(Json(ChatResponse {
        response,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction_service::TransactionInput;
    use crate::rest::test_support::{register_test_user, test_state};

    #[tokio::test]
    async fn test_advice_requires_history() {
        let (state, _) = test_state().await;
        let (user_id, _) = register_test_user(&state, "a@example.com").await;
        let user = state.auth_service.get_user(&user_id).await.expect("user");

        let err = advice(State(state.clone()), AuthUser(user.clone()))
            .await
            .expect_err("no data");
        assert!(matches!(err, AppError::InvalidInput(_)));

        state
            .transaction_service
            .create(
                &user_id,
                TransactionInput {
                    kind: "income".to_string(),
                    amount: 1000.0,
                    category: "Salary".to_string(),
                    description: None,
                    date: None,
                    tags: None,
                },
            )
            .await
            .expect("create");

        let response = advice(State(state), AuthUser(user)).await.expect("advice");
        assert_eq!(response.advice, "canned advice");
        assert_eq!(response.metadata.data_points, 1);
        assert_eq!(response.financial_summary.total_income, 1000.0);
    }

    #[tokio::test]
    async fn test_quick_tips_are_static() {
        let (state, _) = test_state().await;
        let (user_id, _) = register_test_user(&state, "a@example.com").await;
        let user = state.auth_service.get_user(&user_id).await.expect("user");

        let tips = quick_tips(AuthUser(user)).await;
        assert_eq!(tips.tips.len(), 7);
        assert!(tips.tips.iter().any(|t| t.category == "Tax Planning"));
    }
}
