use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Optional confirmation; when present it must match `password`
    pub confirm_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Step-one login response: credentials accepted, OTP issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub requires_otp: bool,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendOtpRequest {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    /// RFC 3339
    pub created_at: Option<String>,
    /// RFC 3339
    pub last_login: Option<String>,
}

/// Returned on successful registration or OTP verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    /// "income" or "expense"
    #[serde(rename = "type")]
    pub kind: String,
    /// Must be greater than zero
    pub amount: f64,
    pub category: String,
    /// Max 500 characters
    pub description: Option<String>,
    /// RFC 3339; defaults to the current time when absent
    pub date: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: f64,
    pub category: String,
    pub description: String,
    /// RFC 3339
    pub date: String,
    pub tags: Vec<String>,
}

/// Income/expense totals computed over a returned transaction set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_amount: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionDto>,
    pub summary: TransactionSummary,
}

/// Income/expense totals for one month or one category bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStat {
    pub income: f64,
    pub expenses: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Keyed by "YYYY-MM"
    pub monthly_stats: BTreeMap<String, FlowStat>,
    pub category_stats: BTreeMap<String, FlowStat>,
    pub period: String,
}

// ---------------------------------------------------------------------------
// Gamification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakStateDto {
    pub count: u32,
    /// UTC calendar day, "YYYY-MM-DD"
    pub last_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStreaksDto {
    pub daily_transaction: StreakStateDto,
    pub saving_goal: StreakStateDto,
    pub budget_stick: StreakStateDto,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongestStreaksDto {
    pub daily_transaction: u32,
    pub saving_goal: u32,
    pub budget_stick: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: String,
    pub difficulty: String,
    pub points: u64,
    pub is_unlocked: bool,
    /// RFC 3339, set exactly once at unlock time
    pub unlocked_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDto {
    /// Instance id, unique per profile
    pub id: String,
    pub template_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub target_value: f64,
    pub current_progress: f64,
    pub points: u64,
    /// RFC 3339
    pub deadline: String,
    pub is_completed: bool,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStatsDto {
    pub total_transactions: u64,
    pub total_saved: f64,
    pub budget_goals_achieved: u64,
    pub investments_made: u64,
    pub months_active: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub level: u32,
    pub total_points: u64,
    pub points_for_next_level: u64,
    pub current_streaks: CurrentStreaksDto,
    pub longest_streaks: LongestStreaksDto,
    pub achievements: Vec<AchievementDto>,
    pub active_challenges: Vec<ChallengeDto>,
    pub stats: ProfileStatsDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub profile: ProfileDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAchievementsResponse {
    pub newly_unlocked: Vec<AchievementDto>,
    pub total_points: u64,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChallengeRequest {
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChallengeResponse {
    pub challenge: ChallengeDto,
    pub total_points: u64,
    pub level: u32,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateChallengesResponse {
    pub active_challenges: Vec<ChallengeDto>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStreakRequest {
    /// "dailyTransaction", "savingGoal" or "budgetStick"
    pub streak_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakResponse {
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub level: u32,
    pub total_points: u64,
    pub achievement_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

// ---------------------------------------------------------------------------
// AI advice
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAmount {
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummaryDto {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_savings: f64,
    /// Percentage of income saved
    pub savings_rate: f64,
    /// Percentage of income spent
    pub expense_ratio: f64,
    pub income_growth: f64,
    pub expense_growth: f64,
    pub top_expense_categories: Vec<CategoryAmount>,
    pub top_income_categories: Vec<CategoryAmount>,
    pub avg_monthly_income: f64,
    pub avg_monthly_expenses: f64,
    pub emergency_fund_recommended: f64,
    pub emergency_fund_status: String,
    pub emergency_fund_gap: f64,
    pub investment_capacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceMetadata {
    /// RFC 3339
    pub analysis_date: String,
    pub data_points: usize,
    pub period_analyzed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceResponse {
    pub advice: String,
    pub financial_summary: FinancialSummaryDto,
    pub metadata: AdviceMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickTip {
    pub category: String,
    pub tip: String,
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickTipsResponse {
    pub tips: Vec<QuickTip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    /// RFC 3339
    pub timestamp: String,
}
