use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use shared::{
    AchievementDto, ChallengeDto, CheckAchievementsResponse, CurrentStreaksDto,
    GenerateChallengesResponse, LeaderboardEntry, LeaderboardResponse, LongestStreaksDto,
    ProfileDto, ProfileResponse, ProfileStatsDto, StreakResponse, StreakStateDto,
    UpdateChallengeRequest, UpdateChallengeResponse, UpdateStreakRequest,
};
use tracing::info;

use crate::domain::levels;
use crate::domain::models::{
    Achievement, Challenge, GamificationProfile, StreakKey, StreakState,
};
use crate::error::AppError;
use crate::rest::{AppState, AuthUser};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile))
        .route("/check-achievements", post(check_achievements))
        .route("/challenges/:id", put(update_challenge))
        .route("/generate-challenges", post(generate_challenges))
        .route("/update-streak", post(update_streak))
        .route("/leaderboard", get(leaderboard))
}

fn achievement_dto(a: &Achievement) -> AchievementDto {
    AchievementDto {
        id: a.template_id.clone(),
        name: a.name.clone(),
        description: a.description.clone(),
        icon: a.icon.clone(),
        category: a.category.as_str().to_string(),
        difficulty: a.difficulty.as_str().to_string(),
        points: a.points,
        is_unlocked: a.is_unlocked,
        unlocked_at: a.unlocked_at.map(|d| d.to_rfc3339()),
    }
}

fn challenge_dto(c: &Challenge) -> ChallengeDto {
    ChallengeDto {
        id: c.id.clone(),
        template_id: c.template_id.clone(),
        name: c.name.clone(),
        description: c.description.clone(),
        icon: c.icon.clone(),
        kind: c.kind.as_str().to_string(),
        category: c.category.clone(),
        target_value: c.target_value,
        current_progress: c.current_progress,
        points: c.points,
        deadline: c.deadline.to_rfc3339(),
        is_completed: c.is_completed,
        completed_at: c.completed_at.map(|d| d.to_rfc3339()),
    }
}

fn streak_state_dto(s: &StreakState) -> StreakStateDto {
    StreakStateDto {
        count: s.count,
        last_date: s.last_date.map(|d| d.to_string()),
    }
}

fn profile_dto(p: &GamificationProfile) -> ProfileDto {
    ProfileDto {
        level: p.level,
        total_points: p.total_points,
        points_for_next_level: levels::points_for_next_level(p.total_points),
        current_streaks: CurrentStreaksDto {
            daily_transaction: streak_state_dto(&p.current_streaks.daily_transaction),
            saving_goal: streak_state_dto(&p.current_streaks.saving_goal),
            budget_stick: streak_state_dto(&p.current_streaks.budget_stick),
        },
        longest_streaks: LongestStreaksDto {
            daily_transaction: p.longest_streaks.daily_transaction,
            saving_goal: p.longest_streaks.saving_goal,
            budget_stick: p.longest_streaks.budget_stick,
        },
        achievements: p.achievements.iter().map(achievement_dto).collect(),
        active_challenges: p.active_challenges.iter().map(challenge_dto).collect(),
        stats: ProfileStatsDto {
            total_transactions: p.stats.total_transactions,
            total_saved: p.stats.total_saved,
            budget_goals_achieved: p.stats.budget_goals_achieved,
            investments_made: p.stats.investments_made,
            months_active: p.stats.months_active,
        },
    }
}

async fn profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    info!("GET /api/gamification/profile");
    let profile = state
        .gamification_service
        .get_or_create_profile(&user.id)
        .await?;
    Ok(Json(ProfileResponse {
        profile: profile_dto(&profile),
    }))
}

async fn check_achievements(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<CheckAchievementsResponse>, AppError> {
    info!("POST /api/gamification/check-achievements");
    let (newly_unlocked, profile) = state
        .gamification_service
        .evaluate_achievements(&user.id)
        .await?;
    Ok(Json(CheckAchievementsResponse {
        newly_unlocked: newly_unlocked.iter().map(achievement_dto).collect(),
        total_points: profile.total_points,
        level: profile.level,
    }))
}

async fn update_challenge(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(challenge_id): Path<String>,
    Json(request): Json<UpdateChallengeRequest>,
) -> Result<Json<UpdateChallengeResponse>, AppError> {
    info!("PUT /api/gamification/challenges/{challenge_id}");
    let update = state
        .gamification_service
        .update_challenge_progress(&user.id, &challenge_id, request.progress)
        .await?;
    Ok(Json(UpdateChallengeResponse {
        challenge: challenge_dto(&update.challenge),
        total_points: update.total_points,
        level: update.level,
        completed: update.completed,
    }))
}

async fn generate_challenges(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<GenerateChallengesResponse>, AppError> {
    info!("POST /api/gamification/generate-challenges");
    let active = state.gamification_service.rotate_challenges(&user.id).await?;
    Ok(Json(GenerateChallengesResponse {
        active_challenges: active.iter().map(challenge_dto).collect(),
        message: "Challenges refreshed.".to_string(),
    }))
}

async fn update_streak(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateStreakRequest>,
) -> Result<Json<StreakResponse>, AppError> {
    info!("POST /api/gamification/update-streak - {}", request.streak_type);
    let key = StreakKey::parse(&request.streak_type).ok_or_else(|| {
        AppError::InvalidInput(format!("Unknown streak type: {}", request.streak_type))
    })?;
    let (current_streak, longest_streak) =
        state.gamification_service.touch_streak(&user.id, key).await?;
    Ok(Json(StreakResponse {
        current_streak,
        longest_streak,
    }))
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<u32>,
}

async fn leaderboard(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let limit = query.limit.unwrap_or(10).min(100);
    info!("GET /api/gamification/leaderboard - limit: {limit}");
    let rows = state.gamification_service.leaderboard(limit).await?;
    Ok(Json(LeaderboardResponse {
        leaderboard: rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| LeaderboardEntry {
                rank: i + 1,
                user_id: row.user_id,
                level: row.level,
                total_points: row.total_points,
                achievement_count: row.achievement_count as u64,
            })
            .collect(),
    }))
}
