use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use crate::domain::models::{
    Achievement, Challenge, GamificationProfile, ProfileStats, StreakKey, StreakState,
};
use crate::domain::templates::CHALLENGE_TEMPLATES;
use crate::error::AppError;
use crate::storage::user_repository::parse_rfc3339;
use crate::storage::DbConnection;

/// One leaderboard row, already ranked.
#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub user_id: String,
    pub name: String,
    pub level: u32,
    pub total_points: u64,
    pub achievement_count: u32,
}

#[derive(Clone)]
pub struct GamificationRepository {
    db: DbConnection,
}

impl GamificationRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Assemble a full profile from its four tables, or None if the user has
    /// no profile row yet. Rows referencing template ids no longer in the
    /// catalog are skipped.
    pub async fn load_profile(
        &self,
        user_id: &str,
    ) -> Result<Option<GamificationProfile>, AppError> {
        let Some(row) = sqlx::query("SELECT * FROM gamification_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
        else {
            return Ok(None);
        };

        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");
        let mut profile = GamificationProfile::new(user_id, parse_rfc3339(&created_at)?);
        profile.level = row.get::<i64, _>("level") as u32;
        profile.total_points = row.get::<i64, _>("total_points") as u64;
        profile.stats = ProfileStats {
            total_transactions: row.get::<i64, _>("total_transactions") as u64,
            total_saved: row.get("total_saved"),
            budget_goals_achieved: row.get::<i64, _>("budget_goals_achieved") as u64,
            investments_made: row.get::<i64, _>("investments_made") as u64,
            months_active: row.get::<i64, _>("months_active") as u64,
        };
        profile.updated_at = parse_rfc3339(&updated_at)?;

        let streak_rows = sqlx::query("SELECT * FROM streaks WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        for row in streak_rows {
            let key: String = row.get("streak_key");
            let Some(key) = StreakKey::parse(&key) else {
                continue;
            };
            let last_date: Option<String> = row.get("last_date");
            *profile.current_streaks.get_mut(key) = StreakState {
                count: row.get::<i64, _>("count") as u32,
                last_date: last_date.as_deref().map(parse_naive_date).transpose()?,
            };
            *profile.longest_streaks.get_mut(key) = row.get::<i64, _>("longest") as u32;
        }

        // GamificationProfile::new already seeded every template locked;
        // overlay the stored unlock state.
        let achievement_rows = sqlx::query("SELECT * FROM achievements WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        for row in achievement_rows {
            let template_id: String = row.get("template_id");
            let Some(achievement) = profile
                .achievements
                .iter_mut()
                .find(|a| a.template_id == template_id)
            else {
                continue;
            };
            achievement.is_unlocked = row.get("is_unlocked");
            let unlocked_at: Option<String> = row.get("unlocked_at");
            achievement.unlocked_at = unlocked_at.as_deref().map(parse_rfc3339).transpose()?;
        }

        let challenge_rows =
            sqlx::query("SELECT * FROM challenges WHERE user_id = ? ORDER BY created_at")
                .bind(user_id)
                .fetch_all(self.db.pool())
                .await?;
        for row in challenge_rows {
            let Some(challenge) = row_to_challenge(row)? else {
                continue;
            };
            if challenge.is_completed {
                profile.completed_challenges.push(challenge);
            } else {
                profile.active_challenges.push(challenge);
            }
        }

        Ok(Some(profile))
    }

    /// Persist a freshly built profile: the profile row, one streak row per
    /// key, one locked achievement row per template, and any challenges.
    pub async fn create_profile(&self, profile: &GamificationProfile) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO gamification_profiles
             (user_id, level, total_points, total_transactions, total_saved,
              budget_goals_achieved, investments_made, months_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&profile.user_id)
        .bind(profile.level as i64)
        .bind(profile.total_points as i64)
        .bind(profile.stats.total_transactions as i64)
        .bind(profile.stats.total_saved)
        .bind(profile.stats.budget_goals_achieved as i64)
        .bind(profile.stats.investments_made as i64)
        .bind(profile.stats.months_active as i64)
        .bind(profile.created_at.to_rfc3339())
        .bind(profile.updated_at.to_rfc3339())
        .execute(self.db.pool())
        .await?;

        for key in StreakKey::ALL {
            let state = profile.current_streaks.get(key);
            sqlx::query(
                "INSERT INTO streaks (user_id, streak_key, count, last_date, longest)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&profile.user_id)
            .bind(key.as_str())
            .bind(state.count as i64)
            .bind(state.last_date.map(|d| d.to_string()))
            .bind(profile.longest_streaks.get(key) as i64)
            .execute(self.db.pool())
            .await?;
        }

        for achievement in &profile.achievements {
            sqlx::query(
                "INSERT INTO achievements (user_id, template_id, is_unlocked, unlocked_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&profile.user_id)
            .bind(&achievement.template_id)
            .bind(achievement.is_unlocked)
            .bind(achievement.unlocked_at.map(|d| d.to_rfc3339()))
            .execute(self.db.pool())
            .await?;
        }

        for challenge in profile
            .active_challenges
            .iter()
            .chain(&profile.completed_challenges)
        {
            self.insert_challenge(&profile.user_id, challenge).await?;
        }

        Ok(())
    }

    pub async fn update_points(
        &self,
        user_id: &str,
        total_points: u64,
        level: u32,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE gamification_profiles SET total_points = ?, level = ?, updated_at = ?
             WHERE user_id = ?",
        )
        .bind(total_points as i64)
        .bind(level as i64)
        .bind(now.to_rfc3339())
        .bind(user_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn update_stats(&self, user_id: &str, stats: &ProfileStats) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE gamification_profiles
             SET total_transactions = ?, total_saved = ?, budget_goals_achieved = ?,
                 investments_made = ?, months_active = ?
             WHERE user_id = ?",
        )
        .bind(stats.total_transactions as i64)
        .bind(stats.total_saved)
        .bind(stats.budget_goals_achieved as i64)
        .bind(stats.investments_made as i64)
        .bind(stats.months_active as i64)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn unlock_achievement(
        &self,
        user_id: &str,
        template_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE achievements SET is_unlocked = 1, unlocked_at = ?
             WHERE user_id = ? AND template_id = ? AND is_unlocked = 0",
        )
        .bind(at.to_rfc3339())
        .bind(user_id)
        .bind(template_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn update_streak(
        &self,
        user_id: &str,
        key: StreakKey,
        state: StreakState,
        longest: u32,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE streaks SET count = ?, last_date = ?, longest = ?
             WHERE user_id = ? AND streak_key = ?",
        )
        .bind(state.count as i64)
        .bind(state.last_date.map(|d| d.to_string()))
        .bind(longest as i64)
        .bind(user_id)
        .bind(key.as_str())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn insert_challenge(
        &self,
        user_id: &str,
        challenge: &Challenge,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO challenges
             (id, user_id, template_id, status, current_progress, deadline, completed_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&challenge.id)
        .bind(user_id)
        .bind(&challenge.template_id)
        .bind(if challenge.is_completed { "completed" } else { "active" })
        .bind(challenge.current_progress)
        .bind(challenge.deadline.to_rfc3339())
        .bind(challenge.completed_at.map(|d| d.to_rfc3339()))
        .bind(challenge.created_at.to_rfc3339())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn update_challenge_progress(
        &self,
        challenge_id: &str,
        progress: f64,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE challenges SET current_progress = ? WHERE id = ?")
            .bind(progress)
            .bind(challenge_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    pub async fn complete_challenge(
        &self,
        challenge_id: &str,
        progress: f64,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE challenges SET status = 'completed', current_progress = ?, completed_at = ?
             WHERE id = ?",
        )
        .bind(progress)
        .bind(at.to_rfc3339())
        .bind(challenge_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_challenge(&self, challenge_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM challenges WHERE id = ?")
            .bind(challenge_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Top profiles by points, ties broken by user id for a stable order.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, AppError> {
        let rows = sqlx::query(
            "SELECT p.user_id, u.name, p.level, p.total_points,
                    (SELECT COUNT(*) FROM achievements a
                     WHERE a.user_id = p.user_id AND a.is_unlocked = 1) AS achievement_count
             FROM gamification_profiles p
             JOIN users u ON u.id = p.user_id
             ORDER BY p.total_points DESC, p.user_id
             LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LeaderboardRow {
                user_id: row.get("user_id"),
                name: row.get("name"),
                level: row.get::<i64, _>("level") as u32,
                total_points: row.get::<i64, _>("total_points") as u64,
                achievement_count: row.get::<i64, _>("achievement_count") as u32,
            })
            .collect())
    }
}

/// Rebuild a challenge instance by joining the stored row back onto its
/// template. Returns None if the template left the catalog.
fn row_to_challenge(row: sqlx::sqlite::SqliteRow) -> Result<Option<Challenge>, AppError> {
    let template_id: String = row.get("template_id");
    let Some(template) = CHALLENGE_TEMPLATES.iter().find(|t| t.id == template_id) else {
        return Ok(None);
    };

    let status: String = row.get("status");
    let deadline: String = row.get("deadline");
    let created_at: String = row.get("created_at");
    let completed_at: Option<String> = row.get("completed_at");

    let mut challenge =
        Challenge::from_template(template, parse_rfc3339(&deadline)?, parse_rfc3339(&created_at)?);
    challenge.id = row.get("id");
    challenge.current_progress = row.get("current_progress");
    challenge.is_completed = status == "completed";
    challenge.completed_at = completed_at.as_deref().map(parse_rfc3339).transpose()?;
    Ok(Some(challenge))
}

fn parse_naive_date(s: &str) -> Result<NaiveDate, AppError> {
    s.parse::<NaiveDate>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("malformed date {s:?} in storage: {e}")))
}
