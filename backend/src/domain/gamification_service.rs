//! The gamification engine: achievement evaluation, challenge rotation,
//! streak tracking, and the points/level ledger.
//!
//! The rules themselves are pure functions over a profile snapshot; the
//! service wraps them with storage and serializes every mutation per user
//! through a keyed async mutex, so concurrent requests for one user cannot
//! interleave their load-modify-store sequences.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use rand::seq::SliceRandom;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use crate::domain::levels;
use crate::domain::models::{
    Achievement, Challenge, ChallengeType, GamificationProfile, StreakKey, Transaction,
    TransactionType, UnlockCondition,
};
use crate::domain::templates::{ChallengeTemplate, CHALLENGE_TEMPLATES, INVESTMENT_KEYWORDS};
use crate::error::AppError;
use crate::storage::gamification_repository::LeaderboardRow;
use crate::storage::{GamificationRepository, TransactionRepository};

/// Minimum live challenges per type after a rotation.
const DAILY_MINIMUM: usize = 2;
const WEEKLY_MINIMUM: usize = 1;
const MONTHLY_MINIMUM: usize = 1;

/// True if the category names an investment (case-insensitive substring
/// match against the keyword set).
pub fn is_investment_category(category: &str) -> bool {
    let folded = category.to_lowercase();
    INVESTMENT_KEYWORDS.iter().any(|k| folded.contains(k))
}

/// income - expense over the calendar month containing `now` (UTC).
fn monthly_savings(transactions: &[Transaction], now: DateTime<Utc>) -> f64 {
    transactions
        .iter()
        .filter(|t| t.date.year() == now.year() && t.date.month() == now.month())
        .map(|t| match t.kind {
            TransactionType::Income => t.amount,
            TransactionType::Expense => -t.amount,
        })
        .sum()
}

fn condition_satisfied(
    condition: UnlockCondition,
    profile: &GamificationProfile,
    transactions: &[Transaction],
    now: DateTime<Utc>,
) -> bool {
    match condition {
        UnlockCondition::TransactionCount(n) => transactions.len() as u32 >= n,
        UnlockCondition::MonthlySavings(amount) => monthly_savings(transactions, now) >= amount,
        UnlockCondition::DailyStreak(n) => profile.current_streaks.daily_transaction.count >= n,
        UnlockCondition::InvestmentCount(n) => {
            transactions
                .iter()
                .filter(|t| is_investment_category(&t.category))
                .count() as u32
                >= n
        }
        UnlockCondition::InvestmentCategories(n) => {
            let mut categories: Vec<String> = transactions
                .iter()
                .filter(|t| is_investment_category(&t.category))
                .map(|t| t.category.to_lowercase())
                .collect();
            categories.sort();
            categories.dedup();
            categories.len() as u32 >= n
        }
        // Budget conditions have no evaluator; they never unlock.
        UnlockCondition::UnderBudget(_) | UnlockCondition::BudgetStreak(_) => false,
    }
}

/// Unlock every locked achievement whose condition now holds, award its
/// points, and recompute the level. Returns the newly unlocked instances in
/// template order. Already-unlocked achievements are skipped, which makes
/// repeated calls with the same history award nothing twice.
pub fn evaluate(
    profile: &mut GamificationProfile,
    transactions: &[Transaction],
    now: DateTime<Utc>,
) -> Vec<Achievement> {
    let mut newly_unlocked = Vec::new();
    for i in 0..profile.achievements.len() {
        if profile.achievements[i].is_unlocked {
            continue;
        }
        let condition = profile.achievements[i].condition;
        if !condition_satisfied(condition, profile, transactions, now) {
            continue;
        }
        let achievement = &mut profile.achievements[i];
        achievement.is_unlocked = true;
        achievement.unlocked_at = Some(now);
        let points = achievement.points;
        profile.total_points += points;
        newly_unlocked.push(profile.achievements[i].clone());
    }
    profile.level = levels::level_for_points(profile.total_points);
    profile.updated_at = now;
    newly_unlocked
}

/// End of the UTC calendar day containing `date`.
fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_milli_opt(23, 59, 59, 999)
        .expect("constant wall-clock time is valid")
        .and_utc()
}

/// Deadline for a fresh challenge of the given type, anchored at `now`:
/// end of today, end of the week (weeks end on Sunday; starting on a Sunday
/// rolls to the next one), or the last day of the current month.
pub fn deadline_for(kind: ChallengeType, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    match kind {
        ChallengeType::Daily => end_of_day(today),
        ChallengeType::Weekly => {
            let days_ahead = 7 - today.weekday().num_days_from_sunday() as i64;
            end_of_day(today + Duration::days(days_ahead))
        }
        ChallengeType::Monthly => {
            let first_of_next = if today.month() == 12 {
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
            }
            .expect("first of month is valid");
            end_of_day(first_of_next - Duration::days(1))
        }
    }
}

/// What a rotation did, so the caller can persist the delta.
#[derive(Debug, Default)]
pub struct RotationOutcome {
    pub expired: Vec<Challenge>,
    pub added: Vec<Challenge>,
}

fn templates_of(kind: ChallengeType) -> Vec<&'static ChallengeTemplate> {
    CHALLENGE_TEMPLATES.iter().filter(|t| t.kind == kind).collect()
}

/// Expire-then-refill. Challenges past their deadline are dropped from the
/// active list without moving to completed; each type is then topped up to
/// its minimum with uniformly random template picks (repeats allowed).
pub fn rotate(profile: &mut GamificationProfile, now: DateTime<Utc>) -> RotationOutcome {
    let mut outcome = RotationOutcome::default();

    let (live, expired): (Vec<Challenge>, Vec<Challenge>) = profile
        .active_challenges
        .drain(..)
        .partition(|c| c.deadline >= now);
    profile.active_challenges = live;
    outcome.expired = expired;

    let mut rng = rand::thread_rng();
    for (kind, minimum) in [
        (ChallengeType::Daily, DAILY_MINIMUM),
        (ChallengeType::Weekly, WEEKLY_MINIMUM),
        (ChallengeType::Monthly, MONTHLY_MINIMUM),
    ] {
        let candidates = templates_of(kind);
        if candidates.is_empty() {
            continue;
        }
        let mut count = profile
            .active_challenges
            .iter()
            .filter(|c| c.kind == kind)
            .count();
        while count < minimum {
            let template = candidates
                .choose(&mut rng)
                .copied()
                .expect("candidates is non-empty");
            let challenge = Challenge::from_template(template, deadline_for(kind, now), now);
            profile.active_challenges.push(challenge.clone());
            outcome.added.push(challenge);
            count += 1;
        }
    }

    profile.updated_at = now;
    outcome
}

/// Advance one streak counter for `today`: same day is a no-op, the day
/// after the last counted day increments, anything else resets to 1.
/// Returns (current, longest).
pub fn touch(profile: &mut GamificationProfile, key: StreakKey, today: NaiveDate) -> (u32, u32) {
    let state = profile.current_streaks.get_mut(key);
    match state.last_date {
        Some(last) if last == today => {}
        Some(last) if last + Duration::days(1) == today => {
            state.count += 1;
            state.last_date = Some(today);
        }
        _ => {
            state.count = 1;
            state.last_date = Some(today);
        }
    }
    let count = state.count;

    let longest = profile.longest_streaks.get_mut(key);
    if count > *longest {
        *longest = count;
    }
    (count, *longest)
}

/// Result of a challenge progress update.
#[derive(Debug)]
pub struct ChallengeUpdate {
    pub challenge: Challenge,
    pub total_points: u64,
    pub level: u32,
    pub completed: bool,
}

/// Per-user async mutexes, created on first use.
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .inner
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[derive(Clone)]
pub struct GamificationService {
    profiles: GamificationRepository,
    transactions: TransactionRepository,
    locks: UserLocks,
}

impl GamificationService {
    pub fn new(profiles: GamificationRepository, transactions: TransactionRepository) -> Self {
        Self {
            profiles,
            transactions,
            locks: UserLocks::new(),
        }
    }

    /// Load the profile, creating it on first access with every achievement
    /// seeded locked and an initial challenge rotation. Callers must hold
    /// the user's lock.
    async fn load_or_seed(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<GamificationProfile, AppError> {
        if let Some(profile) = self.profiles.load_profile(user_id).await? {
            return Ok(profile);
        }
        let mut profile = GamificationProfile::new(user_id, now);
        rotate(&mut profile, now);
        self.profiles.create_profile(&profile).await?;
        info!(user_id = %user_id, "created gamification profile");
        Ok(profile)
    }

    pub async fn get_or_create_profile(
        &self,
        user_id: &str,
    ) -> Result<GamificationProfile, AppError> {
        let _guard = self.locks.acquire(user_id).await;
        self.load_or_seed(user_id, Utc::now()).await
    }

    /// Re-check every locked achievement against the user's full history.
    pub async fn evaluate_achievements(
        &self,
        user_id: &str,
    ) -> Result<(Vec<Achievement>, GamificationProfile), AppError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = Utc::now();
        let mut profile = self.load_or_seed(user_id, now).await?;
        let history = self.transactions.list_all(user_id).await?;

        let newly_unlocked = evaluate(&mut profile, &history, now);
        if !newly_unlocked.is_empty() {
            for achievement in &newly_unlocked {
                self.profiles
                    .unlock_achievement(user_id, &achievement.template_id, now)
                    .await?;
            }
            self.profiles
                .update_points(user_id, profile.total_points, profile.level, now)
                .await?;
            info!(
                user_id = %user_id,
                count = newly_unlocked.len(),
                "unlocked achievements"
            );
        }
        Ok((newly_unlocked, profile))
    }

    /// Clamp progress into `[0, target]` and complete the challenge exactly
    /// once when the target is reached.
    pub async fn update_challenge_progress(
        &self,
        user_id: &str,
        challenge_id: &str,
        progress: f64,
    ) -> Result<ChallengeUpdate, AppError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = Utc::now();
        let mut profile = self.load_or_seed(user_id, now).await?;

        let position = profile
            .active_challenges
            .iter()
            .position(|c| c.id == challenge_id)
            .ok_or_else(|| AppError::NotFound("Challenge not found.".to_string()))?;

        let target = profile.active_challenges[position].target_value;
        let clamped = progress.clamp(0.0, target);

        if clamped >= target {
            let mut challenge = profile.active_challenges.remove(position);
            challenge.current_progress = clamped;
            challenge.is_completed = true;
            challenge.completed_at = Some(now);
            profile.total_points += challenge.points;
            profile.level = levels::level_for_points(profile.total_points);
            profile.completed_challenges.push(challenge.clone());

            self.profiles
                .complete_challenge(&challenge.id, clamped, now)
                .await?;
            self.profiles
                .update_points(user_id, profile.total_points, profile.level, now)
                .await?;
            info!(user_id = %user_id, challenge = %challenge.template_id, "challenge completed");

            return Ok(ChallengeUpdate {
                challenge,
                total_points: profile.total_points,
                level: profile.level,
                completed: true,
            });
        }

        let challenge = &mut profile.active_challenges[position];
        challenge.current_progress = clamped;
        self.profiles
            .update_challenge_progress(&challenge.id, clamped)
            .await?;
        Ok(ChallengeUpdate {
            challenge: challenge.clone(),
            total_points: profile.total_points,
            level: profile.level,
            completed: false,
        })
    }

    pub async fn touch_streak(
        &self,
        user_id: &str,
        key: StreakKey,
    ) -> Result<(u32, u32), AppError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = Utc::now();
        let mut profile = self.load_or_seed(user_id, now).await?;

        let (current, longest) = touch(&mut profile, key, now.date_naive());
        self.profiles
            .update_streak(user_id, key, *profile.current_streaks.get(key), longest)
            .await?;
        Ok((current, longest))
    }

    /// Drop expired challenges and top every type back up to its minimum.
    pub async fn rotate_challenges(&self, user_id: &str) -> Result<Vec<Challenge>, AppError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = Utc::now();
        let mut profile = self.load_or_seed(user_id, now).await?;

        let outcome = rotate(&mut profile, now);
        for challenge in &outcome.expired {
            self.profiles.delete_challenge(&challenge.id).await?;
        }
        for challenge in &outcome.added {
            self.profiles.insert_challenge(user_id, challenge).await?;
        }
        if !outcome.expired.is_empty() || !outcome.added.is_empty() {
            info!(
                user_id = %user_id,
                expired = outcome.expired.len(),
                added = outcome.added.len(),
                "rotated challenges"
            );
        }
        Ok(profile.active_challenges)
    }

    /// Bump the advisory usage counters after a committed transaction write.
    pub async fn record_transaction_stats(
        &self,
        user_id: &str,
        transaction: &Transaction,
    ) -> Result<(), AppError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = Utc::now();
        let mut profile = self.load_or_seed(user_id, now).await?;

        profile.stats.total_transactions += 1;
        if is_investment_category(&transaction.category) {
            profile.stats.investments_made += 1;
        }
        if transaction.kind == TransactionType::Income {
            profile.stats.total_saved += transaction.amount;
        } else {
            profile.stats.total_saved -= transaction.amount;
        }
        self.profiles.update_stats(user_id, &profile.stats).await
    }

    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, AppError> {
        self.profiles.leaderboard(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DbConnection;
    use chrono::{TimeZone, Timelike};

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

    fn profile_at(now: DateTime<Utc>) -> GamificationProfile {
        GamificationProfile::new("u1", now)
    }

    #[test]
    fn test_investment_keyword_matching() {
        assert!(is_investment_category("Mutual Fund"));
        assert!(is_investment_category("SIP - monthly"));
        assert!(is_investment_category("stocks"));
        assert!(!is_investment_category("Groceries"));
    }

    #[test]
    fn test_evaluate_unlocks_once() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let mut profile = profile_at(now);
        let history: Vec<Transaction> = (0..10)
            .map(|_| txn(TransactionType::Expense, 50.0, "Food", now))
            .collect();

        let unlocked = evaluate(&mut profile, &history, now);
        let ids: Vec<&str> = unlocked.iter().map(|a| a.template_id.as_str()).collect();
        assert_eq!(ids, vec!["first_transaction", "transaction_milestone_10"]);
        assert_eq!(profile.total_points, 150);
        assert_eq!(profile.level, 2);

        // Growing the history never re-unlocks
        let bigger: Vec<Transaction> = (0..50)
            .map(|_| txn(TransactionType::Expense, 50.0, "Food", now))
            .collect();
        let again = evaluate(&mut profile, &bigger, now);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].template_id, "transaction_milestone_50");
        assert_eq!(profile.total_points, 400);
    }

    #[test]
    fn test_monthly_savings_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let last_month = Utc.with_ymd_and_hms(2024, 2, 15, 10, 0, 0).unwrap();
        let mut profile = profile_at(now);

        // 5000 saved, but in February: no saving achievement in March
        let history = vec![txn(TransactionType::Income, 5000.0, "Salary", last_month)];
        let unlocked = evaluate(&mut profile, &history, now);
        assert!(unlocked.iter().all(|a| a.template_id != "first_save"));

        let history = vec![
            txn(TransactionType::Income, 2000.0, "Salary", now),
            txn(TransactionType::Expense, 500.0, "Food", now),
        ];
        let unlocked = evaluate(&mut profile, &history, now);
        assert!(unlocked.iter().any(|a| a.template_id == "first_save"));
        assert!(unlocked.iter().all(|a| a.template_id != "save_5k"));
    }

    #[test]
    fn test_investment_conditions() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let mut profile = profile_at(now);

        let history = vec![txn(TransactionType::Expense, 1000.0, "Mutual Fund", now)];
        let unlocked = evaluate(&mut profile, &history, now);
        assert!(unlocked.iter().any(|a| a.template_id == "first_investment"));
        assert!(unlocked
            .iter()
            .all(|a| a.template_id != "diversified_investor"));

        let history: Vec<Transaction> =
            ["Mutual Fund", "stocks", "SIP plan", "FD renewal", "gold investment"]
                .iter()
                .map(|c| txn(TransactionType::Expense, 1000.0, c, now))
                .collect();
        let unlocked = evaluate(&mut profile, &history, now);
        assert!(unlocked
            .iter()
            .any(|a| a.template_id == "diversified_investor"));
    }

    #[test]
    fn test_daily_streak_condition_reads_profile() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let mut profile = profile_at(now);
        profile.current_streaks.daily_transaction.count = 7;

        let unlocked = evaluate(&mut profile, &[], now);
        let ids: Vec<&str> = unlocked.iter().map(|a| a.template_id.as_str()).collect();
        assert_eq!(ids, vec!["streak_7"]);
    }

    #[test]
    fn test_budget_conditions_never_unlock() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let mut profile = profile_at(now);
        profile.current_streaks.daily_transaction.count = 1000;
        let history: Vec<Transaction> = (0..500)
            .map(|_| txn(TransactionType::Income, 100_000.0, "Salary", now))
            .collect();

        evaluate(&mut profile, &history, now);
        for locked in profile.achievements.iter().filter(|a| !a.is_unlocked) {
            assert!(matches!(
                locked.condition,
                UnlockCondition::UnderBudget(_) | UnlockCondition::BudgetStreak(_)
            ));
        }
    }

    #[test]
    fn test_rotation_fills_minimums() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let mut profile = profile_at(now);

        let outcome = rotate(&mut profile, now);
        assert!(outcome.expired.is_empty());
        let count_of = |kind| {
            profile
                .active_challenges
                .iter()
                .filter(|c| c.kind == kind)
                .count()
        };
        assert_eq!(count_of(ChallengeType::Daily), 2);
        assert_eq!(count_of(ChallengeType::Weekly), 1);
        assert_eq!(count_of(ChallengeType::Monthly), 1);
        assert!(profile.active_challenges.iter().all(|c| c.deadline > now));

        // A second rotation with nothing expired adds nothing
        let outcome = rotate(&mut profile, now);
        assert!(outcome.added.is_empty());
        assert_eq!(profile.active_challenges.len(), 4);
    }

    #[test]
    fn test_rotation_discards_expired_silently() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let mut profile = profile_at(now);
        rotate(&mut profile, now);

        let later = now + Duration::days(2);
        let outcome = rotate(&mut profile, later);
        // Both dailies expired; the weekly and monthly survived
        assert_eq!(outcome.expired.len(), 2);
        assert_eq!(outcome.added.len(), 2);
        assert!(profile.completed_challenges.is_empty());
        assert!(profile
            .active_challenges
            .iter()
            .all(|c| c.deadline >= later));
    }

    #[test]
    fn test_deadlines() {
        // Wednesday mid-March
        let now = Utc.with_ymd_and_hms(2024, 3, 13, 10, 30, 0).unwrap();

        let daily = deadline_for(ChallengeType::Daily, now);
        assert_eq!(daily.date_naive(), now.date_naive());
        assert_eq!((daily.hour(), daily.minute(), daily.second()), (23, 59, 59));

        // Weeks end on Sunday
        let weekly = deadline_for(ChallengeType::Weekly, now);
        assert_eq!(
            weekly.date_naive(),
            NaiveDate::from_ymd_opt(2024, 3, 17).unwrap()
        );

        // From a Sunday, the week deadline is the next Sunday
        let sunday = Utc.with_ymd_and_hms(2024, 3, 17, 10, 0, 0).unwrap();
        assert_eq!(
            deadline_for(ChallengeType::Weekly, sunday).date_naive(),
            NaiveDate::from_ymd_opt(2024, 3, 24).unwrap()
        );

        // Leap-year February ends on the 29th
        let feb = Utc.with_ymd_and_hms(2024, 2, 10, 10, 0, 0).unwrap();
        assert_eq!(
            deadline_for(ChallengeType::Monthly, feb).date_naive(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        // December rolls the year
        let dec = Utc.with_ymd_and_hms(2024, 12, 5, 10, 0, 0).unwrap();
        assert_eq!(
            deadline_for(ChallengeType::Monthly, dec).date_naive(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_touch_rules() {
        let day1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut profile = profile_at(Utc::now());

        assert_eq!(touch(&mut profile, StreakKey::DailyTransaction, day1), (1, 1));
        // Same day twice is a no-op
        assert_eq!(touch(&mut profile, StreakKey::DailyTransaction, day1), (1, 1));
        // Consecutive days increment
        let day2 = day1 + Duration::days(1);
        assert_eq!(touch(&mut profile, StreakKey::DailyTransaction, day2), (2, 2));
        // A gap resets to 1, longest is retained
        let day5 = day2 + Duration::days(3);
        assert_eq!(touch(&mut profile, StreakKey::DailyTransaction, day5), (1, 2));

        // Counters are independent
        assert_eq!(touch(&mut profile, StreakKey::SavingGoal, day5), (1, 1));
        assert_eq!(profile.current_streaks.daily_transaction.count, 1);

        assert!(
            profile.longest_streaks.daily_transaction
                >= profile.current_streaks.daily_transaction.count
        );
    }

    async fn service() -> GamificationService {
        let db = DbConnection::init_test().await.expect("test db");
        GamificationService::new(
            GamificationRepository::new(db.clone()),
            TransactionRepository::new(db),
        )
    }

    #[tokio::test]
    async fn test_new_user_profile_is_seeded() {
        let service = service().await;
        let profile = service.get_or_create_profile("u1").await.expect("profile");

        assert_eq!(profile.level, 1);
        assert_eq!(profile.total_points, 0);
        assert!(profile.achievements.iter().all(|a| !a.is_unlocked));
        let dailies = profile
            .active_challenges
            .iter()
            .filter(|c| c.kind == ChallengeType::Daily)
            .count();
        assert!(dailies >= 2);
        assert!(profile.active_challenges.iter().all(|c| c.deadline > Utc::now()));

        // Second call loads the same profile instead of reseeding
        let again = service.get_or_create_profile("u1").await.expect("profile");
        assert_eq!(
            again.active_challenges.len(),
            profile.active_challenges.len()
        );
    }

    #[tokio::test]
    async fn test_evaluate_persists_unlocks() {
        let service = service().await;
        let now = Utc::now();
        for _ in 0..10 {
            service
                .transactions
                .insert(&txn(TransactionType::Expense, 50.0, "Food", now))
                .await
                .expect("insert");
        }

        let (unlocked, profile) = service.evaluate_achievements("u1").await.expect("evaluate");
        assert_eq!(unlocked.len(), 2);
        assert_eq!(profile.total_points, 150);
        assert_eq!(profile.level, 2);

        // Re-running awards nothing and the stored profile agrees
        let (again, profile) = service.evaluate_achievements("u1").await.expect("evaluate");
        assert!(again.is_empty());
        assert_eq!(profile.total_points, 150);
    }

    #[tokio::test]
    async fn test_challenge_progress_clamps_and_completes_once() {
        let service = service().await;
        let profile = service.get_or_create_profile("u1").await.expect("profile");
        let challenge = profile.active_challenges[0].clone();

        let update = service
            .update_challenge_progress("u1", &challenge.id, challenge.target_value + 50.0)
            .await
            .expect("update");
        assert!(update.completed);
        assert_eq!(update.challenge.current_progress, challenge.target_value);
        assert_eq!(update.total_points, challenge.points);

        // Completed challenges are no longer active
        let err = service
            .update_challenge_progress("u1", &challenge.id, 1.0)
            .await
            .expect_err("gone");
        assert!(matches!(err, AppError::NotFound(_)));

        let err = service
            .update_challenge_progress("u1", "chl_missing", 1.0)
            .await
            .expect_err("unknown id");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_touch_streak_is_idempotent_within_a_day() {
        let service = service().await;
        let (current, longest) = service
            .touch_streak("u1", StreakKey::DailyTransaction)
            .await
            .expect("touch");
        assert_eq!((current, longest), (1, 1));
        let (current, longest) = service
            .touch_streak("u1", StreakKey::DailyTransaction)
            .await
            .expect("touch");
        assert_eq!((current, longest), (1, 1));
    }

    #[tokio::test]
    async fn test_user_lock_serializes() {
        let locks = UserLocks::new();
        let guard = locks.acquire("u1").await;

        let contended = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("u1").await })
        };
        // Other users are unaffected
        let _other = locks.acquire("u2").await;

        tokio::task::yield_now().await;
        assert!(!contended.is_finished());
        drop(guard);
        contended.await.expect("task");
    }
}
