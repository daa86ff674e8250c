//! Gamification domain model: profiles, achievements, challenges, streaks.
//!
//! Achievement and challenge instances are stamped from immutable templates
//! (see `domain::templates`); only the mutable unlock/progress state lives
//! on the instances.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::templates::{AchievementTemplate, ChallengeTemplate, ACHIEVEMENT_TEMPLATES};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AchievementCategory {
    Saving,
    Investing,
    Budgeting,
    Consistency,
}

impl AchievementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementCategory::Saving => "saving",
            AchievementCategory::Investing => "investing",
            AchievementCategory::Budgeting => "budgeting",
            AchievementCategory::Consistency => "consistency",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Difficulty {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Bronze => "bronze",
            Difficulty::Silver => "silver",
            Difficulty::Gold => "gold",
            Difficulty::Platinum => "platinum",
        }
    }
}

/// Closed set of achievement unlock conditions.
///
/// `UnderBudget` and `BudgetStreak` exist in the template catalog but have
/// no evaluator; they never unlock (matching the deployed catalog, where
/// those two conditions are defined but never checked).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum UnlockCondition {
    /// Lifetime transaction count reaches the threshold
    TransactionCount(u32),
    /// income - expense over the current calendar month reaches the amount
    MonthlySavings(f64),
    /// Current daily-transaction streak reaches the length
    DailyStreak(u32),
    /// Count of investment-keyword transactions reaches the threshold
    InvestmentCount(u32),
    /// Distinct (case-folded) investment categories reach the threshold
    InvestmentCategories(u32),
    UnderBudget(u32),
    BudgetStreak(u32),
}

/// A per-profile achievement: template copy plus unlock state.
///
/// Invariant: once `is_unlocked` is true it never reverts, and
/// `unlocked_at` is set exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
    pub template_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: AchievementCategory,
    pub difficulty: Difficulty,
    pub points: u64,
    pub condition: UnlockCondition,
    pub is_unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl Achievement {
    pub fn from_template(template: &AchievementTemplate) -> Self {
        Self {
            template_id: template.id.to_string(),
            name: template.name.to_string(),
            description: template.description.to_string(),
            icon: template.icon.to_string(),
            category: template.category,
            difficulty: template.difficulty,
            points: template.points,
            condition: template.condition,
            is_unlocked: false,
            unlocked_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChallengeType {
    Daily,
    Weekly,
    Monthly,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Daily => "daily",
            ChallengeType::Weekly => "weekly",
            ChallengeType::Monthly => "monthly",
        }
    }
}

/// A per-profile challenge instance: template copy plus progress state.
///
/// Invariant: moves from active to completed exactly once, at the moment
/// `current_progress` reaches `target_value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Challenge {
    /// Instance id, unique per profile (a template can be stamped repeatedly)
    pub id: String,
    pub template_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub kind: ChallengeType,
    pub category: String,
    pub target_value: f64,
    pub current_progress: f64,
    pub points: u64,
    pub deadline: DateTime<Utc>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Challenge {
    pub fn generate_id() -> String {
        format!("chl_{}", uuid::Uuid::new_v4())
    }

    pub fn from_template(
        template: &ChallengeTemplate,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::generate_id(),
            template_id: template.id.to_string(),
            name: template.name.to_string(),
            description: template.description.to_string(),
            icon: template.icon.to_string(),
            kind: template.kind,
            category: template.category.to_string(),
            target_value: template.target_value,
            current_progress: 0.0,
            points: template.points,
            deadline,
            is_completed: false,
            completed_at: None,
            created_at: now,
        }
    }
}

/// The three independent streak counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StreakKey {
    DailyTransaction,
    SavingGoal,
    BudgetStick,
}

impl StreakKey {
    pub const ALL: [StreakKey; 3] = [
        StreakKey::DailyTransaction,
        StreakKey::SavingGoal,
        StreakKey::BudgetStick,
    ];

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StreakKey::DailyTransaction => "daily_transaction",
            StreakKey::SavingGoal => "saving_goal",
            StreakKey::BudgetStick => "budget_stick",
        }
    }

    /// Parse either the storage form or the wire form ("dailyTransaction").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily_transaction" | "dailyTransaction" => Some(StreakKey::DailyTransaction),
            "saving_goal" | "savingGoal" => Some(StreakKey::SavingGoal),
            "budget_stick" | "budgetStick" => Some(StreakKey::BudgetStick),
            _ => None,
        }
    }
}

/// One streak counter: consecutive-day count plus the last counted day.
///
/// `last_date` is a UTC calendar day; all continuity checks compare UTC
/// dates, never local time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct StreakState {
    pub count: u32,
    pub last_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CurrentStreaks {
    pub daily_transaction: StreakState,
    pub saving_goal: StreakState,
    pub budget_stick: StreakState,
}

impl CurrentStreaks {
    pub fn get(&self, key: StreakKey) -> &StreakState {
        match key {
            StreakKey::DailyTransaction => &self.daily_transaction,
            StreakKey::SavingGoal => &self.saving_goal,
            StreakKey::BudgetStick => &self.budget_stick,
        }
    }

    pub fn get_mut(&mut self, key: StreakKey) -> &mut StreakState {
        match key {
            StreakKey::DailyTransaction => &mut self.daily_transaction,
            StreakKey::SavingGoal => &mut self.saving_goal,
            StreakKey::BudgetStick => &mut self.budget_stick,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct LongestStreaks {
    pub daily_transaction: u32,
    pub saving_goal: u32,
    pub budget_stick: u32,
}

impl LongestStreaks {
    pub fn get(&self, key: StreakKey) -> u32 {
        match key {
            StreakKey::DailyTransaction => self.daily_transaction,
            StreakKey::SavingGoal => self.saving_goal,
            StreakKey::BudgetStick => self.budget_stick,
        }
    }

    pub fn get_mut(&mut self, key: StreakKey) -> &mut u32 {
        match key {
            StreakKey::DailyTransaction => &mut self.daily_transaction,
            StreakKey::SavingGoal => &mut self.saving_goal,
            StreakKey::BudgetStick => &mut self.budget_stick,
        }
    }
}

/// Advisory usage counters; not enforced by any invariant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileStats {
    pub total_transactions: u64,
    pub total_saved: f64,
    pub budget_goals_achieved: u64,
    pub investments_made: u64,
    pub months_active: u64,
}

/// One gamification profile per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GamificationProfile {
    pub user_id: String,
    /// Derived from `total_points`, never independently settable
    pub level: u32,
    pub total_points: u64,
    pub current_streaks: CurrentStreaks,
    pub longest_streaks: LongestStreaks,
    /// Template order, seeded in full (locked) at profile creation
    pub achievements: Vec<Achievement>,
    pub active_challenges: Vec<Challenge>,
    pub completed_challenges: Vec<Challenge>,
    pub stats: ProfileStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GamificationProfile {
    /// Fresh profile with every achievement template seeded locked and no
    /// challenges yet; the caller runs the first challenge rotation.
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            level: 1,
            total_points: 0,
            current_streaks: CurrentStreaks::default(),
            longest_streaks: LongestStreaks::default(),
            achievements: ACHIEVEMENT_TEMPLATES
                .iter()
                .map(Achievement::from_template)
                .collect(),
            active_challenges: Vec::new(),
            completed_challenges: Vec::new(),
            stats: ProfileStats::default(),
            created_at: now,
            updated_at: now,
        }
    }
}
