//! Deploy-time achievement and challenge catalogs.
//!
//! Templates are immutable; per-profile instances are stamped from them at
//! profile creation (achievements) or rotation time (challenges).

use crate::domain::models::{AchievementCategory, ChallengeType, Difficulty, UnlockCondition};

#[derive(Debug, Clone, Copy)]
pub struct AchievementTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: AchievementCategory,
    pub difficulty: Difficulty,
    pub points: u64,
    pub condition: UnlockCondition,
}

#[derive(Debug, Clone, Copy)]
pub struct ChallengeTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub kind: ChallengeType,
    pub category: &'static str,
    pub target_value: f64,
    pub points: u64,
}

pub const ACHIEVEMENT_TEMPLATES: &[AchievementTemplate] = &[
    // Transaction achievements
    AchievementTemplate {
        id: "first_transaction",
        name: "Getting Started",
        description: "Record your first transaction",
        icon: "🎯",
        category: AchievementCategory::Consistency,
        difficulty: Difficulty::Bronze,
        points: 50,
        condition: UnlockCondition::TransactionCount(1),
    },
    AchievementTemplate {
        id: "transaction_milestone_10",
        name: "Tracking Pro",
        description: "Record 10 transactions",
        icon: "📊",
        category: AchievementCategory::Consistency,
        difficulty: Difficulty::Bronze,
        points: 100,
        condition: UnlockCondition::TransactionCount(10),
    },
    AchievementTemplate {
        id: "transaction_milestone_50",
        name: "Data Master",
        description: "Record 50 transactions",
        icon: "📈",
        category: AchievementCategory::Consistency,
        difficulty: Difficulty::Silver,
        points: 250,
        condition: UnlockCondition::TransactionCount(50),
    },
    AchievementTemplate {
        id: "transaction_milestone_100",
        name: "Financial Chronicler",
        description: "Record 100 transactions",
        icon: "🏆",
        category: AchievementCategory::Consistency,
        difficulty: Difficulty::Gold,
        points: 500,
        condition: UnlockCondition::TransactionCount(100),
    },
    // Saving achievements
    AchievementTemplate {
        id: "first_save",
        name: "Smart Saver",
        description: "Save ₹1000 or more in a month",
        icon: "💰",
        category: AchievementCategory::Saving,
        difficulty: Difficulty::Bronze,
        points: 150,
        condition: UnlockCondition::MonthlySavings(1000.0),
    },
    AchievementTemplate {
        id: "save_5k",
        name: "Savings Champion",
        description: "Save ₹5000 or more in a month",
        icon: "💎",
        category: AchievementCategory::Saving,
        difficulty: Difficulty::Silver,
        points: 300,
        condition: UnlockCondition::MonthlySavings(5000.0),
    },
    AchievementTemplate {
        id: "save_10k",
        name: "Wealth Builder",
        description: "Save ₹10000 or more in a month",
        icon: "👑",
        category: AchievementCategory::Saving,
        difficulty: Difficulty::Gold,
        points: 600,
        condition: UnlockCondition::MonthlySavings(10000.0),
    },
    // Streak achievements
    AchievementTemplate {
        id: "streak_7",
        name: "Week Warrior",
        description: "Record transactions for 7 consecutive days",
        icon: "🔥",
        category: AchievementCategory::Consistency,
        difficulty: Difficulty::Bronze,
        points: 200,
        condition: UnlockCondition::DailyStreak(7),
    },
    AchievementTemplate {
        id: "streak_30",
        name: "Monthly Master",
        description: "Record transactions for 30 consecutive days",
        icon: "⚡",
        category: AchievementCategory::Consistency,
        difficulty: Difficulty::Silver,
        points: 400,
        condition: UnlockCondition::DailyStreak(30),
    },
    AchievementTemplate {
        id: "streak_100",
        name: "Consistency King",
        description: "Record transactions for 100 consecutive days",
        icon: "👑",
        category: AchievementCategory::Consistency,
        difficulty: Difficulty::Platinum,
        points: 1000,
        condition: UnlockCondition::DailyStreak(100),
    },
    // Budget achievements (conditions defined but never evaluated)
    AchievementTemplate {
        id: "under_budget",
        name: "Budget Boss",
        description: "Stay under your monthly budget",
        icon: "🎯",
        category: AchievementCategory::Budgeting,
        difficulty: Difficulty::Bronze,
        points: 200,
        condition: UnlockCondition::UnderBudget(1),
    },
    AchievementTemplate {
        id: "budget_streak_3",
        name: "Budget Master",
        description: "Stay under budget for 3 consecutive months",
        icon: "🏅",
        category: AchievementCategory::Budgeting,
        difficulty: Difficulty::Silver,
        points: 500,
        condition: UnlockCondition::BudgetStreak(3),
    },
    // Investment achievements
    AchievementTemplate {
        id: "first_investment",
        name: "Future Planner",
        description: "Make your first investment transaction",
        icon: "📊",
        category: AchievementCategory::Investing,
        difficulty: Difficulty::Bronze,
        points: 300,
        condition: UnlockCondition::InvestmentCount(1),
    },
    AchievementTemplate {
        id: "diversified_investor",
        name: "Diversified Investor",
        description: "Invest in 5 different categories",
        icon: "🌟",
        category: AchievementCategory::Investing,
        difficulty: Difficulty::Gold,
        points: 800,
        condition: UnlockCondition::InvestmentCategories(5),
    },
];

pub const CHALLENGE_TEMPLATES: &[ChallengeTemplate] = &[
    // Daily
    ChallengeTemplate {
        id: "daily_track",
        name: "Daily Tracker",
        description: "Record at least one transaction today",
        icon: "📝",
        kind: ChallengeType::Daily,
        category: "consistency",
        target_value: 1.0,
        points: 10,
    },
    ChallengeTemplate {
        id: "daily_save",
        name: "Daily Saver",
        description: "Save at least ₹100 today",
        icon: "💰",
        kind: ChallengeType::Daily,
        category: "saving",
        target_value: 100.0,
        points: 20,
    },
    // Weekly
    ChallengeTemplate {
        id: "weekly_budget",
        name: "Weekly Budgeter",
        description: "Stay within your weekly expense limit",
        icon: "🎯",
        kind: ChallengeType::Weekly,
        category: "budgeting",
        target_value: 1.0,
        points: 50,
    },
    ChallengeTemplate {
        id: "weekly_category",
        name: "Category Master",
        description: "Track expenses in at least 5 different categories this week",
        icon: "📊",
        kind: ChallengeType::Weekly,
        category: "consistency",
        target_value: 5.0,
        points: 75,
    },
    // Monthly
    ChallengeTemplate {
        id: "monthly_save_goal",
        name: "Monthly Saver",
        description: "Save at least ₹2000 this month",
        icon: "🏆",
        kind: ChallengeType::Monthly,
        category: "saving",
        target_value: 2000.0,
        points: 200,
    },
    ChallengeTemplate {
        id: "monthly_investment",
        name: "Investment Builder",
        description: "Make at least one investment this month",
        icon: "📈",
        kind: ChallengeType::Monthly,
        category: "investing",
        target_value: 1.0,
        points: 150,
    },
];

/// Categories whose name marks a transaction as an investment
/// (case-insensitive substring match).
pub const INVESTMENT_KEYWORDS: &[&str] = &["investment", "mutual fund", "stocks", "sip", "fd"];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ChallengeType;

    #[test]
    fn test_catalog_sizes() {
        assert_eq!(ACHIEVEMENT_TEMPLATES.len(), 14);
        assert_eq!(CHALLENGE_TEMPLATES.len(), 6);
    }

    #[test]
    fn test_template_ids_unique() {
        let mut ids: Vec<&str> = ACHIEVEMENT_TEMPLATES.iter().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), ACHIEVEMENT_TEMPLATES.len());

        let mut ids: Vec<&str> = CHALLENGE_TEMPLATES.iter().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), CHALLENGE_TEMPLATES.len());
    }

    #[test]
    fn test_every_challenge_type_has_templates() {
        for kind in [
            ChallengeType::Daily,
            ChallengeType::Weekly,
            ChallengeType::Monthly,
        ] {
            assert!(
                CHALLENGE_TEMPLATES.iter().any(|t| t.kind == kind),
                "no template for {:?}",
                kind
            );
        }
    }
}
