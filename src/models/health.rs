//! Portfolio health aggregation.
//!
//! A portfolio's health is the budget-weighted mean of its projects' health
//! scores. The score is only ever produced on demand; storing it back onto
//! the portfolio is a separate, explicit step.
//!
//! # Example
//!
//! ```
//! use pmo::models::health::weighted_health_score;
//!
//! let score = weighted_health_score([(100.0, 90.0), (300.0, 50.0)]);
//! assert_eq!(score, 60.0);
//! ```

use serde::{Deserialize, Serialize};

use super::{Project, ProjectStatus, RiskLevel};

/// Score reported for a portfolio with no projects.
pub const EMPTY_PORTFOLIO_HEALTH: f64 = 100.0;

/// Round to two decimal places, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Budget-weighted mean over `(budget, health_score)` pairs.
///
/// - No pairs: [`EMPTY_PORTFOLIO_HEALTH`].
/// - Zero total budget: unweighted mean.
/// - Otherwise: each score weighted by `budget / total_budget`.
///
/// The result is rounded to two decimals.
pub fn weighted_health_score<I>(pairs: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let pairs: Vec<(f64, f64)> = pairs.into_iter().collect();
    if pairs.is_empty() {
        return EMPTY_PORTFOLIO_HEALTH;
    }

    let total_budget: f64 = pairs.iter().map(|(budget, _)| budget).sum();
    let score = if total_budget == 0.0 {
        pairs.iter().map(|(_, health)| health).sum::<f64>() / pairs.len() as f64
    } else {
        pairs
            .iter()
            .map(|(budget, health)| health * (budget / total_budget))
            .sum()
    };

    round2(score)
}

/// Health score for a portfolio made of `projects`.
pub fn portfolio_health_score(projects: &[Project]) -> f64 {
    weighted_health_score(projects.iter().map(|p| (p.budget, p.health_score)))
}

/// Count of projects per delivery status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTally {
    pub planned: usize,
    pub active: usize,
    pub at_risk: usize,
    pub delayed: usize,
    pub completed: usize,
}

impl StatusTally {
    pub fn from_projects<'a>(projects: impl IntoIterator<Item = &'a Project>) -> Self {
        let mut tally = Self::default();
        for project in projects {
            match project.status {
                ProjectStatus::Planned => tally.planned += 1,
                ProjectStatus::Active => tally.active += 1,
                ProjectStatus::AtRisk => tally.at_risk += 1,
                ProjectStatus::Delayed => tally.delayed += 1,
                ProjectStatus::Completed => tally.completed += 1,
            }
        }
        tally
    }

    pub fn total(&self) -> usize {
        self.planned + self.active + self.at_risk + self.delayed + self.completed
    }

    /// Projects that need attention (at-risk or delayed).
    pub fn troubled(&self) -> usize {
        self.at_risk + self.delayed
    }
}

/// Count of items per risk level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTally {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl LevelTally {
    pub fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
            RiskLevel::Critical => self.critical += 1,
        }
    }

    pub fn from_levels(levels: impl IntoIterator<Item = RiskLevel>) -> Self {
        let mut tally = Self::default();
        for level in levels {
            tally.record(level);
        }
        tally
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

/// Budget totals across a set of projects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub total_budget: f64,
    pub spent_budget: f64,
    pub remaining_budget: f64,
    /// Spent as a percentage of budget; 0 when there is no budget
    pub utilization: f64,
}

impl BudgetSummary {
    pub fn from_projects<'a>(projects: impl IntoIterator<Item = &'a Project>) -> Self {
        let (total, spent) = projects
            .into_iter()
            .fold((0.0, 0.0), |(t, s), p| (t + p.budget, s + p.spent_budget));
        let utilization = if total > 0.0 {
            round2(spent / total * 100.0)
        } else {
            0.0
        };
        Self {
            total_budget: total,
            spent_budget: spent,
            remaining_budget: total - spent,
            utilization,
        }
    }
}

/// Aggregate view of a portfolio's projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub project_count: usize,
    /// Freshly computed health; may differ from the stored score
    pub computed_health_score: f64,
    pub status: StatusTally,
    pub risk_levels: LevelTally,
    pub budget: BudgetSummary,
}

impl PortfolioStats {
    pub fn from_projects(projects: &[Project]) -> Self {
        Self {
            project_count: projects.len(),
            computed_health_score: portfolio_health_score(projects),
            status: StatusTally::from_projects(projects),
            risk_levels: LevelTally::from_levels(projects.iter().map(|p| p.risk_level)),
            budget: BudgetSummary::from_projects(projects),
        }
    }
}
