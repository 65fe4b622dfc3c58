//! Compliance aggregation over evaluation records.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use super::health::round2;
use super::{ComplianceEvaluation, CriterionScore, PmiStandard};
use crate::{Error, Result};

/// Minimum point change between earliest and latest evaluation to count as a trend.
pub const TREND_THRESHOLD: f64 = 5.0;

/// Score at or above which an evaluation counts as compliant.
pub const PASSING_SCORE: f64 = 75.0;

/// Four-bucket compliance label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl ComplianceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            ComplianceLevel::Excellent
        } else if score >= PASSING_SCORE {
            ComplianceLevel::Good
        } else if score >= 60.0 {
            ComplianceLevel::Fair
        } else {
            ComplianceLevel::Poor
        }
    }
}

impl fmt::Display for ComplianceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComplianceLevel::Poor => "poor",
            ComplianceLevel::Fair => "fair",
            ComplianceLevel::Good => "good",
            ComplianceLevel::Excellent => "excellent",
        };
        f.write_str(s)
    }
}

/// Direction of change between the earliest and latest evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Declining => "declining",
        };
        f.write_str(s)
    }
}

/// Arithmetic mean of overall scores, two decimals. 0 for no evaluations.
pub fn average_score(evaluations: &[ComplianceEvaluation]) -> f64 {
    if evaluations.is_empty() {
        return 0.0;
    }
    let sum: f64 = evaluations.iter().map(|e| e.overall_score).sum();
    round2(sum / evaluations.len() as f64)
}

/// Chronological order; evaluations recorded at the same instant fall back to id.
fn chronological(a: &ComplianceEvaluation, b: &ComplianceEvaluation) -> Ordering {
    (a.evaluated_at, &a.id).cmp(&(b.evaluated_at, &b.id))
}

fn earliest(evaluations: &[ComplianceEvaluation]) -> Option<&ComplianceEvaluation> {
    evaluations.iter().min_by(|a, b| chronological(a, b))
}

/// The most recent evaluation, if any.
pub fn latest(evaluations: &[ComplianceEvaluation]) -> Option<&ComplianceEvaluation> {
    evaluations.iter().max_by(|a, b| chronological(a, b))
}

/// Compare the earliest and latest evaluation by timestamp.
///
/// Fewer than two evaluations is always [`Trend::Stable`].
pub fn trend(evaluations: &[ComplianceEvaluation]) -> Trend {
    if evaluations.len() < 2 {
        return Trend::Stable;
    }
    let (Some(earliest), Some(latest)) = (earliest(evaluations), latest(evaluations)) else {
        return Trend::Stable;
    };

    let delta = latest.overall_score - earliest.overall_score;
    if delta > TREND_THRESHOLD {
        Trend::Improving
    } else if delta < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Percentage of evaluations scoring at least [`PASSING_SCORE`]. 0 for none.
pub fn compliance_rate(evaluations: &[ComplianceEvaluation]) -> f64 {
    if evaluations.is_empty() {
        return 0.0;
    }
    let passing = evaluations
        .iter()
        .filter(|e| e.overall_score >= PASSING_SCORE)
        .count();
    round2(passing as f64 / evaluations.len() as f64 * 100.0)
}

/// Check that every score names a distinct criterion of `standard`.
///
/// Names match case-insensitively, so `Scope` and `scope` are the same criterion.
pub fn check_criterion_scores(standard: &PmiStandard, scores: &[CriterionScore]) -> Result<()> {
    let mut seen = HashSet::new();
    for cs in scores {
        let criterion = standard.criterion(&cs.criterion).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Standard {} has no criterion named '{}'",
                standard.id, cs.criterion
            ))
        })?;
        if !seen.insert(criterion.name.to_lowercase()) {
            return Err(Error::InvalidInput(format!(
                "Criterion '{}' is scored more than once",
                criterion.name
            )));
        }
    }
    Ok(())
}

/// Weighted mean of criterion scores using the standard's criterion weights.
///
/// Scores must pass [`check_criterion_scores`]; an empty score list is
/// rejected.
pub fn weighted_criteria_score(standard: &PmiStandard, scores: &[CriterionScore]) -> Result<f64> {
    if scores.is_empty() {
        return Err(Error::InvalidInput(
            "At least one criterion score is required".to_string(),
        ));
    }
    check_criterion_scores(standard, scores)?;

    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for cs in scores {
        if let Some(criterion) = standard.criterion(&cs.criterion) {
            weighted += cs.score * criterion.weight;
            total_weight += criterion.weight;
        }
    }
    Ok(round2(weighted / total_weight))
}

/// Aggregate compliance view for a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub evaluations: usize,
    pub average_score: f64,
    pub level: ComplianceLevel,
    pub trend: Trend,
    /// Score of the most recent evaluation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_score: Option<f64>,
    pub compliance_rate: f64,
}

impl ComplianceSummary {
    pub fn from_evaluations(evaluations: &[ComplianceEvaluation]) -> Self {
        let average = average_score(evaluations);
        Self {
            evaluations: evaluations.len(),
            average_score: average,
            level: ComplianceLevel::from_score(average),
            trend: trend(evaluations),
            latest_score: latest(evaluations).map(|e| e.overall_score),
            compliance_rate: compliance_rate(evaluations),
        }
    }
}
