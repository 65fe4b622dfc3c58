//! Risk scoring, classification and heat maps.
//!
//! Two independent views of a risk exist side by side:
//! - the stored `severity`, assigned by whoever raised the risk
//! - the derived [`RiskBucket`], computed from `probability * impact / 100`
//!
//! They are not reconciled and may disagree.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::health::{LevelTally, round2};
use super::{Risk, RiskStatus};

/// Fixed score thresholds for the derived bucket (inclusive lower bounds).
pub mod thresholds {
    pub const CRITICAL: f64 = 64.0;
    pub const HIGH: f64 = 36.0;
    pub const MEDIUM: f64 = 16.0;
    pub const LOW: f64 = 4.0;
}

/// Number of bands per heat map axis.
pub const HEAT_MAP_BANDS: usize = 5;

/// Risk score in [0, 100] from probability and impact, each in [0, 100].
pub fn risk_score(probability: f64, impact: f64) -> f64 {
    probability * impact / 100.0
}

/// Display bucket derived from a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBucket {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBucket {
    pub fn classify(score: f64) -> Self {
        if score >= thresholds::CRITICAL {
            RiskBucket::Critical
        } else if score >= thresholds::HIGH {
            RiskBucket::High
        } else if score >= thresholds::MEDIUM {
            RiskBucket::Medium
        } else if score >= thresholds::LOW {
            RiskBucket::Low
        } else {
            RiskBucket::None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskBucket::None => "none",
            RiskBucket::Low => "low",
            RiskBucket::Medium => "medium",
            RiskBucket::High => "high",
            RiskBucket::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count of risks per derived bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTally {
    pub none: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl BucketTally {
    pub fn record(&mut self, bucket: RiskBucket) {
        match bucket {
            RiskBucket::None => self.none += 1,
            RiskBucket::Low => self.low += 1,
            RiskBucket::Medium => self.medium += 1,
            RiskBucket::High => self.high += 1,
            RiskBucket::Critical => self.critical += 1,
        }
    }
}

/// Count of risks per lifecycle status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskStatusTally {
    pub identified: usize,
    pub monitored: usize,
    pub mitigated: usize,
    pub resolved: usize,
}

impl RiskStatusTally {
    pub fn record(&mut self, status: RiskStatus) {
        match status {
            RiskStatus::Identified => self.identified += 1,
            RiskStatus::Monitored => self.monitored += 1,
            RiskStatus::Mitigated => self.mitigated += 1,
            RiskStatus::Resolved => self.resolved += 1,
        }
    }
}

/// Probability x impact grid.
///
/// `cells[i][p]` counts risks whose impact falls in band `i` and probability
/// in band `p`. Bands are 20 wide; a value of exactly 100 lands in the top band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatMap {
    pub cells: [[usize; HEAT_MAP_BANDS]; HEAT_MAP_BANDS],
}

impl HeatMap {
    pub fn band(value: f64) -> usize {
        let width = 100.0 / HEAT_MAP_BANDS as f64;
        ((value.max(0.0) / width) as usize).min(HEAT_MAP_BANDS - 1)
    }

    pub fn record(&mut self, probability: f64, impact: f64) {
        self.cells[Self::band(impact)][Self::band(probability)] += 1;
    }

    pub fn from_risks<'a>(risks: impl IntoIterator<Item = &'a Risk>) -> Self {
        let mut map = Self::default();
        for risk in risks {
            map.record(risk.probability, risk.impact);
        }
        map
    }

    pub fn total(&self) -> usize {
        self.cells.iter().flatten().sum()
    }
}

/// Aggregate view over a collection of risks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub total: usize,
    /// Risks not yet resolved
    pub open: usize,
    /// Tally of the stored, operator-assigned severity
    pub severity: LevelTally,
    pub status: RiskStatusTally,
    /// Tally of the derived score bucket
    pub buckets: BucketTally,
    /// Mean derived score, two decimals; 0 when there are no risks
    pub average_score: f64,
    pub heat_map: HeatMap,
}

impl RiskSummary {
    pub fn from_risks(risks: &[Risk]) -> Self {
        let mut summary = Self {
            total: risks.len(),
            ..Self::default()
        };
        let mut score_sum = 0.0;
        for risk in risks {
            summary.severity.record(risk.severity);
            summary.status.record(risk.status);
            summary.buckets.record(risk.bucket());
            summary.heat_map.record(risk.probability, risk.impact);
            if risk.status != RiskStatus::Resolved {
                summary.open += 1;
            }
            score_sum += risk.score();
        }
        if !risks.is_empty() {
            summary.average_score = round2(score_sum / risks.len() as f64);
        }
        summary
    }
}
