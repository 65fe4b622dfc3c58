//! Data models for pmo entities.
//!
//! This module defines the core data structures:
//! - `User` - Dashboard users with a role and department
//! - `Portfolio` - Groups of projects with budget and resource data
//! - `Project` - Delivery efforts with status, budget, timeline and tags
//! - `Risk` - Risks raised against a single project
//! - `PmiStandard` - Compliance standards with weighted criteria
//! - `ComplianceEvaluation` - A project's score against a standard
//!
//! Range and format checks happen here, at the write boundary. Records read
//! back from storage are trusted.

pub mod compliance;
pub mod health;
pub mod risk;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::{Error, Result};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// User role, ordered by authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Executive,
    PortfolioManager,
    ProjectOfficer,
}

impl Role {
    /// All roles, highest authority first.
    pub const ALL: [Role; 3] = [Role::Executive, Role::PortfolioManager, Role::ProjectOfficer];

    /// Position in the role hierarchy (executive = 3, project officer = 1).
    pub fn rank(self) -> u8 {
        match self {
            Role::Executive => 3,
            Role::PortfolioManager => 2,
            Role::ProjectOfficer => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Executive => "executive",
            Role::PortfolioManager => "portfolio_manager",
            Role::ProjectOfficer => "project_officer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "executive" => Ok(Role::Executive),
            "portfolio_manager" | "manager" => Ok(Role::PortfolioManager),
            "project_officer" | "officer" => Ok(Role::ProjectOfficer),
            _ => Err(Error::InvalidInput(format!("Invalid role: {}", s))),
        }
    }
}

/// Project delivery status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Planned,
    Active,
    AtRisk,
    Delayed,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Planned => "planned",
            ProjectStatus::Active => "active",
            ProjectStatus::AtRisk => "at-risk",
            ProjectStatus::Delayed => "delayed",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "planned" => Ok(ProjectStatus::Planned),
            "active" => Ok(ProjectStatus::Active),
            "at-risk" | "atrisk" => Ok(ProjectStatus::AtRisk),
            "delayed" => Ok(ProjectStatus::Delayed),
            "completed" | "done" => Ok(ProjectStatus::Completed),
            _ => Err(Error::InvalidInput(format!("Invalid project status: {}", s))),
        }
    }
}

/// Qualitative risk level, used both for a project's `risk_level` and a
/// risk's operator-assigned `severity`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(Error::InvalidInput(format!("Invalid risk level: {}", s))),
        }
    }
}

/// Risk lifecycle status. Any status may follow any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    #[default]
    Identified,
    Monitored,
    Mitigated,
    Resolved,
}

impl RiskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskStatus::Identified => "identified",
            RiskStatus::Monitored => "monitored",
            RiskStatus::Mitigated => "mitigated",
            RiskStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "identified" => Ok(RiskStatus::Identified),
            "monitored" | "monitoring" => Ok(RiskStatus::Monitored),
            "mitigated" => Ok(RiskStatus::Mitigated),
            "resolved" => Ok(RiskStatus::Resolved),
            _ => Err(Error::InvalidInput(format!("Invalid risk status: {}", s))),
        }
    }
}

/// Milestone status within a project timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MilestoneStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Delayed,
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MilestoneStatus::Pending => "pending",
            MilestoneStatus::InProgress => "in-progress",
            MilestoneStatus::Completed => "completed",
            MilestoneStatus::Delayed => "delayed",
        };
        f.write_str(s)
    }
}

impl FromStr for MilestoneStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "pending" => Ok(MilestoneStatus::Pending),
            "in-progress" | "inprogress" => Ok(MilestoneStatus::InProgress),
            "completed" | "done" => Ok(MilestoneStatus::Completed),
            "delayed" => Ok(MilestoneStatus::Delayed),
            _ => Err(Error::InvalidInput(format!(
                "Invalid milestone status: {}",
                s
            ))),
        }
    }
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("Invalid date (expected YYYY-MM-DD): {}", s)))
}

/// A dashboard user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (e.g., "usr-a1b2")
    pub id: String,

    /// Entity type marker
    #[serde(rename = "type")]
    pub entity_type: String,

    /// Display name
    pub name: String,

    /// Contact email, unique across users
    pub email: String,

    /// Role driving every authorization decision
    pub role: Role,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with the given ID, name, email and role.
    pub fn new(id: String, name: String, email: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id,
            entity_type: "user".to_string(),
            name,
            email,
            role,
            department: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate field formats.
    pub fn validate(&self) -> Result<()> {
        require_name("User name", &self.name)?;
        validate_email(&self.email)
    }
}

/// Canonical form of a project tag: trimmed and lowercased.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Check an email address against the accepted format.
pub fn validate_email(email: &str) -> Result<()> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid email address: {}", email)))
    }
}

/// Staffing figures attached to a portfolio. Advisory; never recomputed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    #[serde(default)]
    pub team_size: u32,

    /// Utilization percentage (0-100)
    #[serde(default)]
    pub utilization: f64,

    #[serde(default)]
    pub project_count: u32,
}

/// A portfolio of projects owned by a manager or executive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Unique identifier (e.g., "pf-a1b2")
    pub id: String,

    /// Entity type marker
    #[serde(rename = "type")]
    pub entity_type: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Owning user ID
    pub owner_id: String,

    /// Health score (0-100). Only changes on explicit recompute or update.
    pub health_score: f64,

    #[serde(default)]
    pub total_budget: f64,

    #[serde(default)]
    pub allocated_budget: f64,

    #[serde(default)]
    pub resource_allocation: ResourceAllocation,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// When the health score was last recomputed from child projects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_recomputed_at: Option<DateTime<Utc>>,
}

impl Portfolio {
    /// Create a new portfolio with the given ID, name and owner.
    pub fn new(id: String, name: String, owner_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            entity_type: "portfolio".to_string(),
            name,
            description: None,
            owner_id,
            health_score: 100.0,
            total_budget: 0.0,
            allocated_budget: 0.0,
            resource_allocation: ResourceAllocation::default(),
            created_at: now,
            updated_at: now,
            health_recomputed_at: None,
        }
    }

    /// Validate field ranges.
    pub fn validate(&self) -> Result<()> {
        require_name("Portfolio name", &self.name)?;
        require_percentage("health_score", self.health_score)?;
        require_non_negative("total_budget", self.total_budget)?;
        require_non_negative("allocated_budget", self.allocated_budget)?;
        require_percentage("utilization", self.resource_allocation.utilization)
    }
}

/// A dated checkpoint on a project timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub status: MilestoneStatus,
}

/// Project schedule. Milestones are kept ordered by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,

    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

impl Timeline {
    /// Insert a milestone after any existing milestones on the same date.
    pub fn add_milestone(&mut self, milestone: Milestone) {
        let pos = self
            .milestones
            .iter()
            .position(|m| m.date > milestone.date)
            .unwrap_or(self.milestones.len());
        self.milestones.insert(pos, milestone);
    }
}

/// A project tracked within (optionally) a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier (e.g., "prj-a1b2")
    pub id: String,

    /// Entity type marker
    #[serde(rename = "type")]
    pub entity_type: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub status: ProjectStatus,

    #[serde(default)]
    pub budget: f64,

    #[serde(default)]
    pub spent_budget: f64,

    #[serde(default)]
    pub timeline: Timeline,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    /// Health score (0-100)
    pub health_score: f64,

    /// Operator-assigned risk level, independent of the project's risks
    #[serde(default)]
    pub risk_level: RiskLevel,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project with the given ID and name.
    pub fn new(id: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            entity_type: "project".to_string(),
            name,
            description: None,
            status: ProjectStatus::default(),
            budget: 0.0,
            spent_budget: 0.0,
            timeline: Timeline::default(),
            portfolio_id: None,
            owner_id: None,
            health_score: 100.0,
            risk_level: RiskLevel::default(),
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate field ranges and timeline ordering.
    pub fn validate(&self) -> Result<()> {
        require_name("Project name", &self.name)?;
        require_percentage("health_score", self.health_score)?;
        require_non_negative("budget", self.budget)?;
        require_non_negative("spent_budget", self.spent_budget)?;
        if let (Some(start), Some(end)) = (self.timeline.start, self.timeline.end) {
            if end < start {
                return Err(Error::InvalidInput(format!(
                    "Timeline end {} is before start {}",
                    end, start
                )));
            }
        }
        for milestone in &self.timeline.milestones {
            require_name("Milestone name", &milestone.name)?;
        }
        Ok(())
    }
}

/// A risk raised against a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    /// Unique identifier (e.g., "rsk-a1b2")
    pub id: String,

    /// Entity type marker
    #[serde(rename = "type")]
    pub entity_type: String,

    /// Owning project ID
    pub project_id: String,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Operator-assigned severity. Not reconciled with the derived bucket.
    #[serde(default)]
    pub severity: RiskLevel,

    #[serde(default)]
    pub status: RiskStatus,

    /// Likelihood (0-100)
    pub probability: f64,

    /// Consequence (0-100)
    pub impact: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigation_plan: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Risk {
    /// Create a new risk against the given project.
    pub fn new(id: String, project_id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            entity_type: "risk".to_string(),
            project_id,
            title,
            description: None,
            severity: RiskLevel::default(),
            status: RiskStatus::default(),
            probability: 0.0,
            impact: 0.0,
            mitigation_plan: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derived risk score (`probability * impact / 100`).
    pub fn score(&self) -> f64 {
        risk::risk_score(self.probability, self.impact)
    }

    /// Derived display bucket for this risk's score.
    pub fn bucket(&self) -> risk::RiskBucket {
        risk::RiskBucket::classify(self.score())
    }

    pub fn validate(&self) -> Result<()> {
        require_name("Risk title", &self.title)?;
        require_percentage("probability", self.probability)?;
        require_percentage("impact", self.impact)
    }
}

/// A weighted criterion within a standard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    pub weight: f64,
}

/// A PMI-style standard that projects are evaluated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmiStandard {
    /// Unique identifier (e.g., "std-a1b2")
    pub id: String,

    /// Entity type marker
    #[serde(rename = "type")]
    pub entity_type: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub criteria: Vec<Criterion>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PmiStandard {
    pub fn new(id: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            entity_type: "standard".to_string(),
            name,
            version: None,
            description: None,
            criteria: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a criterion by case-insensitive name.
    pub fn criterion(&self, name: &str) -> Option<&Criterion> {
        self.criteria
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn validate(&self) -> Result<()> {
        require_name("Standard name", &self.name)?;
        for criterion in &self.criteria {
            require_name("Criterion name", &criterion.name)?;
            if !(criterion.weight.is_finite() && criterion.weight > 0.0) {
                return Err(Error::InvalidInput(format!(
                    "Criterion weight must be positive, got {}",
                    criterion.weight
                )));
            }
        }
        Ok(())
    }
}

/// Score for one criterion within an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    pub score: f64,
}

/// A project's compliance score against a standard at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceEvaluation {
    /// Unique identifier (e.g., "cev-a1b2")
    pub id: String,

    /// Entity type marker
    #[serde(rename = "type")]
    pub entity_type: String,

    pub project_id: String,
    pub standard_id: String,

    /// Overall score (0-100)
    pub overall_score: f64,

    #[serde(default)]
    pub criterion_scores: Vec<CriterionScore>,

    /// User who performed the evaluation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluator_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub evaluated_at: DateTime<Utc>,
}

impl ComplianceEvaluation {
    pub fn new(id: String, project_id: String, standard_id: String, overall_score: f64) -> Self {
        Self {
            id,
            entity_type: "evaluation".to_string(),
            project_id,
            standard_id,
            overall_score,
            criterion_scores: Vec::new(),
            evaluator_id: None,
            notes: None,
            evaluated_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_percentage("overall_score", self.overall_score)?;
        for cs in &self.criterion_scores {
            require_percentage(&format!("score for '{}'", cs.criterion), cs.score)?;
        }
        Ok(())
    }
}

fn require_name(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} cannot be empty", what)));
    }
    Ok(())
}

/// Require a value in [0, 100].
pub fn require_percentage(field: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(Error::InvalidInput(format!(
            "{} must be between 0 and 100, got {}",
            field, value
        )));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(Error::InvalidInput(format!(
            "{} must be non-negative, got {}",
            field, value
        )));
    }
    Ok(())
}
