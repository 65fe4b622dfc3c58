//! PMI standards and compliance evaluations.
//!
//! Standards are reference data: anyone with dashboard access may read
//! them, only administrators change them. Evaluations belong to a project
//! and follow its access rules.

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::info;

use super::{
    Context, Created, Deleted, Output, Scope, Updated, json, non_empty, scoped_projects,
};
use crate::access::{Action, ResourceType};
use crate::models::compliance::{
    ComplianceLevel, ComplianceSummary, check_criterion_scores, weighted_criteria_score,
};
use crate::models::{ComplianceEvaluation, Criterion, CriterionScore, PmiStandard};
use crate::storage::EvaluationFilter;
use crate::{Error, Result};

/// Fields accepted by `compliance evaluate`.
#[derive(Debug, Clone, Default)]
pub struct NewEvaluation {
    pub project_id: String,
    pub standard_id: String,
    /// Derived from the criterion scores when absent
    pub overall_score: Option<f64>,
    pub criterion_scores: Vec<CriterionScore>,
    /// Defaults to the acting user
    pub evaluator_id: Option<String>,
    pub notes: Option<String>,
}

/// Parse a `criterion=score` pair, e.g. `Scope Management=82.5`.
pub fn parse_criterion_score(s: &str) -> Result<CriterionScore> {
    let (name, score) = s.rsplit_once('=').ok_or_else(|| {
        Error::InvalidInput(format!("Expected <criterion>=<score>, got '{}'", s))
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput(format!("Missing criterion name in '{}'", s)));
    }
    let score: f64 = score
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Invalid score in '{}'", s)))?;
    Ok(CriterionScore {
        criterion: name.to_string(),
        score,
    })
}

impl Output for PmiStandard {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut head = format!("{} {}", self.id, self.name);
        if let Some(ref version) = self.version {
            head.push_str(&format!(" ({})", version));
        }
        let mut lines = vec![head];
        if let Some(ref desc) = self.description {
            lines.push(format!("  {}", desc));
        }
        if self.criteria.is_empty() {
            lines.push("  No criteria".to_string());
        } else {
            lines.push("  Criteria:".to_string());
            for c in &self.criteria {
                let category = c
                    .category
                    .as_deref()
                    .map(|cat| format!(" [{}]", cat))
                    .unwrap_or_default();
                lines.push(format!("    {} (weight {}){}", c.name, c.weight, category));
            }
        }
        lines.join("\n")
    }
}

#[derive(Serialize)]
pub struct StandardList {
    pub standards: Vec<PmiStandard>,
    pub count: usize,
}

impl Output for StandardList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.standards.is_empty() {
            return "No standards found.".to_string();
        }
        let mut lines = vec![format!("{} standard(s):", self.count)];
        for s in &self.standards {
            lines.push(format!(
                "  {} {} ({} criteria)",
                s.id,
                s.name,
                s.criteria.len()
            ));
        }
        lines.join("\n")
    }
}

/// An evaluation with its compliance level.
#[derive(Serialize)]
pub struct EvaluationView {
    #[serde(flatten)]
    pub evaluation: ComplianceEvaluation,
    pub level: ComplianceLevel,
}

impl From<ComplianceEvaluation> for EvaluationView {
    fn from(evaluation: ComplianceEvaluation) -> Self {
        Self {
            level: ComplianceLevel::from_score(evaluation.overall_score),
            evaluation,
        }
    }
}

impl Output for EvaluationView {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let e = &self.evaluation;
        let mut lines = vec![
            format!("{} {:.2} ({})", e.id, e.overall_score, self.level),
            format!("  Project: {}  Standard: {}", e.project_id, e.standard_id),
            format!("  Evaluated: {}", e.evaluated_at.format("%Y-%m-%d %H:%M")),
        ];
        if let Some(ref evaluator) = e.evaluator_id {
            lines.push(format!("  Evaluator: {}", evaluator));
        }
        for cs in &e.criterion_scores {
            lines.push(format!("    {}: {:.2}", cs.criterion, cs.score));
        }
        if let Some(ref notes) = e.notes {
            lines.push(format!("  Notes: {}", notes));
        }
        lines.join("\n")
    }
}

#[derive(Serialize)]
pub struct EvaluationList {
    pub evaluations: Vec<EvaluationView>,
    pub count: usize,
}

impl Output for EvaluationList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.evaluations.is_empty() {
            return "No evaluations found.".to_string();
        }
        let mut lines = vec![format!("{} evaluation(s):", self.count)];
        for v in &self.evaluations {
            let e = &v.evaluation;
            lines.push(format!(
                "  {} {} vs {}: {:.2} ({}) on {}",
                e.id,
                e.project_id,
                e.standard_id,
                e.overall_score,
                v.level,
                e.evaluated_at.format("%Y-%m-%d")
            ));
        }
        lines.join("\n")
    }
}

#[derive(Serialize)]
pub struct ComplianceSummaryResult {
    #[serde(flatten)]
    pub scope: Scope,
    #[serde(flatten)]
    pub summary: ComplianceSummary,
}

impl Output for ComplianceSummaryResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let s = &self.summary;
        let mut lines = vec![
            format!(
                "Compliance for {}: {} evaluation(s)",
                self.scope.label(),
                s.evaluations
            ),
            format!("  Average: {:.2} ({})", s.average_score, s.level),
            format!("  Trend: {}", s.trend),
            format!("  Compliance rate: {:.2}%", s.compliance_rate),
        ];
        if let Some(latest) = s.latest_score {
            lines.push(format!("  Latest: {:.2}", latest));
        }
        lines.join("\n")
    }
}

/// Create a standard with no criteria.
pub fn standard_create(
    ctx: &mut Context,
    name: String,
    version: Option<String>,
    description: Option<String>,
) -> Result<Created> {
    ctx.require(ResourceType::Admin, Action::Create)?;

    let name = name.trim().to_string();
    let id = ctx.storage.next_id::<PmiStandard>("std", &name)?;
    let mut standard = PmiStandard::new(id, name);
    standard.version = version.and_then(non_empty);
    standard.description = description.and_then(non_empty);
    ctx.storage.create_standard(&standard)?;

    info!(id = %standard.id, "created standard");
    Ok(Created {
        id: standard.id,
        kind: "standard",
        name: standard.name,
    })
}

pub fn standard_list(ctx: &Context) -> Result<StandardList> {
    ctx.require(ResourceType::Dashboard, Action::View)?;
    let standards = ctx.storage.list_standards()?;
    let count = standards.len();
    Ok(StandardList { standards, count })
}

pub fn standard_show(ctx: &Context, id: &str) -> Result<PmiStandard> {
    ctx.require(ResourceType::Dashboard, Action::View)?;
    ctx.storage.get_standard(id)
}

/// Delete a standard. Refused while evaluations reference it.
pub fn standard_delete(ctx: &mut Context, id: &str) -> Result<Deleted> {
    ctx.require(ResourceType::Admin, Action::Delete)?;
    ctx.storage.delete_standard(id)?;
    info!(id, "deleted standard");
    Ok(Deleted {
        id: id.to_string(),
        kind: "standard",
        cascaded: BTreeMap::new(),
    })
}

/// Add a weighted criterion to a standard. Names are unique per standard,
/// ignoring case.
pub fn standard_criterion_add(
    ctx: &mut Context,
    id: &str,
    criterion: Criterion,
) -> Result<Updated> {
    ctx.require(ResourceType::Admin, Action::Edit)?;

    let mut standard = ctx.storage.get_standard(id)?;
    let criterion = Criterion {
        name: criterion.name.trim().to_string(),
        description: criterion.description.and_then(non_empty),
        category: criterion.category.and_then(non_empty),
        weight: criterion.weight,
    };
    if standard.criterion(&criterion.name).is_some() {
        return Err(Error::Conflict(format!(
            "Standard {} already has a criterion named '{}'",
            id, criterion.name
        )));
    }

    standard.criteria.push(criterion);
    standard.updated_at = Utc::now();
    ctx.storage.update_standard(&standard)?;
    info!(id, criteria = standard.criteria.len(), "added criterion");

    Ok(Updated {
        id: id.to_string(),
        kind: "standard",
        updated_fields: vec!["criteria".to_string()],
    })
}

/// Record a project's evaluation against a standard.
pub fn compliance_evaluate(ctx: &mut Context, input: NewEvaluation) -> Result<Created> {
    let project = ctx.storage.get_project(&input.project_id)?;
    ctx.require_project(&project, Action::Edit)?;
    let standard = ctx.storage.get_standard(&input.standard_id)?;

    check_criterion_scores(&standard, &input.criterion_scores)?;
    let overall = match input.overall_score {
        Some(score) => score,
        None => weighted_criteria_score(&standard, &input.criterion_scores)?,
    };

    let seed = format!("{}:{}", project.id, standard.id);
    let id = ctx.storage.next_id::<ComplianceEvaluation>("cev", &seed)?;
    let mut evaluation = ComplianceEvaluation::new(id, project.id, standard.id, overall);
    evaluation.criterion_scores = input.criterion_scores;
    evaluation.evaluator_id = input
        .evaluator_id
        .and_then(non_empty)
        .or_else(|| ctx.actor_id().map(str::to_string));
    evaluation.notes = input.notes.and_then(non_empty);

    ctx.storage.create_evaluation(&evaluation)?;
    info!(
        id = %evaluation.id,
        project = %evaluation.project_id,
        standard = %evaluation.standard_id,
        score = evaluation.overall_score,
        "recorded evaluation"
    );
    Ok(Created {
        id: evaluation.id,
        kind: "evaluation",
        name: standard.name,
    })
}

/// List evaluations of projects the actor can see, oldest first.
pub fn compliance_list(ctx: &Context, filter: &EvaluationFilter) -> Result<EvaluationList> {
    let visible: HashSet<String> = ctx.visible_projects()?.into_iter().map(|p| p.id).collect();
    let evaluations: Vec<EvaluationView> = ctx
        .storage
        .list_evaluations(filter)?
        .into_iter()
        .filter(|e| visible.contains(&e.project_id))
        .map(EvaluationView::from)
        .collect();
    let count = evaluations.len();
    Ok(EvaluationList { evaluations, count })
}

pub fn compliance_show(ctx: &Context, id: &str) -> Result<EvaluationView> {
    let evaluation = ctx.storage.get_evaluation(id)?;
    let project = ctx.storage.get_project(&evaluation.project_id)?;
    ctx.require_project(&project, Action::View)?;
    Ok(evaluation.into())
}

/// Summarize evaluations for a project, standard, portfolio, or everything
/// visible.
pub fn compliance_summary(ctx: &Context, scope: Scope) -> Result<ComplianceSummaryResult> {
    let standard_id = match scope {
        Scope::Standard(ref id) => Some(ctx.storage.get_standard(id)?.id),
        _ => None,
    };
    let projects: HashSet<String> = scoped_projects(ctx, &scope)?
        .into_iter()
        .map(|p| p.id)
        .collect();

    let evaluations: Vec<ComplianceEvaluation> = ctx
        .storage
        .list_evaluations(&EvaluationFilter {
            standard_id,
            ..EvaluationFilter::default()
        })?
        .into_iter()
        .filter(|e| projects.contains(&e.project_id))
        .collect();

    Ok(ComplianceSummaryResult {
        summary: ComplianceSummary::from_evaluations(&evaluations),
        scope,
    })
}
