//! Risk commands. Risks inherit access from their project.

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::info;

use super::{
    Context, Created, Deleted, FieldChanges, Output, Scope, Updated, json, non_empty,
    scoped_projects,
};
use crate::access::Action;
use crate::models::risk::{RiskBucket, RiskSummary};
use crate::models::{Risk, RiskLevel, RiskStatus};
use crate::storage::RiskFilter;
use crate::Result;

/// Fields accepted by `risk create`.
#[derive(Debug, Clone, Default)]
pub struct NewRisk {
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: Option<RiskLevel>,
    pub status: Option<RiskStatus>,
    pub probability: f64,
    pub impact: f64,
    pub mitigation_plan: Option<String>,
}

/// Fields accepted by `risk update`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct RiskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub severity: Option<RiskLevel>,
    pub status: Option<RiskStatus>,
    pub probability: Option<f64>,
    pub impact: Option<f64>,
    pub mitigation_plan: Option<String>,
}

/// A risk with its derived score and bucket.
#[derive(Serialize)]
pub struct RiskView {
    #[serde(flatten)]
    pub risk: Risk,
    pub score: f64,
    pub bucket: RiskBucket,
}

impl From<Risk> for RiskView {
    fn from(risk: Risk) -> Self {
        Self {
            score: risk.score(),
            bucket: risk.bucket(),
            risk,
        }
    }
}

impl Output for RiskView {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let r = &self.risk;
        let mut lines = vec![
            format!("{} {} [{}]", r.id, r.title, r.status),
            format!("  Project: {}", r.project_id),
            format!("  Severity: {}", r.severity),
            format!(
                "  Probability {:.0} x impact {:.0} = score {:.2} ({})",
                r.probability, r.impact, self.score, self.bucket
            ),
        ];
        if let Some(ref desc) = r.description {
            lines.push(format!("  {}", desc));
        }
        if let Some(ref plan) = r.mitigation_plan {
            lines.push(format!("  Mitigation: {}", plan));
        }
        lines.join("\n")
    }
}

#[derive(Serialize)]
pub struct RiskList {
    pub risks: Vec<RiskView>,
    pub count: usize,
}

impl Output for RiskList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.risks.is_empty() {
            return "No risks found.".to_string();
        }
        let mut lines = vec![format!("{} risk(s):", self.count)];
        for v in &self.risks {
            lines.push(format!(
                "  {} {} [{}] {} (score {:.2}, {})",
                v.risk.id, v.risk.title, v.risk.status, v.risk.severity, v.score, v.bucket
            ));
        }
        lines.join("\n")
    }
}

#[derive(Serialize)]
pub struct RiskSummaryResult {
    #[serde(flatten)]
    pub scope: Scope,
    pub projects: usize,
    #[serde(flatten)]
    pub summary: RiskSummary,
}

impl Output for RiskSummaryResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let s = &self.summary;
        let mut lines = vec![
            format!(
                "Risks for {} ({} project(s)): {} total, {} open",
                self.scope.label(),
                self.projects,
                s.total,
                s.open
            ),
            format!("  Average score: {:.2}", s.average_score),
            format!(
                "  Severity: low {}, medium {}, high {}, critical {}",
                s.severity.low, s.severity.medium, s.severity.high, s.severity.critical
            ),
            format!(
                "  Derived: none {}, low {}, medium {}, high {}, critical {}",
                s.buckets.none, s.buckets.low, s.buckets.medium, s.buckets.high, s.buckets.critical
            ),
            format!(
                "  Status: identified {}, monitored {}, mitigated {}, resolved {}",
                s.status.identified, s.status.monitored, s.status.mitigated, s.status.resolved
            ),
            "  Heat map (rows impact high to low, columns probability low to high):".to_string(),
        ];
        for row in s.heat_map.cells.iter().rev() {
            let cells: Vec<String> = row.iter().map(|c| format!("{:>3}", c)).collect();
            lines.push(format!("   {}", cells.join("")));
        }
        lines.join("\n")
    }
}

fn parent(ctx: &Context, risk: &Risk, action: Action) -> Result<()> {
    let project = ctx.storage.get_project(&risk.project_id)?;
    ctx.require_project(&project, action)
}

/// Raise a risk against a project.
pub fn risk_create(ctx: &mut Context, input: NewRisk) -> Result<Created> {
    let project = ctx.storage.get_project(&input.project_id)?;
    ctx.require_project(&project, Action::Edit)?;

    let title = input.title.trim().to_string();
    let id = ctx.storage.next_id::<Risk>("rsk", &title)?;
    let mut risk = Risk::new(id, project.id, title);
    risk.description = input.description.and_then(non_empty);
    risk.severity = input.severity.unwrap_or_default();
    risk.status = input.status.unwrap_or_default();
    risk.probability = input.probability;
    risk.impact = input.impact;
    risk.mitigation_plan = input.mitigation_plan.and_then(non_empty);

    ctx.storage.create_risk(&risk)?;
    info!(id = %risk.id, project = %risk.project_id, score = risk.score(), "created risk");
    Ok(Created {
        id: risk.id,
        kind: "risk",
        name: risk.title,
    })
}

/// List risks on projects the actor can see.
pub fn risk_list(ctx: &Context, filter: &RiskFilter) -> Result<RiskList> {
    let visible: HashSet<String> = ctx.visible_projects()?.into_iter().map(|p| p.id).collect();
    let risks: Vec<RiskView> = ctx
        .storage
        .list_risks(filter)?
        .into_iter()
        .filter(|r| visible.contains(&r.project_id))
        .map(RiskView::from)
        .collect();
    let count = risks.len();
    Ok(RiskList { risks, count })
}

pub fn risk_show(ctx: &Context, id: &str) -> Result<RiskView> {
    let risk = ctx.storage.get_risk(id)?;
    parent(ctx, &risk, Action::View)?;
    Ok(risk.into())
}

pub fn risk_update(ctx: &mut Context, id: &str, update: RiskUpdate) -> Result<Updated> {
    let mut risk = ctx.storage.get_risk(id)?;
    parent(ctx, &risk, Action::Edit)?;

    let mut changes = FieldChanges::default();
    changes.set(
        "title",
        &mut risk.title,
        update.title.map(|t| t.trim().to_string()),
    );
    changes.set(
        "description",
        &mut risk.description,
        update.description.map(non_empty),
    );
    changes.set("severity", &mut risk.severity, update.severity);
    changes.set("status", &mut risk.status, update.status);
    changes.set("probability", &mut risk.probability, update.probability);
    changes.set("impact", &mut risk.impact, update.impact);
    changes.set(
        "mitigation_plan",
        &mut risk.mitigation_plan,
        update.mitigation_plan.map(non_empty),
    );

    if !changes.is_empty() {
        risk.updated_at = Utc::now();
        ctx.storage.update_risk(&risk)?;
        info!(id, status = %risk.status, "updated risk");
    }

    Ok(Updated {
        id: id.to_string(),
        kind: "risk",
        updated_fields: changes.into_vec(),
    })
}

/// Delete a risk. Needs edit access to its project.
pub fn risk_delete(ctx: &mut Context, id: &str) -> Result<Deleted> {
    let risk = ctx.storage.get_risk(id)?;
    parent(ctx, &risk, Action::Edit)?;
    ctx.storage.delete_risk(id)?;
    info!(id, project = %risk.project_id, "deleted risk");
    Ok(Deleted {
        id: id.to_string(),
        kind: "risk",
        cascaded: BTreeMap::new(),
    })
}

/// Summarize risks for a project, a portfolio, or everything visible.
pub fn risk_summary(ctx: &Context, scope: Scope) -> Result<RiskSummaryResult> {
    let projects = scoped_projects(ctx, &scope)?;
    let mut risks = Vec::new();
    for project in &projects {
        risks.extend(ctx.storage.list_risks(&RiskFilter {
            project_id: Some(project.id.clone()),
            ..RiskFilter::default()
        })?);
    }

    Ok(RiskSummaryResult {
        scope,
        projects: projects.len(),
        summary: RiskSummary::from_risks(&risks),
    })
}
