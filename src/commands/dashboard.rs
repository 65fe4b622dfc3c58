//! Role-based dashboard composition.

use serde::Serialize;

use super::{Context, Output, json};
use crate::access::{Action, MenuItem, ResourceType, View, default_view, has_role, menu_items};
use crate::models::compliance::ComplianceSummary;
use crate::models::health::{BudgetSummary, StatusTally};
use crate::models::risk::RiskSummary;
use crate::models::{ComplianceEvaluation, Risk, Role};
use crate::storage::{EvaluationFilter, RiskFilter};
use crate::Result;

/// Health card for one portfolio.
#[derive(Serialize)]
pub struct PortfolioCard {
    pub id: String,
    pub name: String,
    pub health_score: f64,
    pub total_budget: f64,
}

#[derive(Serialize)]
pub struct Dashboard {
    /// Acting user, absent for the local operator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub role: Role,
    pub default_view: View,
    pub menu: Vec<MenuItem>,
    pub portfolios: Vec<PortfolioCard>,
    pub projects: StatusTally,
    pub risks: RiskSummary,
    pub compliance: ComplianceSummary,
    /// Only shown to portfolio managers and above
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetSummary>,
}

impl Output for Dashboard {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let who = self.user.as_deref().unwrap_or("operator");
        let menu: Vec<String> = self
            .menu
            .iter()
            .map(|m| m.to_string())
            .collect();
        let mut lines = vec![
            format!("Dashboard for {} ({}), view {}", who, self.role, self.default_view),
            format!("  Menu: {}", menu.join(", ")),
        ];

        if !self.portfolios.is_empty() {
            lines.push("  Portfolios:".to_string());
            for card in &self.portfolios {
                lines.push(format!(
                    "    {} {} health {:.2}",
                    card.id, card.name, card.health_score
                ));
            }
        }

        let p = &self.projects;
        lines.push(format!(
            "  Projects: {} (active {}, at-risk {}, delayed {}, completed {}, planned {})",
            p.total(),
            p.active,
            p.at_risk,
            p.delayed,
            p.completed,
            p.planned
        ));
        lines.push(format!(
            "  Risks: {} open of {}, average score {:.2}",
            self.risks.open, self.risks.total, self.risks.average_score
        ));
        lines.push(format!(
            "  Compliance: {:.2} ({}), {}, {:.2}% passing",
            self.compliance.average_score,
            self.compliance.level,
            self.compliance.trend,
            self.compliance.compliance_rate
        ));
        if let Some(ref b) = self.budget {
            lines.push(format!(
                "  Budget: {:.2} of {:.2} spent ({:.2}%)",
                b.spent_budget, b.total_budget, b.utilization
            ));
        }
        lines.join("\n")
    }
}

/// Compose the dashboard for the acting user.
///
/// The local operator gets the executive composition.
pub fn dashboard(ctx: &Context) -> Result<Dashboard> {
    ctx.require(ResourceType::Dashboard, Action::View)?;
    let role = ctx.actor().map(|u| u.role).unwrap_or(Role::Executive);

    let portfolios = ctx
        .storage
        .list_portfolios(None)?
        .into_iter()
        .filter(|p| ctx.can_see_portfolio(p))
        .map(|p| PortfolioCard {
            id: p.id,
            name: p.name,
            health_score: p.health_score,
            total_budget: p.total_budget,
        })
        .collect();

    let projects = ctx.visible_projects()?;
    let mut risks: Vec<Risk> = Vec::new();
    let mut evaluations: Vec<ComplianceEvaluation> = Vec::new();
    for project in &projects {
        risks.extend(ctx.storage.list_risks(&RiskFilter {
            project_id: Some(project.id.clone()),
            ..RiskFilter::default()
        })?);
        evaluations.extend(ctx.storage.list_evaluations(&EvaluationFilter {
            project_id: Some(project.id.clone()),
            ..EvaluationFilter::default()
        })?);
    }

    let budget =
        has_role(role, Role::PortfolioManager).then(|| BudgetSummary::from_projects(&projects));

    Ok(Dashboard {
        user: ctx.actor_id().map(str::to_string),
        role,
        default_view: default_view(role),
        menu: menu_items(role).to_vec(),
        portfolios,
        projects: StatusTally::from_projects(&projects),
        risks: RiskSummary::from_risks(&risks),
        compliance: ComplianceSummary::from_evaluations(&evaluations),
        budget,
    })
}
