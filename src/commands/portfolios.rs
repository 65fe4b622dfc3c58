//! Portfolio commands.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use super::{Context, Created, Deleted, FieldChanges, Output, Updated, json, non_empty};
use crate::access::{Action, ResourceType};
use crate::models::Portfolio;
use crate::models::health::PortfolioStats;
use crate::storage::ProjectFilter;
use crate::{Error, Result};

/// Fields accepted by `portfolio create`.
#[derive(Debug, Clone, Default)]
pub struct NewPortfolio {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to the acting user
    pub owner_id: Option<String>,
    pub total_budget: Option<f64>,
    pub allocated_budget: Option<f64>,
    pub team_size: Option<u32>,
    pub utilization: Option<f64>,
}

/// Fields accepted by `portfolio update`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PortfolioUpdate {
    pub name: Option<String>,
    /// `Some("")` clears the description
    pub description: Option<String>,
    pub owner_id: Option<String>,
    pub health_score: Option<f64>,
    pub total_budget: Option<f64>,
    pub allocated_budget: Option<f64>,
    pub team_size: Option<u32>,
    pub utilization: Option<f64>,
    pub project_count: Option<u32>,
}

impl Output for Portfolio {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("{} {}", self.id, self.name)];
        if let Some(ref desc) = self.description {
            lines.push(format!("  {}", desc));
        }
        lines.push(format!("  Owner: {}", self.owner_id));
        lines.push(format!("  Health: {:.2}", self.health_score));
        lines.push(format!(
            "  Budget: {:.2} total, {:.2} allocated",
            self.total_budget, self.allocated_budget
        ));
        let res = &self.resource_allocation;
        lines.push(format!(
            "  Resources: team of {}, {:.0}% utilized, {} project(s)",
            res.team_size, res.utilization, res.project_count
        ));
        if let Some(at) = self.health_recomputed_at {
            lines.push(format!(
                "  Health recomputed: {}",
                at.format("%Y-%m-%d %H:%M")
            ));
        }
        lines.join("\n")
    }
}

#[derive(Serialize)]
pub struct PortfolioList {
    pub portfolios: Vec<Portfolio>,
    pub count: usize,
}

impl Output for PortfolioList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.portfolios.is_empty() {
            return "No portfolios found.".to_string();
        }
        let mut lines = vec![format!("{} portfolio(s):", self.count)];
        for p in &self.portfolios {
            lines.push(format!(
                "  {} {} (health {:.2}, owner {})",
                p.id, p.name, p.health_score, p.owner_id
            ));
        }
        lines.join("\n")
    }
}

/// A portfolio together with the projects the actor can see in it.
#[derive(Serialize)]
pub struct PortfolioShow {
    #[serde(flatten)]
    pub portfolio: Portfolio,
    pub project_ids: Vec<String>,
}

impl Output for PortfolioShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = self.portfolio.to_human();
        if self.project_ids.is_empty() {
            out.push_str("\n  Projects: none");
        } else {
            out.push_str(&format!("\n  Projects: {}", self.project_ids.join(", ")));
        }
        out
    }
}

#[derive(Serialize)]
pub struct HealthRecomputed {
    pub id: String,
    pub previous_health_score: f64,
    pub health_score: f64,
    pub project_count: usize,
    pub recomputed_at: Option<DateTime<Utc>>,
}

impl Output for HealthRecomputed {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Recomputed health for {}: {:.2} -> {:.2} ({} project(s))",
            self.id, self.previous_health_score, self.health_score, self.project_count
        )
    }
}

/// Stored versus freshly computed health, plus project aggregates.
#[derive(Serialize)]
pub struct PortfolioStatsResult {
    pub id: String,
    pub name: String,
    pub stored_health_score: f64,
    /// True when the stored score differs from the computed one
    pub stale: bool,
    #[serde(flatten)]
    pub stats: PortfolioStats,
}

impl Output for PortfolioStatsResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let s = &self.stats;
        let mut lines = vec![format!("{} {}", self.id, self.name)];
        lines.push(format!(
            "  Health: {:.2} stored, {:.2} computed{}",
            self.stored_health_score,
            s.computed_health_score,
            if self.stale { " (stale)" } else { "" }
        ));
        lines.push(format!(
            "  Projects: {} (planned {}, active {}, at-risk {}, delayed {}, completed {})",
            s.project_count,
            s.status.planned,
            s.status.active,
            s.status.at_risk,
            s.status.delayed,
            s.status.completed
        ));
        lines.push(format!(
            "  Risk levels: low {}, medium {}, high {}, critical {}",
            s.risk_levels.low, s.risk_levels.medium, s.risk_levels.high, s.risk_levels.critical
        ));
        lines.push(format!(
            "  Budget: {:.2} total, {:.2} spent, {:.2} remaining ({:.2}% used)",
            s.budget.total_budget,
            s.budget.spent_budget,
            s.budget.remaining_budget,
            s.budget.utilization
        ));
        lines.join("\n")
    }
}

/// Create a portfolio. The owner defaults to the acting user.
pub fn portfolio_create(ctx: &mut Context, input: NewPortfolio) -> Result<Created> {
    ctx.require(ResourceType::Portfolio, Action::Create)?;

    let owner_id = input
        .owner_id
        .and_then(non_empty)
        .or_else(|| ctx.actor_id().map(str::to_string))
        .ok_or_else(|| Error::InvalidInput("Portfolio owner is required".to_string()))?;

    let name = input.name.trim().to_string();
    let id = ctx.storage.next_id::<Portfolio>("pf", &name)?;
    let mut portfolio = Portfolio::new(id, name, owner_id);
    portfolio.description = input.description.and_then(non_empty);
    portfolio.total_budget = input.total_budget.unwrap_or_default();
    portfolio.allocated_budget = input.allocated_budget.unwrap_or_default();
    portfolio.resource_allocation.team_size = input.team_size.unwrap_or_default();
    portfolio.resource_allocation.utilization = input.utilization.unwrap_or_default();

    // Managers may only create portfolios they own.
    ctx.require_portfolio(&portfolio, Action::Create)?;
    ctx.storage.create_portfolio(&portfolio)?;

    info!(id = %portfolio.id, owner = %portfolio.owner_id, "created portfolio");
    Ok(Created {
        id: portfolio.id,
        kind: "portfolio",
        name: portfolio.name,
    })
}

/// List the portfolios the actor can see.
pub fn portfolio_list(ctx: &Context, owner_id: Option<&str>) -> Result<PortfolioList> {
    let portfolios: Vec<Portfolio> = ctx
        .storage
        .list_portfolios(owner_id)?
        .into_iter()
        .filter(|p| ctx.can_see_portfolio(p))
        .collect();
    let count = portfolios.len();
    Ok(PortfolioList { portfolios, count })
}

pub fn portfolio_show(ctx: &Context, id: &str) -> Result<PortfolioShow> {
    let portfolio = ctx.storage.get_portfolio(id)?;
    ctx.require_portfolio(&portfolio, Action::View)?;

    let project_ids = ctx
        .storage
        .list_projects(&ProjectFilter {
            portfolio_id: Some(id.to_string()),
            ..ProjectFilter::default()
        })?
        .into_iter()
        .filter(|p| ctx.can_see_project(p))
        .map(|p| p.id)
        .collect();

    Ok(PortfolioShow {
        portfolio,
        project_ids,
    })
}

pub fn portfolio_update(ctx: &mut Context, id: &str, update: PortfolioUpdate) -> Result<Updated> {
    let mut portfolio = ctx.storage.get_portfolio(id)?;
    ctx.require_portfolio(&portfolio, Action::Edit)?;

    let mut changes = FieldChanges::default();
    changes.set(
        "name",
        &mut portfolio.name,
        update.name.map(|n| n.trim().to_string()),
    );
    changes.set(
        "description",
        &mut portfolio.description,
        update.description.map(non_empty),
    );
    changes.set("owner_id", &mut portfolio.owner_id, update.owner_id);
    changes.set("health_score", &mut portfolio.health_score, update.health_score);
    changes.set("total_budget", &mut portfolio.total_budget, update.total_budget);
    changes.set(
        "allocated_budget",
        &mut portfolio.allocated_budget,
        update.allocated_budget,
    );
    let res = &mut portfolio.resource_allocation;
    changes.set("team_size", &mut res.team_size, update.team_size);
    changes.set("utilization", &mut res.utilization, update.utilization);
    changes.set("project_count", &mut res.project_count, update.project_count);

    if !changes.is_empty() {
        portfolio.updated_at = Utc::now();
        ctx.storage.update_portfolio(&portfolio)?;
        info!(id, "updated portfolio");
    }

    Ok(Updated {
        id: id.to_string(),
        kind: "portfolio",
        updated_fields: changes.into_vec(),
    })
}

/// Delete a portfolio. Refused while projects reference it.
pub fn portfolio_delete(ctx: &mut Context, id: &str) -> Result<Deleted> {
    let portfolio = ctx.storage.get_portfolio(id)?;
    ctx.require_portfolio(&portfolio, Action::Delete)?;
    ctx.storage.delete_portfolio(id)?;
    info!(id, "deleted portfolio");
    Ok(Deleted {
        id: id.to_string(),
        kind: "portfolio",
        cascaded: BTreeMap::new(),
    })
}

/// Recompute and store a portfolio's health from its projects.
pub fn portfolio_recompute_health(ctx: &mut Context, id: &str) -> Result<HealthRecomputed> {
    let before = ctx.storage.get_portfolio(id)?;
    ctx.require_portfolio(&before, Action::Edit)?;

    let after = ctx.storage.recompute_portfolio_health(id)?;
    let project_count = ctx
        .storage
        .list_projects(&ProjectFilter {
            portfolio_id: Some(id.to_string()),
            ..ProjectFilter::default()
        })?
        .len();

    Ok(HealthRecomputed {
        id: id.to_string(),
        previous_health_score: before.health_score,
        health_score: after.health_score,
        project_count,
        recomputed_at: after.health_recomputed_at,
    })
}

/// Aggregate a portfolio's projects without storing anything.
pub fn portfolio_stats(ctx: &Context, id: &str) -> Result<PortfolioStatsResult> {
    let portfolio = ctx.storage.get_portfolio(id)?;
    ctx.require_portfolio(&portfolio, Action::View)?;

    let projects = ctx.storage.list_projects(&ProjectFilter {
        portfolio_id: Some(id.to_string()),
        ..ProjectFilter::default()
    })?;
    let stats = PortfolioStats::from_projects(&projects);

    Ok(PortfolioStatsResult {
        id: portfolio.id,
        name: portfolio.name,
        stored_health_score: portfolio.health_score,
        stale: portfolio.health_score != stats.computed_health_score,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::*;
    use crate::models::{Project, Role};
    use crate::test_utils::TestEnv;

    fn input(name: &str) -> NewPortfolio {
        NewPortfolio {
            name: name.to_string(),
            ..NewPortfolio::default()
        }
    }

    #[test]
    fn test_create_defaults_owner_to_actor() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_user(&mut storage, "usr-0001", Role::PortfolioManager);
        let mut ctx = Context::new(&mut storage, Some("usr-0001")).unwrap();

        let created = portfolio_create(&mut ctx, input("Roads")).unwrap();
        let portfolio = ctx.storage.get_portfolio(&created.id).unwrap();
        assert_eq!(portfolio.owner_id, "usr-0001");
        assert_eq!(portfolio.health_score, 100.0);
    }

    #[test]
    fn test_operator_must_name_owner() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let mut ctx = Context::operator(&mut storage);
        assert!(matches!(
            portfolio_create(&mut ctx, input("Roads")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_manager_cannot_create_for_someone_else() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_user(&mut storage, "usr-0001", Role::PortfolioManager);
        add_user(&mut storage, "usr-0002", Role::PortfolioManager);
        let mut ctx = Context::new(&mut storage, Some("usr-0001")).unwrap();

        let mut new = input("Roads");
        new.owner_id = Some("usr-0002".to_string());
        assert!(matches!(
            portfolio_create(&mut ctx, new),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_officer_cannot_create() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_user(&mut storage, "usr-0001", Role::ProjectOfficer);
        let mut ctx = Context::new(&mut storage, Some("usr-0001")).unwrap();
        assert!(portfolio_create(&mut ctx, input("Roads")).is_err());
    }

    #[test]
    fn test_list_filters_by_ownership() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_user(&mut storage, "usr-0001", Role::PortfolioManager);
        add_user(&mut storage, "usr-0002", Role::PortfolioManager);
        add_user(&mut storage, "usr-0003", Role::Executive);
        add_portfolio(&mut storage, "pf-0001", "usr-0001");
        add_portfolio(&mut storage, "pf-0002", "usr-0002");

        {
            let ctx = Context::new(&mut storage, Some("usr-0001")).unwrap();
            let list = portfolio_list(&ctx, None).unwrap();
            assert_eq!(list.count, 1);
            assert_eq!(list.portfolios[0].id, "pf-0001");
            assert!(portfolio_show(&ctx, "pf-0002").is_err());
        }
        let ctx = Context::new(&mut storage, Some("usr-0003")).unwrap();
        assert_eq!(portfolio_list(&ctx, None).unwrap().count, 2);
    }

    #[test]
    fn test_delete_is_executive_only() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_user(&mut storage, "usr-0001", Role::PortfolioManager);
        add_user(&mut storage, "usr-0002", Role::Executive);
        add_portfolio(&mut storage, "pf-0001", "usr-0001");

        {
            let mut ctx = Context::new(&mut storage, Some("usr-0001")).unwrap();
            assert!(matches!(
                portfolio_delete(&mut ctx, "pf-0001"),
                Err(Error::PermissionDenied(_))
            ));
        }
        let mut ctx = Context::new(&mut storage, Some("usr-0002")).unwrap();
        portfolio_delete(&mut ctx, "pf-0001").unwrap();
    }

    #[test]
    fn test_stats_show_staleness_until_recompute() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_user(&mut storage, "usr-0001", Role::PortfolioManager);
        add_portfolio(&mut storage, "pf-0001", "usr-0001");
        for (id, budget, health) in [("prj-0001", 100.0, 90.0), ("prj-0002", 300.0, 50.0)] {
            let mut project = Project::new(id.to_string(), id.to_string());
            project.portfolio_id = Some("pf-0001".to_string());
            project.budget = budget;
            project.spent_budget = budget / 2.0;
            project.health_score = health;
            storage.create_project(&project).unwrap();
        }
        let mut ctx = Context::new(&mut storage, Some("usr-0001")).unwrap();

        let stats = portfolio_stats(&ctx, "pf-0001").unwrap();
        assert_eq!(stats.stored_health_score, 100.0);
        assert_eq!(stats.stats.computed_health_score, 60.0);
        assert!(stats.stale);
        assert_eq!(stats.stats.budget.utilization, 50.0);

        let recomputed = portfolio_recompute_health(&mut ctx, "pf-0001").unwrap();
        assert_eq!(recomputed.previous_health_score, 100.0);
        assert_eq!(recomputed.health_score, 60.0);
        assert_eq!(recomputed.project_count, 2);

        assert!(!portfolio_stats(&ctx, "pf-0001").unwrap().stale);
    }

    #[test]
    fn test_update_rejects_out_of_range_health() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_user(&mut storage, "usr-0001", Role::PortfolioManager);
        add_portfolio(&mut storage, "pf-0001", "usr-0001");
        let mut ctx = Context::operator(&mut storage);

        let result = portfolio_update(
            &mut ctx,
            "pf-0001",
            PortfolioUpdate {
                health_score: Some(150.0),
                ..PortfolioUpdate::default()
            },
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(ctx.storage.get_portfolio("pf-0001").unwrap().health_score, 100.0);
    }
}
