//! Project commands, including timeline milestones.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use super::{Context, Created, Deleted, FieldChanges, Output, Updated, json, non_empty};
use crate::access::{Action, ResourceType};
use crate::models::{
    Milestone, MilestoneStatus, Project, ProjectStatus, RiskLevel, normalize_tag, parse_date,
};
use crate::storage::ProjectFilter;
use crate::{Error, Result};

/// Fields accepted by `project create`.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub budget: Option<f64>,
    pub spent_budget: Option<f64>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub portfolio_id: Option<String>,
    pub owner_id: Option<String>,
    pub health_score: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub tags: Vec<String>,
}

/// Fields accepted by `project update`. `None` leaves a field untouched;
/// `Some("")` clears an optional text or reference field.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub budget: Option<f64>,
    pub spent_budget: Option<f64>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub portfolio_id: Option<String>,
    pub owner_id: Option<String>,
    pub health_score: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
}

impl Output for Project {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("{} {} [{}]", self.id, self.name, self.status)];
        if let Some(ref desc) = self.description {
            lines.push(format!("  {}", desc));
        }
        if let Some(ref pf) = self.portfolio_id {
            lines.push(format!("  Portfolio: {}", pf));
        }
        if let Some(ref owner) = self.owner_id {
            lines.push(format!("  Owner: {}", owner));
        }
        lines.push(format!(
            "  Health: {:.2}  Risk level: {}",
            self.health_score, self.risk_level
        ));
        lines.push(format!(
            "  Budget: {:.2} ({:.2} spent)",
            self.budget, self.spent_budget
        ));
        match (self.timeline.start, self.timeline.end) {
            (None, None) => {}
            (start, end) => lines.push(format!(
                "  Timeline: {} to {}",
                start.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string()),
                end.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string())
            )),
        }
        if !self.timeline.milestones.is_empty() {
            lines.push("  Milestones:".to_string());
            for m in &self.timeline.milestones {
                lines.push(format!("    {} {} [{}]", m.date, m.name, m.status));
            }
        }
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
            lines.push(format!("  Tags: {}", tags.join(", ")));
        }
        lines.join("\n")
    }
}

#[derive(Serialize)]
pub struct ProjectList {
    pub projects: Vec<Project>,
    pub count: usize,
}

impl Output for ProjectList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.projects.is_empty() {
            return "No projects found.".to_string();
        }
        let mut lines = vec![format!("{} project(s):", self.count)];
        for p in &self.projects {
            lines.push(format!(
                "  {} {} [{}] health {:.2}",
                p.id, p.name, p.status, p.health_score
            ));
        }
        lines.join("\n")
    }
}

/// Result of a milestone change.
#[derive(Serialize)]
pub struct MilestoneResult {
    pub project_id: String,
    pub milestone: Milestone,
    pub milestones: usize,
}

impl Output for MilestoneResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "{}: milestone \"{}\" on {} is {} ({} total)",
            self.project_id,
            self.milestone.name,
            self.milestone.date,
            self.milestone.status,
            self.milestones
        )
    }
}

fn optional_date(value: Option<String>) -> Result<Option<NaiveDate>> {
    match value.and_then(non_empty) {
        Some(s) => Ok(Some(parse_date(s.trim())?)),
        None => Ok(None),
    }
}

fn clean_tags(tags: Vec<String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| normalize_tag(&t))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Create a project.
pub fn project_create(ctx: &mut Context, input: NewProject) -> Result<Created> {
    ctx.require(ResourceType::Project, Action::Create)?;

    let name = input.name.trim().to_string();
    let id = ctx.storage.next_id::<Project>("prj", &name)?;
    let mut project = Project::new(id, name);
    project.description = input.description.and_then(non_empty);
    project.status = input.status.unwrap_or_default();
    project.budget = input.budget.unwrap_or_default();
    project.spent_budget = input.spent_budget.unwrap_or_default();
    project.timeline.start = optional_date(input.start)?;
    project.timeline.end = optional_date(input.end)?;
    project.portfolio_id = input.portfolio_id.and_then(non_empty);
    project.owner_id = input.owner_id.and_then(non_empty);
    if let Some(health) = input.health_score {
        project.health_score = health;
    }
    project.risk_level = input.risk_level.unwrap_or_default();
    project.tags = clean_tags(input.tags);

    ctx.storage.create_project(&project)?;
    info!(id = %project.id, portfolio = ?project.portfolio_id, "created project");
    Ok(Created {
        id: project.id,
        kind: "project",
        name: project.name,
    })
}

/// List the projects the actor can see, narrowed by `filter`.
pub fn project_list(ctx: &Context, filter: &ProjectFilter) -> Result<ProjectList> {
    let projects: Vec<Project> = ctx
        .storage
        .list_projects(filter)?
        .into_iter()
        .filter(|p| ctx.can_see_project(p))
        .collect();
    let count = projects.len();
    Ok(ProjectList { projects, count })
}

pub fn project_show(ctx: &Context, id: &str) -> Result<Project> {
    let project = ctx.storage.get_project(id)?;
    ctx.require_project(&project, Action::View)?;
    Ok(project)
}

pub fn project_update(ctx: &mut Context, id: &str, update: ProjectUpdate) -> Result<Updated> {
    let mut project = ctx.storage.get_project(id)?;
    ctx.require_project(&project, Action::Edit)?;

    let mut changes = FieldChanges::default();
    changes.set(
        "name",
        &mut project.name,
        update.name.map(|n| n.trim().to_string()),
    );
    changes.set(
        "description",
        &mut project.description,
        update.description.map(non_empty),
    );
    changes.set("status", &mut project.status, update.status);
    changes.set("budget", &mut project.budget, update.budget);
    changes.set("spent_budget", &mut project.spent_budget, update.spent_budget);
    if update.start.is_some() {
        project.timeline.start = optional_date(update.start)?;
        changes.touched("start");
    }
    if update.end.is_some() {
        project.timeline.end = optional_date(update.end)?;
        changes.touched("end");
    }
    changes.set(
        "portfolio_id",
        &mut project.portfolio_id,
        update.portfolio_id.map(non_empty),
    );
    changes.set(
        "owner_id",
        &mut project.owner_id,
        update.owner_id.map(non_empty),
    );
    changes.set("health_score", &mut project.health_score, update.health_score);
    changes.set("risk_level", &mut project.risk_level, update.risk_level);

    let before = project.tags.clone();
    project.tags.extend(clean_tags(update.add_tags));
    for tag in clean_tags(update.remove_tags) {
        project.tags.remove(&tag);
    }
    if project.tags != before {
        changes.touched("tags");
    }

    if !changes.is_empty() {
        project.updated_at = Utc::now();
        ctx.storage.update_project(&project)?;
        info!(id, "updated project");
    }

    Ok(Updated {
        id: id.to_string(),
        kind: "project",
        updated_fields: changes.into_vec(),
    })
}

/// Delete a project along with its risks and evaluations.
pub fn project_delete(ctx: &mut Context, id: &str) -> Result<Deleted> {
    let project = ctx.storage.get_project(id)?;
    ctx.require_project(&project, Action::Delete)?;

    let removed = ctx.storage.delete_project(id)?;
    let mut cascaded = BTreeMap::new();
    cascaded.insert("risk", removed.risks_removed);
    cascaded.insert("evaluation", removed.evaluations_removed);
    Ok(Deleted {
        id: id.to_string(),
        kind: "project",
        cascaded,
    })
}

/// Add a milestone to a project's timeline, keeping date order.
pub fn project_milestone_add(
    ctx: &mut Context,
    id: &str,
    name: String,
    date: &str,
    status: Option<MilestoneStatus>,
) -> Result<MilestoneResult> {
    let mut project = ctx.storage.get_project(id)?;
    ctx.require_project(&project, Action::Edit)?;

    let milestone = Milestone {
        name: name.trim().to_string(),
        date: parse_date(date.trim())?,
        status: status.unwrap_or_default(),
    };
    if project
        .timeline
        .milestones
        .iter()
        .any(|m| m.name.eq_ignore_ascii_case(&milestone.name))
    {
        return Err(Error::Conflict(format!(
            "Project {} already has a milestone named '{}'",
            id, milestone.name
        )));
    }

    project.timeline.add_milestone(milestone.clone());
    project.updated_at = Utc::now();
    ctx.storage.update_project(&project)?;
    info!(id, milestone = %milestone.name, "added milestone");

    Ok(MilestoneResult {
        project_id: project.id,
        milestone,
        milestones: project.timeline.milestones.len(),
    })
}

/// Set the status of a named milestone.
pub fn project_milestone_status(
    ctx: &mut Context,
    id: &str,
    name: &str,
    status: MilestoneStatus,
) -> Result<MilestoneResult> {
    let mut project = ctx.storage.get_project(id)?;
    ctx.require_project(&project, Action::Edit)?;

    let milestone = project
        .timeline
        .milestones
        .iter_mut()
        .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| Error::NotFound(format!("Milestone '{}' on project {}", name, id)))?;
    milestone.status = status;
    let milestone = milestone.clone();

    project.updated_at = Utc::now();
    ctx.storage.update_project(&project)?;
    info!(id, milestone = %milestone.name, %status, "updated milestone");

    Ok(MilestoneResult {
        project_id: project.id,
        milestone,
        milestones: project.timeline.milestones.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::*;
    use crate::models::{Risk, Role};
    use crate::test_utils::TestEnv;

    fn input(name: &str) -> NewProject {
        NewProject {
            name: name.to_string(),
            ..NewProject::default()
        }
    }

    #[test]
    fn test_create_with_timeline_and_tags() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let mut ctx = Context::operator(&mut storage);

        let mut new = input("Bridge");
        new.start = Some("2026-01-01".to_string());
        new.end = Some("2026-12-31".to_string());
        new.tags = vec!["Infra".to_string(), " infra ".to_string(), "roads".to_string()];
        let created = project_create(&mut ctx, new).unwrap();

        let project = project_show(&ctx, &created.id).unwrap();
        assert_eq!(project.timeline.start, Some(parse_date("2026-01-01").unwrap()));
        assert_eq!(project.tags.len(), 2);
        assert!(project.tags.contains("infra"));
    }

    #[test]
    fn test_create_rejects_inverted_timeline() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let mut ctx = Context::operator(&mut storage);

        let mut new = input("Bridge");
        new.start = Some("2026-06-01".to_string());
        new.end = Some("2026-01-01".to_string());
        assert!(matches!(
            project_create(&mut ctx, new),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_officer_cannot_create_or_delete() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_user(&mut storage, "usr-0001", Role::ProjectOfficer);
        add_project(&mut storage, "prj-0001", None, Some("usr-0001"));
        let mut ctx = Context::new(&mut storage, Some("usr-0001")).unwrap();

        assert!(matches!(
            project_create(&mut ctx, input("Bridge")),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            project_delete(&mut ctx, "prj-0001"),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_officer_updates_own_project_only() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_user(&mut storage, "usr-0001", Role::ProjectOfficer);
        add_project(&mut storage, "prj-0001", None, Some("usr-0001"));
        add_project(&mut storage, "prj-0002", None, None);
        let mut ctx = Context::new(&mut storage, Some("usr-0001")).unwrap();

        let update = ProjectUpdate {
            status: Some(ProjectStatus::AtRisk),
            ..ProjectUpdate::default()
        };
        let result = project_update(&mut ctx, "prj-0001", update.clone()).unwrap();
        assert_eq!(result.updated_fields, vec!["status"]);
        assert!(project_update(&mut ctx, "prj-0002", update).is_err());

        let list = project_list(&ctx, &ProjectFilter::default()).unwrap();
        assert_eq!(list.count, 1);
    }

    #[test]
    fn test_update_tags_and_clear_owner() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_user(&mut storage, "usr-0001", Role::ProjectOfficer);
        add_project(&mut storage, "prj-0001", None, Some("usr-0001"));
        let mut ctx = Context::operator(&mut storage);

        project_update(
            &mut ctx,
            "prj-0001",
            ProjectUpdate {
                add_tags: vec!["roads".to_string(), "urgent".to_string()],
                ..ProjectUpdate::default()
            },
        )
        .unwrap();
        let result = project_update(
            &mut ctx,
            "prj-0001",
            ProjectUpdate {
                owner_id: Some(String::new()),
                remove_tags: vec!["urgent".to_string()],
                ..ProjectUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(result.updated_fields, vec!["owner_id", "tags"]);

        let project = ctx.storage.get_project("prj-0001").unwrap();
        assert_eq!(project.owner_id, None);
        assert_eq!(project.tags.iter().collect::<Vec<_>>(), vec!["roads"]);
    }

    #[test]
    fn test_update_requires_existing_portfolio() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_project(&mut storage, "prj-0001", None, None);
        let mut ctx = Context::operator(&mut storage);

        let result = project_update(
            &mut ctx,
            "prj-0001",
            ProjectUpdate {
                portfolio_id: Some("pf-ffff".to_string()),
                ..ProjectUpdate::default()
            },
        );
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_delete_reports_cascade() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_project(&mut storage, "prj-0001", None, None);
        let risk = Risk::new(
            "rsk-0001".to_string(),
            "prj-0001".to_string(),
            "Vendor exit".to_string(),
        );
        storage.create_risk(&risk).unwrap();
        let mut ctx = Context::operator(&mut storage);

        let deleted = project_delete(&mut ctx, "prj-0001").unwrap();
        assert_eq!(deleted.cascaded["risk"], 1);
        assert_eq!(deleted.cascaded["evaluation"], 0);
        assert!(ctx.storage.get_risk("rsk-0001").is_err());
    }

    #[test]
    fn test_milestones_stay_ordered() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_project(&mut storage, "prj-0001", None, None);
        let mut ctx = Context::operator(&mut storage);

        project_milestone_add(&mut ctx, "prj-0001", "Launch".to_string(), "2026-06-01", None)
            .unwrap();
        project_milestone_add(&mut ctx, "prj-0001", "Kickoff".to_string(), "2026-01-15", None)
            .unwrap();
        let dup =
            project_milestone_add(&mut ctx, "prj-0001", "launch".to_string(), "2026-07-01", None);
        assert!(matches!(dup, Err(Error::Conflict(_))));

        let result =
            project_milestone_status(&mut ctx, "prj-0001", "kickoff", MilestoneStatus::Completed)
                .unwrap();
        assert_eq!(result.milestone.status, MilestoneStatus::Completed);
        assert_eq!(result.milestones, 2);

        let project = ctx.storage.get_project("prj-0001").unwrap();
        let names: Vec<&str> = project
            .timeline
            .milestones
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["Kickoff", "Launch"]);
    }

    #[test]
    fn test_unknown_milestone_is_not_found() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        add_project(&mut storage, "prj-0001", None, None);
        let mut ctx = Context::operator(&mut storage);
        assert!(matches!(
            project_milestone_status(&mut ctx, "prj-0001", "nope", MilestoneStatus::Delayed),
            Err(Error::NotFound(_))
        ));
    }
}
