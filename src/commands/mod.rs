//! Command implementations for the pmo CLI and API.
//!
//! Each command takes a [`Context`] (storage plus the acting user) and
//! returns a value implementing [`Output`]. Commands are organized by
//! entity type:
//! - `system` - storage init, status, cache rebuild and compaction
//! - `users` - user CRUD
//! - `portfolios` - portfolio CRUD, health recompute and stats
//! - `projects` - project CRUD and milestones
//! - `risks` - risk CRUD and summaries
//! - `compliance` - PMI standards, evaluations and summaries
//! - `dashboard` - role-based dashboard composition
//! - `access` - the permission table
//! - `config` - config.kdl get/set/list
//!
//! With no acting user the caller is the local operator and every check
//! passes. A named actor is checked on every operation; list commands
//! silently drop what the actor may not view.

pub mod access;
pub mod compliance;
pub mod config;
pub mod dashboard;
pub mod portfolios;
pub mod projects;
pub mod risks;
pub mod system;
pub mod users;

pub use access::*;
pub use compliance::*;
pub use config::*;
pub use dashboard::*;
pub use portfolios::*;
pub use projects::*;
pub use risks::*;
pub use system::*;
pub use users::*;

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::access::{
    Action, ResourceType, can_access_resource, can_edit_portfolio, can_edit_project,
    can_view_portfolio, can_view_project,
};
use crate::models::{Portfolio, Project, User};
use crate::storage::{ProjectFilter, Storage};
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Storage handle plus the identity a command runs as.
pub struct Context<'a> {
    pub storage: &'a mut Storage,
    actor: Option<User>,
}

impl<'a> Context<'a> {
    /// Act as the local operator, outside the access policy.
    pub fn operator(storage: &'a mut Storage) -> Self {
        Self {
            storage,
            actor: None,
        }
    }

    /// Act as `actor_id`, or as the operator when `None`.
    ///
    /// An ID that names no user is refused rather than downgraded.
    pub fn new(storage: &'a mut Storage, actor_id: Option<&str>) -> Result<Self> {
        let actor = match actor_id {
            Some(id) => Some(storage.get_user(id).map_err(|e| match e {
                Error::NotFound(_) => {
                    warn!(actor = id, "unknown acting user");
                    Error::PermissionDenied(format!("unknown acting user {}", id))
                }
                other => other,
            })?),
            None => None,
        };
        Ok(Self { storage, actor })
    }

    pub fn actor(&self) -> Option<&User> {
        self.actor.as_ref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor.as_ref().map(|u| u.id.as_str())
    }

    fn deny(&self, message: String) -> Error {
        warn!(actor = self.actor_id().unwrap_or("operator"), %message, "access denied");
        Error::PermissionDenied(message)
    }

    /// Whether the actor's role allows `action` on `resource`, without
    /// logging a denial.
    pub fn allows(&self, resource: ResourceType, action: Action) -> bool {
        match self.actor() {
            None => true,
            Some(actor) => can_access_resource(actor.role, resource, action),
        }
    }

    /// Require the actor's role to allow `action` on `resource`.
    pub fn require(&self, resource: ResourceType, action: Action) -> Result<()> {
        let Some(actor) = self.actor() else {
            return Ok(());
        };
        if can_access_resource(actor.role, resource, action) {
            Ok(())
        } else {
            Err(self.deny(format!(
                "{} may not {} {}",
                actor.role, action, resource
            )))
        }
    }

    /// Require `action` on a specific project, including ownership scope.
    pub fn require_project(&self, project: &Project, action: Action) -> Result<()> {
        self.require(ResourceType::Project, action)?;
        let allowed = match action {
            Action::View => can_view_project(self.actor(), project),
            _ => can_edit_project(self.actor(), project),
        };
        if self.actor().is_none() || allowed {
            Ok(())
        } else {
            Err(self.deny(format!("no {} access to project {}", action, project.id)))
        }
    }

    /// Require `action` on a specific portfolio, including ownership scope.
    pub fn require_portfolio(&self, portfolio: &Portfolio, action: Action) -> Result<()> {
        self.require(ResourceType::Portfolio, action)?;
        let allowed = match action {
            Action::View => can_view_portfolio(self.actor(), portfolio),
            _ => can_edit_portfolio(self.actor(), portfolio),
        };
        if self.actor().is_none() || allowed {
            Ok(())
        } else {
            Err(self.deny(format!(
                "no {} access to portfolio {}",
                action, portfolio.id
            )))
        }
    }

    /// Whether the actor may see `project`. Used to filter lists.
    pub fn can_see_project(&self, project: &Project) -> bool {
        match self.actor() {
            None => true,
            Some(actor) => {
                can_access_resource(actor.role, ResourceType::Project, Action::View)
                    && can_view_project(Some(actor), project)
            }
        }
    }

    /// Whether the actor may see `portfolio`. Used to filter lists.
    pub fn can_see_portfolio(&self, portfolio: &Portfolio) -> bool {
        match self.actor() {
            None => true,
            Some(actor) => {
                can_access_resource(actor.role, ResourceType::Portfolio, Action::View)
                    && can_view_portfolio(Some(actor), portfolio)
            }
        }
    }

    /// Every project the actor may view.
    pub fn visible_projects(&self) -> Result<Vec<Project>> {
        let projects = self.storage.list_projects(&Default::default())?;
        Ok(projects
            .into_iter()
            .filter(|p| self.can_see_project(p))
            .collect())
    }
}

/// Which projects a summary covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Project(String),
    Portfolio(String),
    Standard(String),
    All,
}

impl Scope {
    /// Build a scope from at most one of the given IDs.
    pub fn from_ids(
        project: Option<String>,
        portfolio: Option<String>,
        standard: Option<String>,
    ) -> Result<Self> {
        match (project, portfolio, standard) {
            (None, None, None) => Ok(Scope::All),
            (Some(id), None, None) => Ok(Scope::Project(id)),
            (None, Some(id), None) => Ok(Scope::Portfolio(id)),
            (None, None, Some(id)) => Ok(Scope::Standard(id)),
            _ => Err(Error::InvalidInput(
                "Choose at most one of --project, --portfolio, --standard".to_string(),
            )),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Scope::Project(id) => format!("project {}", id),
            Scope::Portfolio(id) => format!("portfolio {}", id),
            Scope::Standard(id) => format!("standard {}", id),
            Scope::All => "all visible projects".to_string(),
        }
    }
}

/// Projects in `scope` that the actor may view.
///
/// A named project must itself be viewable; a named portfolio must exist
/// and contributes only the projects the actor can see.
pub(crate) fn scoped_projects(ctx: &Context, scope: &Scope) -> Result<Vec<Project>> {
    match scope {
        Scope::Project(id) => {
            let project = ctx.storage.get_project(id)?;
            ctx.require_project(&project, Action::View)?;
            Ok(vec![project])
        }
        Scope::Portfolio(id) => {
            ctx.storage.get_portfolio(id)?;
            Ok(ctx
                .storage
                .list_projects(&ProjectFilter {
                    portfolio_id: Some(id.clone()),
                    ..ProjectFilter::default()
                })?
                .into_iter()
                .filter(|p| ctx.can_see_project(p))
                .collect())
        }
        Scope::Standard(_) | Scope::All => ctx.visible_projects(),
    }
}

/// Serialize any result to compact JSON, falling back to `{}`.
pub(crate) fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

/// Treat an empty or blank string as "unset".
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Result of a create command.
#[derive(Serialize)]
pub struct Created {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
}

impl Output for Created {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Created {} {} \"{}\"", self.kind, self.id, self.name)
    }
}

/// Result of an update command.
#[derive(Serialize)]
pub struct Updated {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub updated_fields: Vec<String>,
}

impl Output for Updated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.updated_fields.is_empty() {
            format!("No changes to {} {}", self.kind, self.id)
        } else {
            format!(
                "Updated {} {}: {}",
                self.kind,
                self.id,
                self.updated_fields.join(", ")
            )
        }
    }
}

/// Result of a delete command.
#[derive(Serialize)]
pub struct Deleted {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Dependent records removed alongside, by kind
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cascaded: BTreeMap<&'static str, usize>,
}

impl Output for Deleted {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!("Deleted {} {}", self.kind, self.id);
        for (kind, count) in &self.cascaded {
            if *count > 0 {
                out.push_str(&format!("\n  also removed {} {}(s)", count, kind));
            }
        }
        out
    }
}

/// Track which fields an update touched.
#[derive(Default)]
pub(crate) struct FieldChanges(Vec<String>);

impl FieldChanges {
    pub(crate) fn set<T>(&mut self, field: &str, target: &mut T, value: Option<T>) {
        if let Some(value) = value {
            *target = value;
            self.0.push(field.to_string());
        }
    }

    pub(crate) fn touched(&mut self, field: &str) {
        self.0.push(field.to_string());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn into_vec(self) -> Vec<String> {
        self.0
    }
}
