//! Role hierarchy and access decisions.
//!
//! Everything here is a pure function of the acting user and the record in
//! question. The caller passes the identity in explicitly; there is no
//! ambient "current user".
//!
//! Resource permissions are an explicit allow-list per (resource, action)
//! cell rather than a rank cutoff: project officers may view and edit
//! projects but not create or delete them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{Portfolio, Project, Role, User};
use crate::{Error, Result};

/// Kinds of resource guarded by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Project,
    Portfolio,
    Dashboard,
    Admin,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Project,
        ResourceType::Portfolio,
        ResourceType::Dashboard,
        ResourceType::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Project => "project",
            ResourceType::Portfolio => "portfolio",
            ResourceType::Dashboard => "dashboard",
            ResourceType::Admin => "admin",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "project" => Ok(ResourceType::Project),
            "portfolio" => Ok(ResourceType::Portfolio),
            "dashboard" => Ok(ResourceType::Dashboard),
            "admin" => Ok(ResourceType::Admin),
            _ => Err(Error::InvalidInput(format!("Invalid resource type: {}", s))),
        }
    }
}

/// Operations on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Edit,
    Delete,
    Create,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Edit, Action::Delete, Action::Create];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Create => "create",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "view" => Ok(Action::View),
            "edit" => Ok(Action::Edit),
            "delete" => Ok(Action::Delete),
            "create" => Ok(Action::Create),
            _ => Err(Error::InvalidInput(format!("Invalid action: {}", s))),
        }
    }
}

const EVERYONE: &[Role] = &[Role::Executive, Role::PortfolioManager, Role::ProjectOfficer];
const MANAGERS: &[Role] = &[Role::Executive, Role::PortfolioManager];
const EXECUTIVES: &[Role] = &[Role::Executive];

/// `true` if `actual` sits at or above `required` in the hierarchy.
pub fn has_role(actual: Role, required: Role) -> bool {
    actual.rank() >= required.rank()
}

/// Roles allowed to perform `action` on `resource`.
pub fn allowed_roles(resource: ResourceType, action: Action) -> &'static [Role] {
    use Action::*;
    use ResourceType::*;

    match (resource, action) {
        (Project, View | Edit) => EVERYONE,
        (Project, Delete | Create) => MANAGERS,
        (Portfolio, View | Edit | Create) => MANAGERS,
        (Portfolio, Delete) => EXECUTIVES,
        (Dashboard, View) => EVERYONE,
        (Dashboard, Edit | Create) => MANAGERS,
        (Dashboard, Delete) => EXECUTIVES,
        (Admin, _) => EXECUTIVES,
    }
}

pub fn can_access_resource(role: Role, resource: ResourceType, action: Action) -> bool {
    allowed_roles(resource, action).contains(&role)
}

fn owns(user: &User, owner_id: Option<&str>) -> bool {
    match owner_id {
        Some(owner) => !user.id.is_empty() && owner == user.id,
        None => false,
    }
}

/// Executives and portfolio managers see every project; officers only their own.
pub fn can_view_project(user: Option<&User>, project: &Project) -> bool {
    let Some(user) = user else {
        return false;
    };
    match user.role {
        Role::Executive | Role::PortfolioManager => true,
        Role::ProjectOfficer => owns(user, project.owner_id.as_deref()),
    }
}

pub fn can_edit_project(user: Option<&User>, project: &Project) -> bool {
    can_view_project(user, project)
}

/// Executives see every portfolio, managers their own, officers none.
pub fn can_view_portfolio(user: Option<&User>, portfolio: &Portfolio) -> bool {
    let Some(user) = user else {
        return false;
    };
    match user.role {
        Role::Executive => true,
        Role::PortfolioManager => owns(user, Some(portfolio.owner_id.as_str())),
        Role::ProjectOfficer => false,
    }
}

pub fn can_edit_portfolio(user: Option<&User>, portfolio: &Portfolio) -> bool {
    can_view_portfolio(user, portfolio)
}

/// Landing view for each role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    ExecutiveOverview,
    PortfolioDashboard,
    ProjectWorkspace,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            View::ExecutiveOverview => "executive-overview",
            View::PortfolioDashboard => "portfolio-dashboard",
            View::ProjectWorkspace => "project-workspace",
        };
        f.write_str(s)
    }
}

pub fn default_view(role: Role) -> View {
    match role {
        Role::Executive => View::ExecutiveOverview,
        Role::PortfolioManager => View::PortfolioDashboard,
        Role::ProjectOfficer => View::ProjectWorkspace,
    }
}

/// Navigation entries offered to each role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MenuItem {
    Dashboard,
    Portfolios,
    Projects,
    Risks,
    Compliance,
    Reports,
    Users,
}

impl MenuItem {
    pub fn as_str(self) -> &'static str {
        match self {
            MenuItem::Dashboard => "dashboard",
            MenuItem::Portfolios => "portfolios",
            MenuItem::Projects => "projects",
            MenuItem::Risks => "risks",
            MenuItem::Compliance => "compliance",
            MenuItem::Reports => "reports",
            MenuItem::Users => "users",
        }
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn menu_items(role: Role) -> &'static [MenuItem] {
    use MenuItem::*;

    match role {
        Role::Executive => &[
            Dashboard, Portfolios, Projects, Risks, Compliance, Reports, Users,
        ],
        Role::PortfolioManager => &[Dashboard, Portfolios, Projects, Risks, Compliance, Reports],
        Role::ProjectOfficer => &[Dashboard, Projects, Risks, Compliance],
    }
}
