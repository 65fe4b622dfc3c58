//! Access policy queries.

use serde::Serialize;

use super::{Context, Output, json};
use crate::access::{Action, ResourceType, allowed_roles, can_access_resource};
use crate::models::Role;
use crate::{Error, Result};

#[derive(Serialize)]
pub struct AccessDecision {
    pub role: Role,
    pub resource: ResourceType,
    pub action: Action,
    pub allowed: bool,
    /// Every role allowed in this cell
    pub allowed_roles: Vec<Role>,
}

impl Output for AccessDecision {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let roles: Vec<&str> = self.allowed_roles.iter().map(|r| r.as_str()).collect();
        format!(
            "{} {} {} {}: {}\n  allowed roles: {}",
            self.role,
            if self.allowed { "may" } else { "may not" },
            self.action,
            self.resource,
            if self.allowed { "allowed" } else { "denied" },
            roles.join(", ")
        )
    }
}

/// Permissions of one role across every resource and action.
#[derive(Serialize)]
pub struct RolePermissions {
    pub role: Role,
    pub rank: u8,
    /// resource -> allowed actions
    pub permissions: Vec<ResourcePermissions>,
}

#[derive(Serialize)]
pub struct ResourcePermissions {
    pub resource: ResourceType,
    pub actions: Vec<Action>,
}

#[derive(Serialize)]
pub struct AccessMatrix {
    pub roles: Vec<RolePermissions>,
}

impl Output for AccessMatrix {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        for entry in &self.roles {
            lines.push(format!("{} (rank {})", entry.role, entry.rank));
            for perm in &entry.permissions {
                let actions: Vec<&str> = perm.actions.iter().map(|a| a.as_str()).collect();
                let actions = if actions.is_empty() {
                    "-".to_string()
                } else {
                    actions.join(", ")
                };
                lines.push(format!("  {:<10} {}", perm.resource.as_str(), actions));
            }
        }
        lines.join("\n")
    }
}

fn resolve_role(ctx: &Context, role: Option<Role>) -> Result<Role> {
    role.or_else(|| ctx.actor().map(|u| u.role)).ok_or_else(|| {
        Error::InvalidInput("No acting user; pass --role to choose one".to_string())
    })
}

/// Answer whether `role` (default: the actor's) may perform `action` on
/// `resource`.
pub fn access_check(
    ctx: &Context,
    role: Option<Role>,
    resource: ResourceType,
    action: Action,
) -> Result<AccessDecision> {
    let role = resolve_role(ctx, role)?;
    Ok(AccessDecision {
        role,
        resource,
        action,
        allowed: can_access_resource(role, resource, action),
        allowed_roles: allowed_roles(resource, action).to_vec(),
    })
}

/// The full permission table, or one role's row of it.
pub fn access_matrix(role: Option<Role>) -> AccessMatrix {
    let roles: Vec<Role> = match role {
        Some(role) => vec![role],
        None => Role::ALL.to_vec(),
    };
    let roles = roles
        .into_iter()
        .map(|role| RolePermissions {
            role,
            rank: role.rank(),
            permissions: ResourceType::ALL
                .iter()
                .map(|&resource| ResourcePermissions {
                    resource,
                    actions: Action::ALL
                        .iter()
                        .copied()
                        .filter(|&action| can_access_resource(role, resource, action))
                        .collect(),
                })
                .collect(),
        })
        .collect();
    AccessMatrix { roles }
}
