//! User commands. Managing users is an admin operation; anyone may view
//! their own record.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use super::{Context, Created, Deleted, FieldChanges, Output, Updated, json, non_empty};
use crate::Result;
use crate::access::{Action, ResourceType};
use crate::models::{Role, User};

/// Fields accepted by `user update`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    /// `Some("")` clears the department
    pub department: Option<String>,
}

impl Output for User {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("{} {}", self.id, self.name),
            format!("  Email: {}", self.email),
            format!("  Role: {}", self.role),
        ];
        if let Some(ref dept) = self.department {
            lines.push(format!("  Department: {}", dept));
        }
        lines.push(format!(
            "  Created: {}",
            self.created_at.format("%Y-%m-%d %H:%M")
        ));
        lines.join("\n")
    }
}

#[derive(Serialize)]
pub struct UserList {
    pub users: Vec<User>,
    pub count: usize,
}

impl Output for UserList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.users.is_empty() {
            return "No users found.".to_string();
        }
        let mut lines = vec![format!("{} user(s):", self.count)];
        for user in &self.users {
            let dept = user
                .department
                .as_deref()
                .map(|d| format!(" [{}]", d))
                .unwrap_or_default();
            lines.push(format!(
                "  {} {} <{}> {}{}",
                user.id, user.name, user.email, user.role, dept
            ));
        }
        lines.join("\n")
    }
}

/// Create a user.
pub fn user_create(
    ctx: &mut Context,
    name: String,
    email: String,
    role: Role,
    department: Option<String>,
) -> Result<Created> {
    ctx.require(ResourceType::Admin, Action::Create)?;

    let email = email.trim().to_string();
    let id = ctx.storage.next_id::<User>("usr", &email)?;
    let mut user = User::new(id, name.trim().to_string(), email, role);
    user.department = department.and_then(non_empty);
    ctx.storage.create_user(&user)?;

    info!(id = %user.id, role = %user.role, "created user");
    Ok(Created {
        id: user.id,
        kind: "user",
        name: user.name,
    })
}

/// List users. Non-admin actors only ever see themselves.
pub fn user_list(
    ctx: &Context,
    role: Option<Role>,
    department: Option<&str>,
) -> Result<UserList> {
    let mut users = ctx.storage.list_users(role, department)?;
    if !ctx.allows(ResourceType::Admin, Action::View) {
        let own = ctx.actor_id().unwrap_or_default().to_string();
        users.retain(|u| u.id == own);
    }
    let count = users.len();
    Ok(UserList { users, count })
}

/// Show a user.
pub fn user_show(ctx: &Context, id: &str) -> Result<User> {
    if ctx.actor_id() != Some(id) {
        ctx.require(ResourceType::Admin, Action::View)?;
    }
    ctx.storage.get_user(id)
}

/// Update a user's fields.
pub fn user_update(ctx: &mut Context, id: &str, update: UserUpdate) -> Result<Updated> {
    ctx.require(ResourceType::Admin, Action::Edit)?;

    let mut user = ctx.storage.get_user(id)?;
    let mut changes = FieldChanges::default();
    changes.set("name", &mut user.name, update.name.map(|n| n.trim().to_string()));
    changes.set(
        "email",
        &mut user.email,
        update.email.map(|e| e.trim().to_string()),
    );
    changes.set("role", &mut user.role, update.role);
    changes.set(
        "department",
        &mut user.department,
        update.department.map(non_empty),
    );

    if !changes.is_empty() {
        user.updated_at = chrono::Utc::now();
        ctx.storage.update_user(&user)?;
        info!(id, "updated user");
    }

    Ok(Updated {
        id: id.to_string(),
        kind: "user",
        updated_fields: changes.into_vec(),
    })
}

/// Delete a user. Refused while the user owns projects or portfolios.
pub fn user_delete(ctx: &mut Context, id: &str) -> Result<Deleted> {
    ctx.require(ResourceType::Admin, Action::Delete)?;
    ctx.storage.delete_user(id)?;
    info!(id, "deleted user");
    Ok(Deleted {
        id: id.to_string(),
        kind: "user",
        cascaded: BTreeMap::new(),
    })
}
