//! System commands: storage setup, status and maintenance.

use serde::Serialize;
use std::path::Path;
use tracing::info;

use super::{Context, Output, json};
use crate::Result;
use crate::access::{Action, ResourceType};
use crate::storage::{CompactStats, Storage, StoreCounts, get_storage_dir, storage_dir_in};

#[derive(Serialize)]
pub struct InitResult {
    pub workspace: String,
    pub data_dir: String,
    /// False when storage already existed
    pub created: bool,
}

impl Output for InitResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.created {
            format!("Initialized pmo storage at {}", self.data_dir)
        } else {
            format!("pmo storage already initialized at {}", self.data_dir)
        }
    }
}

#[derive(Serialize)]
pub struct Status {
    pub workspace: String,
    pub initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<StoreCounts>,
}

impl Output for Status {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if !self.initialized {
            return format!(
                "pmo is not initialized for {}\nRun `pmo system init` to get started.",
                self.workspace
            );
        }
        let mut lines = vec![format!("Workspace: {}", self.workspace)];
        if let Some(ref dir) = self.data_dir {
            lines.push(format!("Data: {}", dir));
        }
        if let Some(ref actor) = self.actor {
            lines.push(format!("Acting as: {}", actor));
        }
        if let Some(ref c) = self.counts {
            lines.push(format!(
                "Records: {} users, {} portfolios, {} projects, {} risks, {} standards, {} evaluations",
                c.users, c.portfolios, c.projects, c.risks, c.standards, c.evaluations
            ));
        }
        lines.join("\n")
    }
}

#[derive(Serialize)]
pub struct RebuildResult {
    pub counts: StoreCounts,
}

impl Output for RebuildResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let c = &self.counts;
        format!(
            "Rebuilt cache: {} users, {} portfolios, {} projects, {} risks, {} standards, {} evaluations",
            c.users, c.portfolios, c.projects, c.risks, c.standards, c.evaluations
        )
    }
}

impl Output for CompactStats {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Compacted storage: {} lines -> {} lines",
            self.lines_before, self.lines_after
        )
    }
}

/// Create storage for `workspace`, or report that it already exists.
///
/// `data_dir` overrides the base data directory.
pub fn system_init(workspace: &Path, data_dir: Option<&Path>) -> Result<InitResult> {
    let root = match data_dir {
        Some(dir) => storage_dir_in(workspace, dir)?,
        None => get_storage_dir(workspace)?,
    };
    let created = !root.join("cache.db").exists();
    if created {
        match data_dir {
            Some(dir) => Storage::init_with_data_dir(workspace, dir)?,
            None => Storage::init(workspace)?,
        };
        info!(workspace = %workspace.display(), root = %root.display(), "initialized storage");
    }
    Ok(InitResult {
        workspace: workspace.display().to_string(),
        data_dir: root.display().to_string(),
        created,
    })
}

/// Describe the workspace. `ctx` is `None` when it is not initialized.
pub fn system_status(workspace: &Path, ctx: Option<&Context>) -> Result<Status> {
    let Some(ctx) = ctx else {
        return Ok(Status {
            workspace: workspace.display().to_string(),
            initialized: false,
            data_dir: None,
            actor: None,
            counts: None,
        });
    };
    Ok(Status {
        workspace: workspace.display().to_string(),
        initialized: true,
        data_dir: Some(ctx.storage.root().display().to_string()),
        actor: ctx.actor_id().map(str::to_string),
        counts: Some(ctx.storage.counts()?),
    })
}

/// Rebuild the cache from the JSONL files.
pub fn system_rebuild(ctx: &mut Context) -> Result<RebuildResult> {
    ctx.require(ResourceType::Admin, Action::Edit)?;
    Ok(RebuildResult {
        counts: ctx.storage.rebuild_cache()?,
    })
}

/// Drop superseded lines and tombstones from the JSONL files.
pub fn system_compact(ctx: &mut Context) -> Result<CompactStats> {
    ctx.require(ResourceType::Admin, Action::Edit)?;
    ctx.storage.compact()
}
