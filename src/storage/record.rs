//! Mapping between entity records, their JSONL files and cache tables.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::timestamp;
use crate::Result;
use crate::models::{ComplianceEvaluation, PmiStandard, Portfolio, Project, Risk, User};

/// An entity persisted as JSONL lines and indexed in the cache.
pub trait Record: Serialize + DeserializeOwned {
    /// Value of the `type` field on this record's JSONL lines
    const KIND: &'static str;
    /// JSONL file name under the storage root
    const FILE: &'static str;
    /// Cache table name
    const TABLE: &'static str;

    fn id(&self) -> &str;

    /// Insert or replace this record's cache row.
    fn cache(&self, conn: &Connection) -> Result<()>;

    /// Drop the cache row for `id`.
    fn uncache(conn: &Connection, id: &str) -> Result<()> {
        conn.execute(&format!("DELETE FROM {} WHERE id = ?1", Self::TABLE), [id])?;
        Ok(())
    }

    /// Drop every cache row of this kind.
    fn clear(conn: &Connection) -> Result<()> {
        conn.execute(&format!("DELETE FROM {}", Self::TABLE), [])?;
        Ok(())
    }
}

/// Deletion marker appended to a JSONL file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tombstone {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: String,
    pub deleted_at: DateTime<Utc>,
}

impl Tombstone {
    pub const KIND: &'static str = "tombstone";

    pub fn new(id: &str) -> Self {
        Self {
            entity_type: Self::KIND.to_string(),
            id: id.to_string(),
            deleted_at: Utc::now(),
        }
    }
}

impl Record for User {
    const KIND: &'static str = "user";
    const FILE: &'static str = "users.jsonl";
    const TABLE: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }

    fn cache(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO users (id, name, email, role, department, created_at, doc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.id,
                self.name,
                self.email,
                self.role.as_str(),
                self.department,
                timestamp(&self.created_at),
                serde_json::to_string(self)?,
            ],
        )?;
        Ok(())
    }
}

impl Record for Portfolio {
    const KIND: &'static str = "portfolio";
    const FILE: &'static str = "portfolios.jsonl";
    const TABLE: &'static str = "portfolios";

    fn id(&self) -> &str {
        &self.id
    }

    fn cache(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO portfolios (id, name, owner_id, health_score, created_at, doc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.id,
                self.name,
                self.owner_id,
                self.health_score,
                timestamp(&self.created_at),
                serde_json::to_string(self)?,
            ],
        )?;
        Ok(())
    }
}

impl Record for Project {
    const KIND: &'static str = "project";
    const FILE: &'static str = "projects.jsonl";
    const TABLE: &'static str = "projects";

    fn id(&self) -> &str {
        &self.id
    }

    fn cache(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO projects
             (id, name, status, portfolio_id, owner_id, risk_level, created_at, doc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.id,
                self.name,
                self.status.as_str(),
                self.portfolio_id,
                self.owner_id,
                self.risk_level.as_str(),
                timestamp(&self.created_at),
                serde_json::to_string(self)?,
            ],
        )?;

        conn.execute("DELETE FROM project_tags WHERE project_id = ?1", [&self.id])?;
        for tag in &self.tags {
            conn.execute(
                "INSERT INTO project_tags (project_id, tag) VALUES (?1, ?2)",
                params![self.id, tag],
            )?;
        }
        Ok(())
    }

    fn uncache(conn: &Connection, id: &str) -> Result<()> {
        conn.execute("DELETE FROM project_tags WHERE project_id = ?1", [id])?;
        conn.execute("DELETE FROM projects WHERE id = ?1", [id])?;
        Ok(())
    }

    fn clear(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM project_tags", [])?;
        conn.execute("DELETE FROM projects", [])?;
        Ok(())
    }
}

impl Record for Risk {
    const KIND: &'static str = "risk";
    const FILE: &'static str = "risks.jsonl";
    const TABLE: &'static str = "risks";

    fn id(&self) -> &str {
        &self.id
    }

    fn cache(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO risks (id, project_id, severity, status, created_at, doc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.id,
                self.project_id,
                self.severity.as_str(),
                self.status.as_str(),
                timestamp(&self.created_at),
                serde_json::to_string(self)?,
            ],
        )?;
        Ok(())
    }
}

impl Record for PmiStandard {
    const KIND: &'static str = "standard";
    const FILE: &'static str = "standards.jsonl";
    const TABLE: &'static str = "standards";

    fn id(&self) -> &str {
        &self.id
    }

    fn cache(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO standards (id, name, created_at, doc)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.id,
                self.name,
                timestamp(&self.created_at),
                serde_json::to_string(self)?,
            ],
        )?;
        Ok(())
    }
}

impl Record for ComplianceEvaluation {
    const KIND: &'static str = "evaluation";
    const FILE: &'static str = "evaluations.jsonl";
    const TABLE: &'static str = "evaluations";

    fn id(&self) -> &str {
        &self.id
    }

    fn cache(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO evaluations
             (id, project_id, standard_id, overall_score, evaluated_at, doc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.id,
                self.project_id,
                self.standard_id,
                self.overall_score,
                timestamp(&self.evaluated_at),
                serde_json::to_string(self)?,
            ],
        )?;
        Ok(())
    }
}
