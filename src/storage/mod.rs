//! Storage layer for pmo data.
//!
//! Data for a workspace lives under `$PMO_DATA_DIR/<workspace-hash>/` (or the
//! platform data directory when the variable is unset):
//!
//! - JSONL files, one per entity kind, as the append-only source of truth.
//!   Every write appends the full record; deletes append a tombstone.
//! - `cache.db`, a SQLite index rebuilt from the JSONL files on demand.
//!   All reads are served from the cache.
//!
//! Referential integrity and email uniqueness are enforced here, in
//! application code; the cache schema carries no foreign keys.

pub mod record;

pub use record::{Record, Tombstone};

use crate::models::{
    ComplianceEvaluation, PmiStandard, Portfolio, Project, ProjectStatus, Risk, RiskLevel,
    RiskStatus, Role, User, health, normalize_tag,
};
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the base data directory.
pub const DATA_DIR_ENV: &str = "PMO_DATA_DIR";

/// JSONL files created by `init`.
const JSONL_FILES: [&str; 6] = [
    User::FILE,
    Portfolio::FILE,
    Project::FILE,
    Risk::FILE,
    PmiStandard::FILE,
    ComplianceEvaluation::FILE,
];

/// Attempts at finding an unused ID before giving up.
const ID_ATTEMPTS: usize = 64;

/// Filters for [`Storage::list_projects`].
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub portfolio_id: Option<String>,
    pub status: Option<ProjectStatus>,
    pub owner_id: Option<String>,
    pub tag: Option<String>,
}

/// Filters for [`Storage::list_risks`].
#[derive(Debug, Clone, Default)]
pub struct RiskFilter {
    pub project_id: Option<String>,
    pub severity: Option<RiskLevel>,
    pub status: Option<RiskStatus>,
}

/// Filters for [`Storage::list_evaluations`].
#[derive(Debug, Clone, Default)]
pub struct EvaluationFilter {
    pub project_id: Option<String>,
    pub standard_id: Option<String>,
}

/// Live record counts per entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub users: usize,
    pub portfolios: usize,
    pub projects: usize,
    pub risks: usize,
    pub standards: usize,
    pub evaluations: usize,
}

/// Outcome of [`Storage::compact`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompactStats {
    /// Lines across all JSONL files before compaction
    pub lines_before: usize,
    /// Lines after compaction (one per live record)
    pub lines_after: usize,
}

/// Storage manager for a single workspace.
pub struct Storage {
    /// Root directory for this workspace's data
    pub root: PathBuf,
    /// SQLite connection for indexed queries
    conn: Connection,
}

impl Storage {
    /// Open existing storage for the given workspace.
    pub fn open(workspace: &Path) -> Result<Self> {
        Self::open_at(get_storage_dir(workspace)?)
    }

    /// Open existing storage using an explicit base data directory.
    pub fn open_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<Self> {
        Self::open_at(storage_dir_in(workspace, data_dir)?)
    }

    /// Initialize storage for a workspace, creating files as needed.
    pub fn init(workspace: &Path) -> Result<Self> {
        Self::init_at(get_storage_dir(workspace)?)
    }

    /// Initialize storage using an explicit base data directory.
    pub fn init_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<Self> {
        Self::init_at(storage_dir_in(workspace, data_dir)?)
    }

    /// Check if storage exists for the given workspace.
    pub fn exists(workspace: &Path) -> Result<bool> {
        let root = get_storage_dir(workspace)?;
        Ok(root.join("cache.db").exists())
    }

    pub fn exists_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<bool> {
        let root = storage_dir_in(workspace, data_dir)?;
        Ok(root.join("cache.db").exists())
    }

    fn open_at(root: PathBuf) -> Result<Self> {
        if !root.join("cache.db").exists() {
            return Err(Error::NotInitialized);
        }
        let conn = Connection::open(root.join("cache.db"))?;
        Self::init_schema(&conn)?;
        debug!(root = %root.display(), "opened storage");
        Ok(Self { root, conn })
    }

    fn init_at(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;
        for file in JSONL_FILES {
            let path = root.join(file);
            if !path.exists() {
                File::create(&path)?;
            }
        }
        let conn = Connection::open(root.join("cache.db"))?;
        Self::init_schema(&conn)?;
        info!(root = %root.display(), "initialized storage");
        Ok(Self { root, conn })
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL COLLATE NOCASE,
                role TEXT NOT NULL,
                department TEXT,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);

            CREATE TABLE IF NOT EXISTS portfolios (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                health_score REAL NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_portfolios_owner ON portfolios(owner_id);

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                portfolio_id TEXT,
                owner_id TEXT,
                risk_level TEXT NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS project_tags (
                project_id TEXT NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (project_id, tag)
            );

            CREATE INDEX IF NOT EXISTS idx_projects_portfolio ON projects(portfolio_id);
            CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);
            CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status);
            CREATE INDEX IF NOT EXISTS idx_project_tags_tag ON project_tags(tag);

            CREATE TABLE IF NOT EXISTS risks (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                severity TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_risks_project ON risks(project_id);
            CREATE INDEX IF NOT EXISTS idx_risks_severity ON risks(severity);

            CREATE TABLE IF NOT EXISTS standards (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS evaluations (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                standard_id TEXT NOT NULL,
                overall_score REAL NOT NULL,
                evaluated_at TEXT NOT NULL,
                doc TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_evaluations_project ON evaluations(project_id);
            CREATE INDEX IF NOT EXISTS idx_evaluations_standard ON evaluations(standard_id);
            "#,
        )?;
        Ok(())
    }

    /// Get the root directory for this workspace's data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // === Generic record plumbing ===

    fn append_line<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(file))?;
        let json = serde_json::to_string(value)?;
        writeln!(handle, "{}", json)?;
        Ok(())
    }

    /// Append a record to its log and refresh its cache row.
    fn write_record<T: Record>(&mut self, record: &T) -> Result<()> {
        self.append_line(T::FILE, record)?;
        record.cache(&self.conn)?;
        debug!(kind = T::KIND, id = record.id(), "wrote record");
        Ok(())
    }

    /// Append a tombstone and drop the cache row.
    fn remove_record<T: Record>(&mut self, id: &str) -> Result<()> {
        self.append_line(T::FILE, &Tombstone::new(id))?;
        T::uncache(&self.conn, id)?;
        debug!(kind = T::KIND, id, "removed record");
        Ok(())
    }

    fn find<T: Record>(&self, id: &str) -> Result<Option<T>> {
        let sql = format!("SELECT doc FROM {} WHERE id = ?1", T::TABLE);
        let doc: Option<String> = self
            .conn
            .query_row(&sql, [id], |row| row.get(0))
            .optional()?;
        match doc {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    fn fetch<T: Record>(&self, id: &str) -> Result<T> {
        self.find(id)?
            .ok_or_else(|| Error::NotFound(format!("{} {}", T::KIND, id)))
    }

    fn contains<T: Record>(&self, id: &str) -> Result<bool> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?1", T::TABLE);
        let count: i64 = self.conn.query_row(&sql, [id], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn query_docs<T: Record>(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let docs: Vec<String> = stmt
            .query_map(params, |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        docs.iter()
            .map(|doc| serde_json::from_str(doc).map_err(Error::from))
            .collect()
    }

    fn count_where(&self, sql: &str, id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql, [id], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Generate an ID with `prefix` that no live record of kind `T` uses.
    pub fn next_id<T: Record>(&self, prefix: &str, seed: &str) -> Result<String> {
        for attempt in 0..ID_ATTEMPTS {
            let id = generate_id(prefix, &format!("{}:{}", seed, attempt));
            if !self.contains::<T>(&id)? {
                return Ok(id);
            }
        }
        Err(Error::Other(format!(
            "Could not allocate a unique {} ID",
            T::KIND
        )))
    }

    // === User Operations ===

    /// Create a new user. Emails are unique, case-insensitively.
    pub fn create_user(&mut self, user: &User) -> Result<()> {
        user.validate()?;
        if self.contains::<User>(&user.id)? {
            return Err(Error::Conflict(format!("User already exists: {}", user.id)));
        }
        self.ensure_email_available(&user.email, &user.id)?;
        self.write_record(user)
    }

    pub fn get_user(&self, id: &str) -> Result<User> {
        self.fetch(id)
    }

    /// Look up a user by email, case-insensitively.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users: Vec<User> = self.query_docs(
            "SELECT doc FROM users WHERE email = ?1 COLLATE NOCASE",
            &[&email],
        )?;
        Ok(users.into_iter().next())
    }

    /// List users, optionally filtered by role and department.
    pub fn list_users(&self, role: Option<Role>, department: Option<&str>) -> Result<Vec<User>> {
        let mut sql = String::from("SELECT doc FROM users WHERE 1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(r) = role {
            sql.push_str(" AND role = ?");
            params_vec.push(Box::new(r.as_str().to_string()));
        }
        if let Some(d) = department {
            sql.push_str(" AND department = ?");
            params_vec.push(Box::new(d.to_string()));
        }
        sql.push_str(" ORDER BY name ASC, id ASC");

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        self.query_docs(&sql, &params_refs)
    }

    pub fn update_user(&mut self, user: &User) -> Result<()> {
        user.validate()?;
        self.get_user(&user.id)?;
        self.ensure_email_available(&user.email, &user.id)?;
        self.write_record(user)
    }

    /// Delete a user. Refused while the user owns any project or portfolio.
    pub fn delete_user(&mut self, id: &str) -> Result<()> {
        self.get_user(id)?;
        let projects = self.count_where("SELECT COUNT(*) FROM projects WHERE owner_id = ?1", id)?;
        let portfolios =
            self.count_where("SELECT COUNT(*) FROM portfolios WHERE owner_id = ?1", id)?;
        if projects + portfolios > 0 {
            warn!(id, projects, portfolios, "refusing to delete referenced user");
            return Err(Error::ReferentialIntegrity(format!(
                "User {} still owns {} project(s) and {} portfolio(s)",
                id, projects, portfolios
            )));
        }
        self.remove_record::<User>(id)
    }

    fn ensure_email_available(&self, email: &str, own_id: &str) -> Result<()> {
        if let Some(existing) = self.find_user_by_email(email)? {
            if existing.id != own_id {
                return Err(Error::Conflict(format!(
                    "Email {} is already used by {}",
                    email, existing.id
                )));
            }
        }
        Ok(())
    }

    // === Portfolio Operations ===

    pub fn create_portfolio(&mut self, portfolio: &Portfolio) -> Result<()> {
        portfolio.validate()?;
        if self.contains::<Portfolio>(&portfolio.id)? {
            return Err(Error::Conflict(format!(
                "Portfolio already exists: {}",
                portfolio.id
            )));
        }
        self.get_user(&portfolio.owner_id)?;
        self.write_record(portfolio)
    }

    pub fn get_portfolio(&self, id: &str) -> Result<Portfolio> {
        self.fetch(id)
    }

    pub fn list_portfolios(&self, owner_id: Option<&str>) -> Result<Vec<Portfolio>> {
        match owner_id {
            Some(owner) => self.query_docs(
                "SELECT doc FROM portfolios WHERE owner_id = ?1 ORDER BY name ASC, id ASC",
                &[&owner],
            ),
            None => self.query_docs("SELECT doc FROM portfolios ORDER BY name ASC, id ASC", &[]),
        }
    }

    pub fn update_portfolio(&mut self, portfolio: &Portfolio) -> Result<()> {
        portfolio.validate()?;
        self.get_portfolio(&portfolio.id)?;
        self.get_user(&portfolio.owner_id)?;
        self.write_record(portfolio)
    }

    /// Delete a portfolio. Refused while any project references it.
    pub fn delete_portfolio(&mut self, id: &str) -> Result<()> {
        self.get_portfolio(id)?;
        let projects =
            self.count_where("SELECT COUNT(*) FROM projects WHERE portfolio_id = ?1", id)?;
        if projects > 0 {
            warn!(id, projects, "refusing to delete referenced portfolio");
            return Err(Error::ReferentialIntegrity(format!(
                "Portfolio {} still has {} project(s)",
                id, projects
            )));
        }
        self.remove_record::<Portfolio>(id)
    }

    /// Recompute a portfolio's health from its projects and persist it.
    ///
    /// This is the only path that refreshes a stored health score; project
    /// writes never trigger it.
    pub fn recompute_portfolio_health(&mut self, id: &str) -> Result<Portfolio> {
        let mut portfolio = self.get_portfolio(id)?;
        let projects = self.list_projects(&ProjectFilter {
            portfolio_id: Some(id.to_string()),
            ..ProjectFilter::default()
        })?;

        let now = Utc::now();
        let previous = portfolio.health_score;
        portfolio.health_score = health::portfolio_health_score(&projects);
        portfolio.updated_at = now;
        portfolio.health_recomputed_at = Some(now);
        self.write_record(&portfolio)?;

        info!(
            id,
            projects = projects.len(),
            previous,
            health_score = portfolio.health_score,
            "recomputed portfolio health"
        );
        Ok(portfolio)
    }

    // === Project Operations ===

    pub fn create_project(&mut self, project: &Project) -> Result<()> {
        project.validate()?;
        if self.contains::<Project>(&project.id)? {
            return Err(Error::Conflict(format!(
                "Project already exists: {}",
                project.id
            )));
        }
        self.check_project_refs(project)?;
        self.write_record(project)
    }

    pub fn get_project(&self, id: &str) -> Result<Project> {
        self.fetch(id)
    }

    /// List projects, optionally filtered.
    pub fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        let mut sql = String::from(
            "SELECT DISTINCT p.doc, p.created_at, p.id FROM projects p
             LEFT JOIN project_tags pt ON p.id = pt.project_id
             WHERE 1=1",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref portfolio) = filter.portfolio_id {
            sql.push_str(" AND p.portfolio_id = ?");
            params_vec.push(Box::new(portfolio.clone()));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND p.status = ?");
            params_vec.push(Box::new(status.as_str().to_string()));
        }
        if let Some(ref owner) = filter.owner_id {
            sql.push_str(" AND p.owner_id = ?");
            params_vec.push(Box::new(owner.clone()));
        }
        if let Some(ref tag) = filter.tag {
            sql.push_str(" AND pt.tag = ?");
            params_vec.push(Box::new(normalize_tag(tag)));
        }
        sql.push_str(" ORDER BY p.created_at ASC, p.id ASC");

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        self.query_docs(&sql, &params_refs)
    }

    pub fn update_project(&mut self, project: &Project) -> Result<()> {
        project.validate()?;
        self.get_project(&project.id)?;
        self.check_project_refs(project)?;
        self.write_record(project)
    }

    /// Delete a project together with its risks and compliance evaluations.
    pub fn delete_project(&mut self, id: &str) -> Result<DeletedProject> {
        self.get_project(id)?;

        let risks = self.list_risks(&RiskFilter {
            project_id: Some(id.to_string()),
            ..RiskFilter::default()
        })?;
        for risk in &risks {
            self.remove_record::<Risk>(&risk.id)?;
        }

        let evaluations = self.list_evaluations(&EvaluationFilter {
            project_id: Some(id.to_string()),
            ..EvaluationFilter::default()
        })?;
        for evaluation in &evaluations {
            self.remove_record::<ComplianceEvaluation>(&evaluation.id)?;
        }

        self.remove_record::<Project>(id)?;
        info!(
            id,
            risks = risks.len(),
            evaluations = evaluations.len(),
            "deleted project"
        );
        Ok(DeletedProject {
            risks_removed: risks.len(),
            evaluations_removed: evaluations.len(),
        })
    }

    fn check_project_refs(&self, project: &Project) -> Result<()> {
        if let Some(ref portfolio_id) = project.portfolio_id {
            self.get_portfolio(portfolio_id)?;
        }
        if let Some(ref owner_id) = project.owner_id {
            self.get_user(owner_id)?;
        }
        Ok(())
    }

    // === Risk Operations ===

    pub fn create_risk(&mut self, risk: &Risk) -> Result<()> {
        risk.validate()?;
        if self.contains::<Risk>(&risk.id)? {
            return Err(Error::Conflict(format!("Risk already exists: {}", risk.id)));
        }
        self.get_project(&risk.project_id)?;
        self.write_record(risk)
    }

    pub fn get_risk(&self, id: &str) -> Result<Risk> {
        self.fetch(id)
    }

    pub fn list_risks(&self, filter: &RiskFilter) -> Result<Vec<Risk>> {
        let mut sql = String::from("SELECT doc FROM risks WHERE 1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref project) = filter.project_id {
            sql.push_str(" AND project_id = ?");
            params_vec.push(Box::new(project.clone()));
        }
        if let Some(severity) = filter.severity {
            sql.push_str(" AND severity = ?");
            params_vec.push(Box::new(severity.as_str().to_string()));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params_vec.push(Box::new(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        self.query_docs(&sql, &params_refs)
    }

    pub fn update_risk(&mut self, risk: &Risk) -> Result<()> {
        risk.validate()?;
        self.get_risk(&risk.id)?;
        self.get_project(&risk.project_id)?;
        self.write_record(risk)
    }

    pub fn delete_risk(&mut self, id: &str) -> Result<()> {
        self.get_risk(id)?;
        self.remove_record::<Risk>(id)
    }

    // === Standard Operations ===

    pub fn create_standard(&mut self, standard: &PmiStandard) -> Result<()> {
        standard.validate()?;
        if self.contains::<PmiStandard>(&standard.id)? {
            return Err(Error::Conflict(format!(
                "Standard already exists: {}",
                standard.id
            )));
        }
        self.write_record(standard)
    }

    pub fn get_standard(&self, id: &str) -> Result<PmiStandard> {
        self.fetch(id)
    }

    pub fn list_standards(&self) -> Result<Vec<PmiStandard>> {
        self.query_docs("SELECT doc FROM standards ORDER BY name ASC, id ASC", &[])
    }

    pub fn update_standard(&mut self, standard: &PmiStandard) -> Result<()> {
        standard.validate()?;
        self.get_standard(&standard.id)?;
        self.write_record(standard)
    }

    /// Delete a standard. Refused while evaluations reference it.
    pub fn delete_standard(&mut self, id: &str) -> Result<()> {
        self.get_standard(id)?;
        let evaluations =
            self.count_where("SELECT COUNT(*) FROM evaluations WHERE standard_id = ?1", id)?;
        if evaluations > 0 {
            warn!(id, evaluations, "refusing to delete referenced standard");
            return Err(Error::ReferentialIntegrity(format!(
                "Standard {} still has {} evaluation(s)",
                id, evaluations
            )));
        }
        self.remove_record::<PmiStandard>(id)
    }

    // === Evaluation Operations ===

    pub fn create_evaluation(&mut self, evaluation: &ComplianceEvaluation) -> Result<()> {
        evaluation.validate()?;
        if self.contains::<ComplianceEvaluation>(&evaluation.id)? {
            return Err(Error::Conflict(format!(
                "Evaluation already exists: {}",
                evaluation.id
            )));
        }
        self.get_project(&evaluation.project_id)?;
        self.get_standard(&evaluation.standard_id)?;
        if let Some(ref evaluator) = evaluation.evaluator_id {
            self.get_user(evaluator)?;
        }
        self.write_record(evaluation)
    }

    pub fn get_evaluation(&self, id: &str) -> Result<ComplianceEvaluation> {
        self.fetch(id)
    }

    /// List evaluations, oldest first.
    pub fn list_evaluations(&self, filter: &EvaluationFilter) -> Result<Vec<ComplianceEvaluation>> {
        let mut sql = String::from("SELECT doc FROM evaluations WHERE 1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref project) = filter.project_id {
            sql.push_str(" AND project_id = ?");
            params_vec.push(Box::new(project.clone()));
        }
        if let Some(ref standard) = filter.standard_id {
            sql.push_str(" AND standard_id = ?");
            params_vec.push(Box::new(standard.clone()));
        }
        sql.push_str(" ORDER BY evaluated_at ASC, id ASC");

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        self.query_docs(&sql, &params_refs)
    }

    // === Maintenance ===

    /// Count live records per entity kind.
    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })?;
            Ok(n as usize)
        };
        Ok(StoreCounts {
            users: count(User::TABLE)?,
            portfolios: count(Portfolio::TABLE)?,
            projects: count(Project::TABLE)?,
            risks: count(Risk::TABLE)?,
            standards: count(PmiStandard::TABLE)?,
            evaluations: count(ComplianceEvaluation::TABLE)?,
        })
    }

    /// Rebuild the SQLite cache from the JSONL files.
    pub fn rebuild_cache(&mut self) -> Result<StoreCounts> {
        self.replay::<User>()?;
        self.replay::<Portfolio>()?;
        self.replay::<Project>()?;
        self.replay::<Risk>()?;
        self.replay::<PmiStandard>()?;
        self.replay::<ComplianceEvaluation>()?;
        let counts = self.counts()?;
        info!(?counts, "rebuilt cache");
        Ok(counts)
    }

    /// Replay one JSONL file into its cache table.
    ///
    /// Later lines win; a tombstone removes any earlier version.
    fn replay<T: Record>(&mut self) -> Result<()> {
        let mut live: HashMap<String, T> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for line in read_lines(&self.root.join(T::FILE))? {
            let value: serde_json::Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(file = T::FILE, error = %e, "skipping malformed line");
                    continue;
                }
            };
            match value.get("type").and_then(|t| t.as_str()) {
                Some(Tombstone::KIND) => {
                    if let Some(id) = value.get("id").and_then(|i| i.as_str()) {
                        live.remove(id);
                    }
                }
                Some(kind) if kind == T::KIND => {
                    let record: T = serde_json::from_value(value)?;
                    let id = record.id().to_string();
                    if !live.contains_key(&id) {
                        order.push(id.clone());
                    }
                    live.insert(id, record);
                }
                _ => {}
            }
        }

        let tx = self.conn.transaction()?;
        T::clear(&tx)?;
        for id in &order {
            if let Some(record) = live.get(id) {
                record.cache(&tx)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Rewrite every JSONL file with only live records.
    pub fn compact(&mut self) -> Result<CompactStats> {
        let mut stats = CompactStats::default();
        self.compact_file::<User>(&mut stats)?;
        self.compact_file::<Portfolio>(&mut stats)?;
        self.compact_file::<Project>(&mut stats)?;
        self.compact_file::<Risk>(&mut stats)?;
        self.compact_file::<PmiStandard>(&mut stats)?;
        self.compact_file::<ComplianceEvaluation>(&mut stats)?;
        info!(
            lines_before = stats.lines_before,
            lines_after = stats.lines_after,
            "compacted storage"
        );
        Ok(stats)
    }

    fn compact_file<T: Record>(&mut self, stats: &mut CompactStats) -> Result<()> {
        let path = self.root.join(T::FILE);
        stats.lines_before += read_lines(&path)?.len();

        let records: Vec<T> = self.query_docs(&format!("SELECT doc FROM {}", T::TABLE), &[])?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        for record in &records {
            writeln!(tmp, "{}", serde_json::to_string(record)?)?;
        }
        tmp.persist(&path).map_err(|e| e.error)?;
        stats.lines_after += records.len();
        Ok(())
    }
}

/// Counts of dependent records removed alongside a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletedProject {
    pub risks_removed: usize,
    pub evaluations_removed: usize,
}

/// Read the non-empty lines of a JSONL file. A missing file reads as empty.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Fixed-width RFC 3339 timestamp, so string order matches time order.
pub(crate) fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Get the storage directory for a workspace.
///
/// Uses `$PMO_DATA_DIR` when set, otherwise `<data dir>/pmo`, joined with a
/// hash of the canonical workspace path.
pub fn get_storage_dir(workspace: &Path) -> Result<PathBuf> {
    let base = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::data_dir()
            .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?
            .join("pmo"),
    };
    storage_dir_in(workspace, &base)
}

/// Get the storage directory for a workspace under an explicit base directory.
pub fn storage_dir_in(workspace: &Path, data_dir: &Path) -> Result<PathBuf> {
    let canonical = workspace
        .canonicalize()
        .map_err(|e| Error::Other(format!("Could not canonicalize workspace path: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());

    Ok(data_dir.join(&hash_hex[..12]))
}

/// Generate an ID of the form `<prefix>-<4 hex chars>`.
pub fn generate_id(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    let hash_hex = format!("{:x}", hasher.finalize());
    format!("{}-{}", prefix, &hash_hex[..4])
}

/// Validate that an ID matches `<prefix>-<4 hex chars>`.
pub fn validate_id(id: &str, prefix: &str) -> Result<()> {
    let Some(suffix) = id.strip_prefix(&format!("{}-", prefix)) else {
        return Err(Error::InvalidId(format!(
            "ID must start with '{}-', got: {}",
            prefix, id
        )));
    };
    if suffix.len() != 4 || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidId(format!(
            "ID suffix must be 4 hex characters, got: {}",
            suffix
        )));
    }
    Ok(())
}
