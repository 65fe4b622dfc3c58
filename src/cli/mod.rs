//! CLI argument definitions for pmo.
//!
//! Subcommand enums also derive `Serialize` (untagged) so the binary can
//! record each invocation's arguments in the action log.

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

/// pmo - Portfolio, project, risk and compliance tracking.
///
/// Start with `pmo system init`, then create users, portfolios and projects.
#[derive(Parser, Debug)]
#[command(name = "pmo")]
#[command(author, version, about = "Track portfolios, projects, risks and compliance", long_about = None)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("PMO_GIT_COMMIT"),
    ", built ",
    env!("PMO_BUILD_TIMESTAMP"),
    ")"
))]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if pmo was started in <path> instead of the current directory.
    /// The path must exist.
    #[arg(short = 'C', long = "workspace", global = true, env = "PMO_WORKSPACE")]
    pub workspace: Option<std::path::PathBuf>,

    /// User ID to act as. Without one, commands run as the local operator.
    #[arg(long = "as", global = true, env = "PMO_USER")]
    pub acting_user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Storage setup and maintenance
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },

    /// User management (administrators)
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Portfolio management
    Portfolio {
        #[command(subcommand)]
        command: PortfolioCommands,
    },

    /// Project management
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Risk tracking
    Risk {
        #[command(subcommand)]
        command: RiskCommands,
    },

    /// PMI standards and their weighted criteria
    Standard {
        #[command(subcommand)]
        command: StandardCommands,
    },

    /// Compliance evaluations and summaries
    Compliance {
        #[command(subcommand)]
        command: ComplianceCommands,
    },

    /// Role-based dashboard for the acting user
    Dashboard,

    /// Inspect the access policy
    Access {
        #[command(subcommand)]
        command: AccessCommands,
    },

    /// Read and write workspace configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Serve the JSON API over HTTP
    #[cfg(feature = "serve")]
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

impl Commands {
    /// Command name as recorded in the action log (e.g., "project create").
    pub fn name(&self) -> String {
        match self {
            Commands::System { command } => format!("system {}", command.name()),
            Commands::User { command } => format!("user {}", command.name()),
            Commands::Portfolio { command } => format!("portfolio {}", command.name()),
            Commands::Project { command } => format!("project {}", command.name()),
            Commands::Risk { command } => format!("risk {}", command.name()),
            Commands::Standard { command } => format!("standard {}", command.name()),
            Commands::Compliance { command } => format!("compliance {}", command.name()),
            Commands::Dashboard => "dashboard".to_string(),
            Commands::Access { command } => format!("access {}", command.name()),
            Commands::Config { command } => format!("config {}", command.name()),
            #[cfg(feature = "serve")]
            Commands::Serve { .. } => "serve".to_string(),
        }
    }

    /// Command arguments as JSON, for the action log.
    pub fn args(&self) -> Value {
        let value = match self {
            Commands::System { command } => serde_json::to_value(command),
            Commands::User { command } => serde_json::to_value(command),
            Commands::Portfolio { command } => serde_json::to_value(command),
            Commands::Project { command } => serde_json::to_value(command),
            Commands::Risk { command } => serde_json::to_value(command),
            Commands::Standard { command } => serde_json::to_value(command),
            Commands::Compliance { command } => serde_json::to_value(command),
            Commands::Dashboard => Ok(Value::Null),
            Commands::Access { command } => serde_json::to_value(command),
            Commands::Config { command } => serde_json::to_value(command),
            #[cfg(feature = "serve")]
            Commands::Serve { host, port } => Ok(serde_json::json!({ "host": host, "port": port })),
        };
        match value {
            Ok(Value::Null) | Err(_) => Value::Object(Default::default()),
            Ok(v) => v,
        }
    }
}

/// System subcommands
#[derive(Subcommand, Debug, Serialize)]
#[serde(untagged)]
pub enum SystemCommands {
    /// Create storage for the workspace
    Init,

    /// Show workspace status and record counts
    Status,

    /// Rebuild the SQLite cache from the JSONL files
    Rebuild,

    /// Rewrite the JSONL files with only live records
    Compact,
}

impl SystemCommands {
    pub fn name(&self) -> &'static str {
        match self {
            SystemCommands::Init => "init",
            SystemCommands::Status => "status",
            SystemCommands::Rebuild => "rebuild",
            SystemCommands::Compact => "compact",
        }
    }
}

/// User subcommands
#[derive(Subcommand, Debug, Serialize)]
#[serde(untagged)]
pub enum UserCommands {
    /// Create a user
    Create {
        /// Display name
        name: String,

        /// Email address (unique)
        #[arg(short, long)]
        email: String,

        /// Role (executive, portfolio_manager, project_officer)
        #[arg(short, long)]
        role: String,

        /// Department
        #[arg(short, long)]
        department: Option<String>,
    },

    /// List users
    List {
        /// Filter by role
        #[arg(long)]
        role: Option<String>,

        /// Filter by department
        #[arg(long)]
        department: Option<String>,
    },

    /// Show a user
    Show {
        /// User ID (e.g., usr-a1b2)
        id: String,
    },

    /// Update a user
    Update {
        /// User ID
        id: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New email
        #[arg(long)]
        email: Option<String>,

        /// New role
        #[arg(long)]
        role: Option<String>,

        /// New department (empty to clear)
        #[arg(long)]
        department: Option<String>,
    },

    /// Delete a user (refused while they own projects or portfolios)
    Delete {
        /// User ID
        id: String,
    },
}

impl UserCommands {
    pub fn name(&self) -> &'static str {
        match self {
            UserCommands::Create { .. } => "create",
            UserCommands::List { .. } => "list",
            UserCommands::Show { .. } => "show",
            UserCommands::Update { .. } => "update",
            UserCommands::Delete { .. } => "delete",
        }
    }
}

/// Portfolio subcommands
#[derive(Subcommand, Debug, Serialize)]
#[serde(untagged)]
pub enum PortfolioCommands {
    /// Create a portfolio
    Create {
        /// Portfolio name
        name: String,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Owner user ID (defaults to the acting user)
        #[arg(long)]
        owner: Option<String>,

        /// Total budget
        #[arg(long)]
        total_budget: Option<f64>,

        /// Allocated budget
        #[arg(long)]
        allocated_budget: Option<f64>,

        /// Team size
        #[arg(long)]
        team_size: Option<u32>,

        /// Resource utilization percentage (0-100)
        #[arg(long)]
        utilization: Option<f64>,
    },

    /// List portfolios
    List {
        /// Filter by owner
        #[arg(long)]
        owner: Option<String>,
    },

    /// Show a portfolio and its projects
    Show {
        /// Portfolio ID (e.g., pf-a1b2)
        id: String,
    },

    /// Update a portfolio
    Update {
        /// Portfolio ID
        id: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description (empty to clear)
        #[arg(long)]
        description: Option<String>,

        /// New owner user ID
        #[arg(long)]
        owner: Option<String>,

        /// Set the stored health score directly (0-100)
        #[arg(long)]
        health_score: Option<f64>,

        /// New total budget
        #[arg(long)]
        total_budget: Option<f64>,

        /// New allocated budget
        #[arg(long)]
        allocated_budget: Option<f64>,

        /// New team size
        #[arg(long)]
        team_size: Option<u32>,

        /// New utilization percentage (0-100)
        #[arg(long)]
        utilization: Option<f64>,

        /// New advisory project count
        #[arg(long)]
        project_count: Option<u32>,
    },

    /// Delete a portfolio (refused while projects reference it)
    Delete {
        /// Portfolio ID
        id: String,
    },

    /// Recompute and store health from the portfolio's projects
    RecomputeHealth {
        /// Portfolio ID
        id: String,
    },

    /// Stored vs computed health, status and budget aggregates
    Stats {
        /// Portfolio ID
        id: String,
    },
}

impl PortfolioCommands {
    pub fn name(&self) -> &'static str {
        match self {
            PortfolioCommands::Create { .. } => "create",
            PortfolioCommands::List { .. } => "list",
            PortfolioCommands::Show { .. } => "show",
            PortfolioCommands::Update { .. } => "update",
            PortfolioCommands::Delete { .. } => "delete",
            PortfolioCommands::RecomputeHealth { .. } => "recompute-health",
            PortfolioCommands::Stats { .. } => "stats",
        }
    }
}

/// Project subcommands
#[derive(Subcommand, Debug, Serialize)]
#[serde(untagged)]
pub enum ProjectCommands {
    /// Create a project
    Create {
        /// Project name
        name: String,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Status (planned, active, at-risk, delayed, completed)
        #[arg(long)]
        status: Option<String>,

        /// Budget
        #[arg(long)]
        budget: Option<f64>,

        /// Budget spent so far
        #[arg(long)]
        spent: Option<f64>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Portfolio ID
        #[arg(long)]
        portfolio: Option<String>,

        /// Owner user ID
        #[arg(long)]
        owner: Option<String>,

        /// Health score (0-100, default 100)
        #[arg(long)]
        health_score: Option<f64>,

        /// Risk level (low, medium, high, critical)
        #[arg(long)]
        risk_level: Option<String>,

        /// Tags for the project
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// List projects
    List {
        /// Filter by portfolio
        #[arg(long)]
        portfolio: Option<String>,

        /// Filter by status
        #[arg(long)]
        status: Option<String>,

        /// Filter by owner
        #[arg(long)]
        owner: Option<String>,

        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// Show a project
    Show {
        /// Project ID (e.g., prj-a1b2)
        id: String,
    },

    /// Update a project
    Update {
        /// Project ID
        id: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description (empty to clear)
        #[arg(long)]
        description: Option<String>,

        /// New status
        #[arg(long)]
        status: Option<String>,

        /// New budget
        #[arg(long)]
        budget: Option<f64>,

        /// New spent amount
        #[arg(long)]
        spent: Option<f64>,

        /// New start date (empty to clear)
        #[arg(long)]
        start: Option<String>,

        /// New end date (empty to clear)
        #[arg(long)]
        end: Option<String>,

        /// New portfolio ID (empty to detach)
        #[arg(long)]
        portfolio: Option<String>,

        /// New owner user ID (empty to clear)
        #[arg(long)]
        owner: Option<String>,

        /// New health score (0-100)
        #[arg(long)]
        health_score: Option<f64>,

        /// New risk level
        #[arg(long)]
        risk_level: Option<String>,

        /// Add a tag
        #[arg(long)]
        add_tag: Vec<String>,

        /// Remove a tag
        #[arg(long)]
        remove_tag: Vec<String>,
    },

    /// Delete a project with its risks and evaluations
    Delete {
        /// Project ID
        id: String,
    },

    /// Add a milestone to the project timeline
    MilestoneAdd {
        /// Project ID
        id: String,

        /// Milestone name
        name: String,

        /// Milestone date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Status (pending, in-progress, completed, delayed)
        #[arg(long)]
        status: Option<String>,
    },

    /// Set a milestone's status
    MilestoneStatus {
        /// Project ID
        id: String,

        /// Milestone name
        name: String,

        /// New status (pending, in-progress, completed, delayed)
        status: String,
    },
}

impl ProjectCommands {
    pub fn name(&self) -> &'static str {
        match self {
            ProjectCommands::Create { .. } => "create",
            ProjectCommands::List { .. } => "list",
            ProjectCommands::Show { .. } => "show",
            ProjectCommands::Update { .. } => "update",
            ProjectCommands::Delete { .. } => "delete",
            ProjectCommands::MilestoneAdd { .. } => "milestone-add",
            ProjectCommands::MilestoneStatus { .. } => "milestone-status",
        }
    }
}

/// Risk subcommands
#[derive(Subcommand, Debug, Serialize)]
#[serde(untagged)]
pub enum RiskCommands {
    /// Raise a risk against a project
    Create {
        /// Risk title
        title: String,

        /// Project ID
        #[arg(long)]
        project: String,

        /// Probability (0-100)
        #[arg(long)]
        probability: f64,

        /// Impact (0-100)
        #[arg(long)]
        impact: f64,

        /// Severity (low, medium, high, critical)
        #[arg(long)]
        severity: Option<String>,

        /// Status (identified, monitored, mitigated, resolved)
        #[arg(long)]
        status: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Mitigation plan
        #[arg(long)]
        mitigation: Option<String>,
    },

    /// List risks
    List {
        /// Filter by project
        #[arg(long)]
        project: Option<String>,

        /// Filter by stored severity
        #[arg(long)]
        severity: Option<String>,

        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },

    /// Show a risk with its derived score
    Show {
        /// Risk ID (e.g., rsk-a1b2)
        id: String,
    },

    /// Update a risk (any status may follow any other)
    Update {
        /// Risk ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description (empty to clear)
        #[arg(long)]
        description: Option<String>,

        /// New severity
        #[arg(long)]
        severity: Option<String>,

        /// New status
        #[arg(long)]
        status: Option<String>,

        /// New probability (0-100)
        #[arg(long)]
        probability: Option<f64>,

        /// New impact (0-100)
        #[arg(long)]
        impact: Option<f64>,

        /// New mitigation plan (empty to clear)
        #[arg(long)]
        mitigation: Option<String>,
    },

    /// Delete a risk
    Delete {
        /// Risk ID
        id: String,
    },

    /// Summarize risks with a heat map
    Summary {
        /// Limit to one project
        #[arg(long)]
        project: Option<String>,

        /// Limit to one portfolio
        #[arg(long)]
        portfolio: Option<String>,
    },
}

impl RiskCommands {
    pub fn name(&self) -> &'static str {
        match self {
            RiskCommands::Create { .. } => "create",
            RiskCommands::List { .. } => "list",
            RiskCommands::Show { .. } => "show",
            RiskCommands::Update { .. } => "update",
            RiskCommands::Delete { .. } => "delete",
            RiskCommands::Summary { .. } => "summary",
        }
    }
}

/// Standard subcommands
#[derive(Subcommand, Debug, Serialize)]
#[serde(untagged)]
pub enum StandardCommands {
    /// Create a standard
    Create {
        /// Standard name
        name: String,

        /// Version label
        #[arg(long)]
        version: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List standards
    List,

    /// Show a standard and its criteria
    Show {
        /// Standard ID (e.g., std-a1b2)
        id: String,
    },

    /// Delete a standard (refused while evaluations reference it)
    Delete {
        /// Standard ID
        id: String,
    },

    /// Add a weighted criterion
    CriterionAdd {
        /// Standard ID
        id: String,

        /// Criterion name
        name: String,

        /// Weight (positive)
        #[arg(short, long, default_value_t = 1.0)]
        weight: f64,

        /// Category
        #[arg(long)]
        category: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },
}

impl StandardCommands {
    pub fn name(&self) -> &'static str {
        match self {
            StandardCommands::Create { .. } => "create",
            StandardCommands::List => "list",
            StandardCommands::Show { .. } => "show",
            StandardCommands::Delete { .. } => "delete",
            StandardCommands::CriterionAdd { .. } => "criterion-add",
        }
    }
}

/// Compliance subcommands
#[derive(Subcommand, Debug, Serialize)]
#[serde(untagged)]
pub enum ComplianceCommands {
    /// Record an evaluation of a project against a standard
    Evaluate {
        /// Project ID
        #[arg(long)]
        project: String,

        /// Standard ID
        #[arg(long)]
        standard: String,

        /// Overall score (0-100); derived from --criterion scores when omitted
        #[arg(long)]
        score: Option<f64>,

        /// Criterion score as <name>=<score> (repeatable)
        #[arg(long)]
        criterion: Vec<String>,

        /// Evaluator user ID (defaults to the acting user)
        #[arg(long)]
        evaluator: Option<String>,

        /// Notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List evaluations, oldest first
    List {
        /// Filter by project
        #[arg(long)]
        project: Option<String>,

        /// Filter by standard
        #[arg(long)]
        standard: Option<String>,
    },

    /// Show an evaluation
    Show {
        /// Evaluation ID (e.g., cev-a1b2)
        id: String,
    },

    /// Mean score, level, trend and compliance rate
    Summary {
        /// Limit to one project
        #[arg(long)]
        project: Option<String>,

        /// Limit to one standard
        #[arg(long)]
        standard: Option<String>,

        /// Limit to one portfolio
        #[arg(long)]
        portfolio: Option<String>,
    },
}

impl ComplianceCommands {
    pub fn name(&self) -> &'static str {
        match self {
            ComplianceCommands::Evaluate { .. } => "evaluate",
            ComplianceCommands::List { .. } => "list",
            ComplianceCommands::Show { .. } => "show",
            ComplianceCommands::Summary { .. } => "summary",
        }
    }
}

/// Access subcommands
#[derive(Subcommand, Debug, Serialize)]
#[serde(untagged)]
pub enum AccessCommands {
    /// Check whether a role may perform an action on a resource
    Check {
        /// Resource (project, portfolio, dashboard, admin)
        resource: String,

        /// Action (view, edit, delete, create)
        action: String,

        /// Role to check (defaults to the acting user's role)
        #[arg(long)]
        role: Option<String>,
    },

    /// Print the permission table
    Matrix {
        /// Only this role
        #[arg(long)]
        role: Option<String>,
    },
}

impl AccessCommands {
    pub fn name(&self) -> &'static str {
        match self {
            AccessCommands::Check { .. } => "check",
            AccessCommands::Matrix { .. } => "matrix",
        }
    }
}

/// Config subcommands
#[derive(Subcommand, Debug, Serialize)]
#[serde(untagged)]
pub enum ConfigCommands {
    /// Get a workspace config value
    Get {
        /// Config key
        key: String,
    },

    /// Set a workspace config value (empty to unset)
    Set {
        /// Config key
        key: String,

        /// Value
        value: String,
    },

    /// List effective config values and their sources
    List,
}

impl ConfigCommands {
    pub fn name(&self) -> &'static str {
        match self {
            ConfigCommands::Get { .. } => "get",
            ConfigCommands::Set { .. } => "set",
            ConfigCommands::List => "list",
        }
    }
}
