//! pmo CLI - Portfolio, project, risk and compliance tracking.

use clap::Parser;
use pmo::action_log::{self, ActionLog};
use pmo::cli::{
    AccessCommands, Cli, Commands, ComplianceCommands, ConfigCommands, PortfolioCommands,
    ProjectCommands, RiskCommands, StandardCommands, SystemCommands, UserCommands,
};
use pmo::commands::{self, Context, Output, Scope};
use pmo::config::{ConfigOverrides, OutputFormat, resolve_config};
use pmo::models::Criterion;
use pmo::storage::{EvaluationFilter, ProjectFilter, RiskFilter, Storage};
use pmo::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g., "pmo=debug").
const LOG_ENV: &str = "PMO_LOG";
const LOG_FORMAT_ENV: &str = "PMO_LOG_FORMAT";

/// Facts gathered while running a command that the action log needs.
struct RunInfo {
    human: bool,
    actor: Option<String>,
    log_path: Option<PathBuf>,
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let workspace = resolve_workspace(cli.workspace.clone(), cli.human_readable);

    // Serialize command for logging
    let (cmd_name, args_json) = serialize_command(&cli.command);

    let start = Instant::now();
    let mut info = RunInfo {
        human: cli.human_readable,
        actor: None,
        log_path: None,
    };
    let result = run_command(cli, &workspace, &mut info);
    let duration = start.elapsed().as_millis() as u64;

    if let Some(ref path) = info.log_path {
        let mut entry = ActionLog::new(&workspace, &cmd_name, &args_json);
        entry.success = result.is_ok();
        entry.error = result.as_ref().err().map(|e| e.to_string());
        entry.duration_ms = duration;
        entry.actor = info.actor.clone();
        action_log::log_action(path, &entry);
    }

    if let Err(e) = result {
        if info.human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Logs go to stderr so JSON on stdout stays parseable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    // Machine-readable diagnostics for log shippers
    if std::env::var(LOG_FORMAT_ENV).is_ok_and(|format| format == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve the workspace: `-C`/`PMO_WORKSPACE` if given (must exist),
/// otherwise the current directory.
fn resolve_workspace(explicit_path: Option<PathBuf>, human: bool) -> PathBuf {
    match explicit_path {
        Some(path) => {
            if !path.exists() {
                let message = format!("Specified workspace does not exist: {}", path.display());
                if human {
                    eprintln!("Error: {}", message);
                } else {
                    eprintln!("{}", serde_json::json!({ "error": message }));
                }
                process::exit(1);
            }
            path
        }
        None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn serialize_command(command: &Option<Commands>) -> (String, serde_json::Value) {
    match command {
        Some(command) => (command.name(), command.args()),
        None => ("status".to_string(), serde_json::json!({})),
    }
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

fn parse<T: FromStr<Err = Error>>(value: Option<String>) -> Result<Option<T>> {
    value.map(|v| v.parse()).transpose()
}

/// Open storage, resolve config and fill in `info` for the action log.
fn open_session(
    workspace: &Path,
    overrides: &ConfigOverrides,
    info: &mut RunInfo,
) -> Result<Storage> {
    let storage = Storage::open(workspace)?;
    let config = resolve_config(&storage, overrides)?;
    info.human = config.output_format() == OutputFormat::Human;
    info.actor = config.default_user().map(str::to_string);
    info.log_path = config
        .action_log_enabled()
        .then(|| action_log::log_path(config.action_log_path(), storage.root()));
    Ok(storage)
}

fn run_command(cli: Cli, workspace: &Path, info: &mut RunInfo) -> Result<()> {
    let mut overrides = ConfigOverrides::new();
    if cli.human_readable {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }
    if let Some(actor) = cli.acting_user.filter(|a| !a.trim().is_empty()) {
        overrides = overrides.with_acting_user(actor.trim());
    }

    let command = match cli.command {
        Some(Commands::System {
            command: SystemCommands::Init,
        }) => {
            let result = commands::system_init(workspace, None)?;
            open_session(workspace, &overrides, info)?;
            output(&result, info.human);
            return Ok(());
        }
        Some(command) => command,
        None => {
            // Bare `pmo` reports status, initialized or not
            return match open_session(workspace, &overrides, info) {
                Ok(mut storage) => {
                    let actor = info.actor.clone();
                    let ctx = Context::new(&mut storage, actor.as_deref())?;
                    output(
                        &commands::system_status(workspace, Some(&ctx))?,
                        info.human,
                    );
                    Ok(())
                }
                Err(Error::NotInitialized) => {
                    output(&commands::system_status(workspace, None)?, info.human);
                    Ok(())
                }
                Err(e) => Err(e),
            };
        }
    };

    let mut storage = open_session(workspace, &overrides, info)?;
    let human = info.human;

    // Commands that do not act as a user
    match command {
        Commands::Config { command } => {
            match command {
                ConfigCommands::Get { key } => {
                    output(&commands::config_get(&storage, &key)?, human)
                }
                ConfigCommands::Set { key, value } => {
                    output(&commands::config_set(&storage, &key, &value)?, human)
                }
                ConfigCommands::List => {
                    output(&commands::config_list(&storage, &overrides)?, human)
                }
            }
            return Ok(());
        }
        Commands::Access {
            command: AccessCommands::Matrix { role },
        } => {
            output(&commands::access_matrix(parse(role)?), human);
            return Ok(());
        }
        #[cfg(feature = "serve")]
        Commands::Serve { host, port } => {
            let runtime = tokio::runtime::Runtime::new()?;
            return runtime.block_on(pmo::server::serve(storage, &host, port));
        }
        command => {
            let actor = info.actor.clone();
            let mut ctx = Context::new(&mut storage, actor.as_deref())?;
            run_as(command, workspace, &mut ctx, human)
        }
    }
}

fn run_as(command: Commands, workspace: &Path, ctx: &mut Context, human: bool) -> Result<()> {
    match command {
        Commands::System { command } => match command {
            // Handled before storage is opened
            SystemCommands::Init => {}
            SystemCommands::Status => {
                output(&commands::system_status(workspace, Some(&*ctx))?, human)
            }
            SystemCommands::Rebuild => output(&commands::system_rebuild(ctx)?, human),
            SystemCommands::Compact => output(&commands::system_compact(ctx)?, human),
        },

        Commands::User { command } => match command {
            UserCommands::Create {
                name,
                email,
                role,
                department,
            } => {
                let result = commands::user_create(ctx, name, email, role.parse()?, department)?;
                output(&result, human);
            }
            UserCommands::List { role, department } => {
                let result = commands::user_list(ctx, parse(role)?, department.as_deref())?;
                output(&result, human);
            }
            UserCommands::Show { id } => output(&commands::user_show(ctx, &id)?, human),
            UserCommands::Update {
                id,
                name,
                email,
                role,
                department,
            } => {
                let update = commands::UserUpdate {
                    name,
                    email,
                    role: parse(role)?,
                    department,
                };
                output(&commands::user_update(ctx, &id, update)?, human);
            }
            UserCommands::Delete { id } => output(&commands::user_delete(ctx, &id)?, human),
        },

        Commands::Portfolio { command } => match command {
            PortfolioCommands::Create {
                name,
                description,
                owner,
                total_budget,
                allocated_budget,
                team_size,
                utilization,
            } => {
                let input = commands::NewPortfolio {
                    name,
                    description,
                    owner_id: owner,
                    total_budget,
                    allocated_budget,
                    team_size,
                    utilization,
                };
                output(&commands::portfolio_create(ctx, input)?, human);
            }
            PortfolioCommands::List { owner } => {
                output(&commands::portfolio_list(ctx, owner.as_deref())?, human)
            }
            PortfolioCommands::Show { id } => {
                output(&commands::portfolio_show(ctx, &id)?, human)
            }
            PortfolioCommands::Update {
                id,
                name,
                description,
                owner,
                health_score,
                total_budget,
                allocated_budget,
                team_size,
                utilization,
                project_count,
            } => {
                let update = commands::PortfolioUpdate {
                    name,
                    description,
                    owner_id: owner,
                    health_score,
                    total_budget,
                    allocated_budget,
                    team_size,
                    utilization,
                    project_count,
                };
                output(&commands::portfolio_update(ctx, &id, update)?, human);
            }
            PortfolioCommands::Delete { id } => {
                output(&commands::portfolio_delete(ctx, &id)?, human)
            }
            PortfolioCommands::RecomputeHealth { id } => {
                output(&commands::portfolio_recompute_health(ctx, &id)?, human)
            }
            PortfolioCommands::Stats { id } => {
                output(&commands::portfolio_stats(ctx, &id)?, human)
            }
        },

        Commands::Project { command } => match command {
            ProjectCommands::Create {
                name,
                description,
                status,
                budget,
                spent,
                start,
                end,
                portfolio,
                owner,
                health_score,
                risk_level,
                tag,
            } => {
                let input = commands::NewProject {
                    name,
                    description,
                    status: parse(status)?,
                    budget,
                    spent_budget: spent,
                    start,
                    end,
                    portfolio_id: portfolio,
                    owner_id: owner,
                    health_score,
                    risk_level: parse(risk_level)?,
                    tags: tag,
                };
                output(&commands::project_create(ctx, input)?, human);
            }
            ProjectCommands::List {
                portfolio,
                status,
                owner,
                tag,
            } => {
                let filter = ProjectFilter {
                    portfolio_id: portfolio,
                    status: parse(status)?,
                    owner_id: owner,
                    tag,
                };
                output(&commands::project_list(ctx, &filter)?, human);
            }
            ProjectCommands::Show { id } => output(&commands::project_show(ctx, &id)?, human),
            ProjectCommands::Update {
                id,
                name,
                description,
                status,
                budget,
                spent,
                start,
                end,
                portfolio,
                owner,
                health_score,
                risk_level,
                add_tag,
                remove_tag,
            } => {
                let update = commands::ProjectUpdate {
                    name,
                    description,
                    status: parse(status)?,
                    budget,
                    spent_budget: spent,
                    start,
                    end,
                    portfolio_id: portfolio,
                    owner_id: owner,
                    health_score,
                    risk_level: parse(risk_level)?,
                    add_tags: add_tag,
                    remove_tags: remove_tag,
                };
                output(&commands::project_update(ctx, &id, update)?, human);
            }
            ProjectCommands::Delete { id } => {
                output(&commands::project_delete(ctx, &id)?, human)
            }
            ProjectCommands::MilestoneAdd {
                id,
                name,
                date,
                status,
            } => {
                let result =
                    commands::project_milestone_add(ctx, &id, name, &date, parse(status)?)?;
                output(&result, human);
            }
            ProjectCommands::MilestoneStatus { id, name, status } => {
                let result =
                    commands::project_milestone_status(ctx, &id, &name, status.parse()?)?;
                output(&result, human);
            }
        },

        Commands::Risk { command } => match command {
            RiskCommands::Create {
                title,
                project,
                probability,
                impact,
                severity,
                status,
                description,
                mitigation,
            } => {
                let input = commands::NewRisk {
                    project_id: project,
                    title,
                    description,
                    severity: parse(severity)?,
                    status: parse(status)?,
                    probability,
                    impact,
                    mitigation_plan: mitigation,
                };
                output(&commands::risk_create(ctx, input)?, human);
            }
            RiskCommands::List {
                project,
                severity,
                status,
            } => {
                let filter = RiskFilter {
                    project_id: project,
                    severity: parse(severity)?,
                    status: parse(status)?,
                };
                output(&commands::risk_list(ctx, &filter)?, human);
            }
            RiskCommands::Show { id } => output(&commands::risk_show(ctx, &id)?, human),
            RiskCommands::Update {
                id,
                title,
                description,
                severity,
                status,
                probability,
                impact,
                mitigation,
            } => {
                let update = commands::RiskUpdate {
                    title,
                    description,
                    severity: parse(severity)?,
                    status: parse(status)?,
                    probability,
                    impact,
                    mitigation_plan: mitigation,
                };
                output(&commands::risk_update(ctx, &id, update)?, human);
            }
            RiskCommands::Delete { id } => output(&commands::risk_delete(ctx, &id)?, human),
            RiskCommands::Summary { project, portfolio } => {
                let scope = Scope::from_ids(project, portfolio, None)?;
                output(&commands::risk_summary(ctx, scope)?, human);
            }
        },

        Commands::Standard { command } => match command {
            StandardCommands::Create {
                name,
                version,
                description,
            } => {
                let result = commands::standard_create(ctx, name, version, description)?;
                output(&result, human);
            }
            StandardCommands::List => output(&commands::standard_list(ctx)?, human),
            StandardCommands::Show { id } => output(&commands::standard_show(ctx, &id)?, human),
            StandardCommands::Delete { id } => {
                output(&commands::standard_delete(ctx, &id)?, human)
            }
            StandardCommands::CriterionAdd {
                id,
                name,
                weight,
                category,
                description,
            } => {
                let criterion = Criterion {
                    name,
                    description,
                    category,
                    weight,
                };
                output(&commands::standard_criterion_add(ctx, &id, criterion)?, human);
            }
        },

        Commands::Compliance { command } => match command {
            ComplianceCommands::Evaluate {
                project,
                standard,
                score,
                criterion,
                evaluator,
                notes,
            } => {
                let criterion_scores = criterion
                    .iter()
                    .map(|c| commands::parse_criterion_score(c))
                    .collect::<Result<Vec<_>>>()?;
                let input = commands::NewEvaluation {
                    project_id: project,
                    standard_id: standard,
                    overall_score: score,
                    criterion_scores,
                    evaluator_id: evaluator,
                    notes,
                };
                output(&commands::compliance_evaluate(ctx, input)?, human);
            }
            ComplianceCommands::List { project, standard } => {
                let filter = EvaluationFilter {
                    project_id: project,
                    standard_id: standard,
                };
                output(&commands::compliance_list(ctx, &filter)?, human);
            }
            ComplianceCommands::Show { id } => {
                output(&commands::compliance_show(ctx, &id)?, human)
            }
            ComplianceCommands::Summary {
                project,
                standard,
                portfolio,
            } => {
                let scope = Scope::from_ids(project, portfolio, standard)?;
                output(&commands::compliance_summary(ctx, scope)?, human);
            }
        },

        Commands::Dashboard => output(&commands::dashboard(ctx)?, human),

        Commands::Access { command } => match command {
            AccessCommands::Check {
                resource,
                action,
                role,
            } => {
                let result =
                    commands::access_check(ctx, parse(role)?, resource.parse()?, action.parse()?)?;
                output(&result, human);
            }
            AccessCommands::Matrix { role } => {
                output(&commands::access_matrix(parse(role)?), human)
            }
        },

        // Dispatched in run_command without an acting user
        Commands::Config { .. } => {}
        #[cfg(feature = "serve")]
        Commands::Serve { .. } => {}
    }
    Ok(())
}
