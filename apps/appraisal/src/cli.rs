//! # CLI
//!
//! Command definitions and the `cmd_*` functions behind them. Every command
//! opens the database, runs one operation and prints a human or JSON report.

use crate::api;
use crate::config::ServerConfig;
use crate::seed::seed_demo;
use appraisal_core::directory::NewUser;
use appraisal_core::formats::{
    SNAPSHOT_MAGIC, snapshot_from_bytes, snapshot_from_json, snapshot_to_bytes, snapshot_to_json,
};
use appraisal_core::period::NewPeriod;
use appraisal_core::{PeriodType, ProfileId, ReviewCycle, ReviewPeriodId, Role, Store};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};

// =============================================================================
// COMMAND LINE
// =============================================================================

/// Performance review cycle server.
#[derive(Debug, Parser)]
#[command(name = "appraisal", version, about)]
pub struct Cli {
    /// Database file.
    #[arg(long, global = true, env = "APPRAISAL_DB", default_value = "appraisal.redb")]
    pub database: PathBuf,

    /// Log filter. `RUST_LOG` takes precedence when set.
    #[arg(long, global = true, env = "APPRAISAL_LOG", default_value = "info")]
    pub log: String,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an empty database.
    Init {
        /// Replace an existing database.
        #[arg(long)]
        force: bool,
    },
    /// Run the HTTP API.
    Serve(ServerConfig),
    /// Show record counts.
    Status,
    /// Load the demo employees, accounts, profiles and library.
    Seed,
    /// Manage login accounts.
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Manage review periods.
    Period {
        #[command(subcommand)]
        command: PeriodCommand,
    },
    /// Generate score cards for an open period.
    Generate {
        /// Review period id.
        period: u64,
        /// Eligibility profile ids, in priority order.
        #[arg(long = "profile", required = true)]
        profiles: Vec<u64>,
    },
    /// Write a snapshot of the database.
    Export {
        output: PathBuf,
        /// `binary` or `json`.
        #[arg(long, default_value = "binary")]
        format: String,
    },
    /// Load a snapshot into an empty database.
    Import { input: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Add a login account.
    Add {
        username: String,
        email: String,
        #[arg(long, env = "APPRAISAL_USER_PASSWORD", hide_env_values = true)]
        password: String,
        /// Role label, snake case name or id.
        #[arg(long, default_value = "Employee")]
        role: String,
        /// Employee code to link.
        #[arg(long)]
        employee: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum PeriodCommand {
    /// Create a closed review period.
    Create {
        name: String,
        /// Q1, Q2, Q3, Q4, Annual or Mid-Year.
        #[arg(long = "type", default_value = "Annual")]
        period_type: String,
        /// Start date, YYYY-MM-DD.
        #[arg(long)]
        start: String,
        /// End date, YYYY-MM-DD.
        #[arg(long)]
        end: String,
        #[arg(long)]
        financial_period: Option<String>,
    },
    /// List periods, latest first.
    List,
    /// Open a period (closes any other open period).
    Open { id: u64 },
    /// Close a period.
    Close { id: u64 },
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let db = cli.database.as_path();
    match cli.command {
        Command::Init { force } => cmd_init(db, force),
        Command::Serve(config) => cmd_serve(db, config).await,
        Command::Status => cmd_status(db, cli.json),
        Command::Seed => cmd_seed(db, cli.json),
        Command::User {
            command:
                UserCommand::Add {
                    username,
                    email,
                    password,
                    role,
                    employee,
                },
        } => cmd_user_add(db, &username, &email, &password, &role, employee.as_deref()),
        Command::Period { command } => match command {
            PeriodCommand::Create {
                name,
                period_type,
                start,
                end,
                financial_period,
            } => cmd_period_create(db, &name, &period_type, &start, &end, financial_period.as_deref())
                .map(|_| ()),
            PeriodCommand::List => cmd_period_list(db, cli.json),
            PeriodCommand::Open { id } => cmd_period_open(db, id, true),
            PeriodCommand::Close { id } => cmd_period_open(db, id, false),
        },
        Command::Generate { period, profiles } => cmd_generate(db, period, &profiles, cli.json),
        Command::Export { output, format } => cmd_export(db, &output, &format),
        Command::Import { input } => cmd_import(db, &input),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Open the database, creating it if missing.
pub fn open_cycle(db_path: &Path) -> Result<ReviewCycle, Box<dyn Error>> {
    Ok(ReviewCycle::new(Store::open(db_path)?))
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, Box<dyn Error>> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("invalid {field} date '{value}': {err}").into())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Create an empty database file.
pub fn cmd_init(db_path: &Path, force: bool) -> Result<(), Box<dyn Error>> {
    if db_path.exists() {
        if !force {
            return Err(format!(
                "database already exists at {} (use --force to replace it)",
                db_path.display()
            )
            .into());
        }
        std::fs::remove_file(db_path)?;
    }
    open_cycle(db_path)?;
    println!("Initialized database at {}", db_path.display());
    Ok(())
}

/// Run the HTTP server on the database, or on a seeded in-memory store.
pub async fn cmd_serve(db_path: &Path, config: ServerConfig) -> Result<(), Box<dyn Error>> {
    config.validate()?;
    let cycle = if config.in_memory {
        let cycle = ReviewCycle::new(Store::in_memory()?);
        seed_demo(&cycle)?;
        cycle
    } else {
        open_cycle(db_path)?
    };
    api::serve(config, cycle).await
}

pub fn cmd_status(db_path: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    let stats = open_cycle(db_path)?.stats()?;
    if json {
        return print_json(&stats);
    }
    println!("Database:        {}", db_path.display());
    println!("Review periods:  {} ({} open)", stats.periods, stats.open_periods);
    println!("Departments:     {}", stats.departments);
    println!("Positions:       {}", stats.positions);
    println!("Employees:       {}", stats.employees);
    println!("Users:           {}", stats.users);
    println!("Profiles:        {}", stats.profiles);
    println!("Library entries: {}", stats.library_entries);
    println!("Score cards:     {}", stats.score_cards);
    for (status, count) in &stats.cards_by_status {
        println!("  {status:<28} {count}");
    }
    Ok(())
}

pub fn cmd_seed(db_path: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    let report = seed_demo(&open_cycle(db_path)?)?;
    if json {
        return print_json(&report);
    }
    println!(
        "Seeded {} departments, {} positions, {} employees, {} users, {} profiles, {} library entries",
        report.departments,
        report.positions,
        report.employees,
        report.users,
        report.profiles,
        report.templates
    );
    Ok(())
}

pub fn cmd_user_add(
    db_path: &Path,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
    employee_code: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let cycle = open_cycle(db_path)?;
    let role: Role = role.parse()?;
    let employee_id = match employee_code {
        Some(code) => Some(
            cycle
                .employee_by_code(code)?
                .ok_or_else(|| format!("no employee with code '{code}'"))?
                .id,
        ),
        None => None,
    };
    let user = cycle.add_user(NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password_hash: api::auth::hash_password(password)?,
        role,
        employee_id,
    })?;
    println!("Added {} ({}) as {}", user.username, user.email, user.role);
    Ok(())
}

pub fn cmd_period_create(
    db_path: &Path,
    name: &str,
    period_type: &str,
    start: &str,
    end: &str,
    financial_period: Option<&str>,
) -> Result<ReviewPeriodId, Box<dyn Error>> {
    let period = open_cycle(db_path)?.add_period(
        NewPeriod {
            name: name.to_string(),
            period_type: period_type.parse::<PeriodType>()?,
            start_date: parse_date("start", start)?,
            end_date: parse_date("end", end)?,
            financial_period: financial_period.map(str::to_string),
            description: String::new(),
        },
        Utc::now(),
    )?;
    println!("Created review period {} '{}'", period.id, period.name);
    Ok(period.id)
}

pub fn cmd_period_list(db_path: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    let periods = open_cycle(db_path)?.list_periods()?;
    if json {
        return print_json(&periods);
    }
    if periods.is_empty() {
        println!("No review periods");
    }
    for period in &periods {
        println!(
            "{:>4}  {:<24} {:<9} {} .. {}  {}",
            period.id, period.name, period.period_type, period.start_date, period.end_date, period.status
        );
    }
    Ok(())
}

/// Open (`open = true`) or close a period.
pub fn cmd_period_open(db_path: &Path, id: u64, open: bool) -> Result<(), Box<dyn Error>> {
    let period = open_cycle(db_path)?.set_period_open(ReviewPeriodId(id), open, Utc::now())?;
    println!("Review period {} '{}' is now {}", period.id, period.name, period.status);
    Ok(())
}

pub fn cmd_generate(db_path: &Path, period: u64, profiles: &[u64], json: bool) -> Result<(), Box<dyn Error>> {
    let profile_ids: Vec<ProfileId> = profiles.iter().copied().map(ProfileId).collect();
    let report = open_cycle(db_path)?.generate(ReviewPeriodId(period), &profile_ids, None, Utc::now())?;
    if json {
        return print_json(&report);
    }
    println!(
        "Created {} score card(s), skipped {}",
        report.created.len(),
        report.skipped
    );
    if !report.without_account.is_empty() {
        println!("{} employee(s) skipped for lack of an active account", report.without_account.len());
    }
    Ok(())
}

/// Export a snapshot as `binary` (APRS) or `json`.
pub fn cmd_export(db_path: &Path, output: &Path, format: &str) -> Result<(), Box<dyn Error>> {
    let snapshot = open_cycle(db_path)?.export()?;
    let bytes = match format {
        "binary" => snapshot_to_bytes(&snapshot)?,
        "json" => snapshot_to_json(&snapshot)?.into_bytes(),
        other => return Err(format!("unknown export format '{other}' (use binary or json)").into()),
    };
    std::fs::write(output, bytes)?;
    println!(
        "Exported {} records to {}",
        snapshot.record_count(),
        output.display()
    );
    Ok(())
}

/// Import a snapshot; the format is detected from the magic bytes.
pub fn cmd_import(db_path: &Path, input: &Path) -> Result<(), Box<dyn Error>> {
    let bytes = std::fs::read(input)?;
    let snapshot = if bytes.starts_with(SNAPSHOT_MAGIC) {
        snapshot_from_bytes(&bytes)?
    } else {
        snapshot_from_json(std::str::from_utf8(&bytes)?)?
    };
    let count = open_cycle(db_path)?.import(&snapshot)?;
    println!("Imported {count} records into {}", db_path.display());
    Ok(())
}
