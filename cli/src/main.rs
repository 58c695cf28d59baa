//! icgs - ICGS economic-transaction validator CLI
//!
//! Drives the `icgs-core` validation engine against an on-disk session
//! log: register accounts and sectors, submit transactions (each
//! carrying its own measure patterns), and inspect the resulting
//! statistics.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use icgs_core::ValidationOutcome;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

mod config;
mod session;

use config::CliConfig;
use session::{MeasureDef, Session, TransactionDef};

#[derive(Parser)]
#[command(name = "icgs")]
#[command(about = "ICGS economic-transaction validator", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the session log (JSON), created on first use.
    #[arg(short, long, default_value = "icgs-session.json")]
    session: PathBuf,

    /// Optional TOML file overriding ValidationConfig defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Registers accounts, auto-assigning taxonomy characters.
    ConfigureAccounts {
        /// Comma-separated account ids.
        #[arg(required = true, value_delimiter = ',')]
        accounts: Vec<String>,
    },

    /// Registers accounts against a named economic sector's character pool.
    ConfigureAccountsBySector {
        #[arg(long)]
        sector: String,
        /// Comma-separated account ids.
        #[arg(required = true, value_delimiter = ',')]
        accounts: Vec<String>,
    },

    /// Submits a transaction for validation.
    AddTransaction {
        #[arg(long)]
        id: String,
        #[arg(long)]
        source: String,
        #[arg(long)]
        target: String,
        #[arg(long)]
        amount: String,
        /// `measure_id|account_id|primary_pattern|primary_weight|acceptable_value`, repeatable.
        #[arg(long = "source-measure", value_parser = parse_source_measure)]
        source_measures: Vec<MeasureDef>,
        /// `measure_id|account_id|primary_pattern|primary_weight|required_value`, repeatable.
        #[arg(long = "target-measure", value_parser = parse_target_measure)]
        target_measures: Vec<MeasureDef>,
    },

    /// Prints accumulated usage statistics.
    Stats,

    /// Runs the taxonomy integrity sweep.
    ValidateIntegrity,
}

fn parse_measure_fields(s: &str) -> Result<(String, String, String, Decimal, Decimal), String> {
    let parts: Vec<&str> = s.splitn(5, '|').collect();
    let [measure_id, account_id, pattern, weight, value] = <[&str; 5]>::try_from(parts.clone())
        .map_err(|_| format!("expected measure_id|account_id|pattern|weight|value, got '{s}' ({} field(s))", parts.len()))?;
    let weight = Decimal::from_str(weight).map_err(|e| format!("invalid weight '{weight}': {e}"))?;
    let value = Decimal::from_str(value).map_err(|e| format!("invalid value '{value}': {e}"))?;
    Ok((measure_id.to_string(), account_id.to_string(), pattern.to_string(), weight, value))
}

fn parse_source_measure(s: &str) -> Result<MeasureDef, String> {
    let (measure_id, account_id, primary_pattern, primary_weight, acceptable_value) = parse_measure_fields(s)?;
    Ok(MeasureDef {
        measure_id,
        account_id,
        primary_pattern,
        primary_weight,
        acceptable_value,
        required_value: Decimal::ZERO,
        secondary_patterns: Vec::new(),
    })
}

fn parse_target_measure(s: &str) -> Result<MeasureDef, String> {
    let (measure_id, account_id, primary_pattern, primary_weight, required_value) = parse_measure_fields(s)?;
    Ok(MeasureDef {
        measure_id,
        account_id,
        primary_pattern,
        primary_weight,
        acceptable_value: Decimal::ZERO,
        required_value,
        secondary_patterns: Vec::new(),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::init();
    }

    let cfg = CliConfig::load(cli.config, cli.session.clone())?;
    let mut session = Session::load(&cfg.session_path, cfg.validation)?;

    match cli.command {
        Commands::ConfigureAccounts { accounts } => {
            let mapping = session
                .configure_accounts(accounts)
                .context("configure-accounts failed")?;
            for (account, c) in mapping {
                println!("{} -> {}", account.bold(), c.to_string().cyan());
            }
            session.save(&cfg.session_path)?;
        }

        Commands::ConfigureAccountsBySector { sector, accounts } => {
            let mapping = session
                .configure_accounts_by_sector(sector, accounts)
                .context("configure-accounts-by-sector failed")?;
            for (account, c) in mapping {
                println!("{} -> {}", account.bold(), c.to_string().cyan());
            }
            session.save(&cfg.session_path)?;
        }

        Commands::AddTransaction {
            id,
            source,
            target,
            amount,
            source_measures,
            target_measures,
        } => {
            let amount = Decimal::from_str(&amount).with_context(|| format!("invalid amount '{amount}'"))?;
            let def = TransactionDef {
                id: id.clone(),
                source_account: source,
                target_account: target,
                amount,
                source_measures,
                target_measures,
            };
            let outcome = session.add_transaction(def)?;
            match outcome {
                ValidationOutcome::Committed(solution) => {
                    println!("{} {} ({} iterations)", "committed".green().bold(), id, solution.iterations_used);
                }
                ValidationOutcome::Rejected(reason) => {
                    println!("{} {}: {}", "rejected".red().bold(), id, reason);
                }
            }
            session.save(&cfg.session_path)?;
        }

        Commands::Stats => {
            let stats = session.manager.stats();
            let metrics = session.manager.metrics();
            println!("{}", format!("usage statistics @ {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")).bold());
            println!("  transactions_added:       {}", stats.transactions_added);
            println!("  transactions_rejected:    {}", stats.transactions_rejected);
            println!("  nfa_explosions_detected:  {}", stats.nfa_explosions_detected);
            println!("  simplex_feasible:         {}", stats.simplex_feasible);
            println!("  simplex_infeasible:       {}", stats.simplex_infeasible);
            println!("  warm_starts_used:         {}", stats.warm_starts_used);
            println!("  cold_starts_used:         {}", stats.cold_starts_used);
            println!("  cross_validations:        {}", stats.cross_validations_performed);
            println!("  avg_enumeration_time_ms:  {:.3}", stats.avg_enumeration_time_ms());
            println!("  avg_simplex_solve_time_ms:{:.3}", stats.avg_simplex_solve_time_ms());
            println!("  nfa_version:              {}", session.manager.nfa_version());
            println!("  total_accounts:           {}", metrics.total_accounts);
            println!("  total_snapshots:          {}", metrics.total_snapshots);
            println!("  frozen_snapshot_count:    {}", metrics.frozen_snapshot_count);
        }

        Commands::ValidateIntegrity => {
            let errors = session.manager.validate_integrity();
            if errors.is_empty() {
                println!("{}", "taxonomy is internally consistent".green());
            } else {
                println!("{}", format!("{} integrity violation(s) found:", errors.len()).red().bold());
                for err in errors {
                    println!("  - {err}");
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
