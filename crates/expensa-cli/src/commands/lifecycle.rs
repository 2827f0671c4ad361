//! Lifecycle command - replay scripted events against an in-memory ledger.
//!
//! Script format:
//!
//! ```json
//! {
//!   "owner": { "id": "alice", "role": "employee" },
//!   "expense": { "amount": { "amount": "45.80", "currency": "USD" }, "expense_date": "2024-03-15", ... },
//!   "steps": [
//!     { "actor": { "id": "alice", "role": "employee" }, "event": "submit" },
//!     { "actor": { "id": "bob", "role": "manager" }, "event": "reject", "reason": "Needs itemization" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;
use console::style;
use serde::{Deserialize, Serialize};
use tracing::info;

use expensa_core::{Actor, ExpenseDraft, ExpenseEvent, ExpenseRecord, InMemoryStore, Ledger};

use super::load_config;

/// Arguments for the lifecycle command.
#[derive(Args)]
pub struct LifecycleArgs {
    /// Script file with the expense and the events to apply
    #[arg(required = true)]
    script: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Stop at the first refused event and exit with an error
    #[arg(long)]
    strict: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON report with the final record
    Json,
    /// One line per step
    Text,
}

#[derive(Debug, Deserialize)]
struct Script {
    owner: Actor,
    expense: ExpenseDraft,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    actor: Actor,
    #[serde(default)]
    at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    event: ExpenseEvent,
}

#[derive(Debug, Serialize)]
struct StepReport {
    step: usize,
    event: &'static str,
    actor: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct Report {
    steps: Vec<StepReport>,
    record: ExpenseRecord,
}

pub async fn run(args: LifecycleArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if !args.script.exists() {
        anyhow::bail!("Script file not found: {}", args.script.display());
    }
    let script: Script = serde_json::from_str(&fs::read_to_string(&args.script)?)
        .map_err(|e| anyhow::anyhow!("Invalid script {}: {}", args.script.display(), e))?;

    let mut ledger = Ledger::from_config(InMemoryStore::new(), &config);
    let created = ledger.create(
        script.expense,
        &script.owner,
        script.created_at.unwrap_or_else(Utc::now),
    )?;
    let id = created.id().clone();
    info!("Replaying {} steps for expense {}", script.steps.len(), id);

    if matches!(args.format, OutputFormat::Text) {
        println!("created {} {}", id, style(created.status()).cyan());
    }

    let mut reports = Vec::with_capacity(script.steps.len());
    for (i, step) in script.steps.into_iter().enumerate() {
        let name = step.event.name();
        let now = step.at.unwrap_or_else(Utc::now);

        let result = ledger.transition(&id, step.event, &step.actor, now);
        let status = ledger.get(&id)?.status();
        let report = StepReport {
            step: i + 1,
            event: name,
            actor: step.actor.id.to_string(),
            status: status.to_string(),
            error: result.as_ref().err().map(|e| e.to_string()),
        };

        if matches!(args.format, OutputFormat::Text) {
            match &report.error {
                None => println!(
                    "{} step {}: {} by {} -> {}",
                    style("✓").green(),
                    report.step,
                    report.event,
                    report.actor,
                    style(&report.status).cyan()
                ),
                Some(err) => println!(
                    "{} step {}: {} by {} refused: {}",
                    style("✗").red(),
                    report.step,
                    report.event,
                    report.actor,
                    err
                ),
            }
        }

        let failed = report.error.is_some();
        reports.push(report);
        if failed && args.strict {
            if let Err(err) = result {
                return Err(err.into());
            }
        }
    }

    let record = ledger.get(&id)?;
    match args.format {
        OutputFormat::Json => {
            let report = Report {
                steps: reports,
                record,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("final status: {}", style(record.status()).bold());
            for flag in &record.policy_violations {
                println!("  {} {}", style("⚠").yellow(), flag);
            }
        }
    }

    Ok(())
}
