//! Notification rule CLI commands.

use std::path::PathBuf;

use clap::Subcommand;
use serde_json::json;
use tempo_core::{default_rules, Config, RuleEngine, RuleStore, StateSnapshot};

use super::parse_now;

#[derive(Subcommand)]
pub enum RulesAction {
    /// List stored rules
    List,
    /// Print the built-in rules as TOML
    Defaults,
    /// Enable a rule by id
    Enable { id: String },
    /// Disable a rule by id
    Disable { id: String },
    /// Evaluate enabled rules against a state snapshot
    Eval {
        /// Path to a snapshot JSON file
        snapshot: PathBuf,
        /// Evaluation time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<String>,
    },
}

pub fn run(action: RulesAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        RulesAction::List => list_rules(),
        RulesAction::Defaults => {
            #[derive(serde::Serialize)]
            struct Rules {
                rules: Vec<tempo_core::NotificationRule>,
            }
            let text = toml::to_string_pretty(&Rules {
                rules: default_rules(),
            })?;
            print!("{text}");
            Ok(())
        }
        RulesAction::Enable { id } => toggle(&id, true),
        RulesAction::Disable { id } => toggle(&id, false),
        RulesAction::Eval { snapshot, now } => evaluate(snapshot, now),
    }
}

fn open_store() -> Result<RuleStore, Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    Ok(RuleStore::open(config.rules.seed_defaults)?)
}

fn list_rules() -> Result<(), Box<dyn std::error::Error>> {
    let rules = open_store()?.load_all()?;

    if rules.is_empty() {
        println!("No rules found.");
        return Ok(());
    }

    println!("Rules ({}):", rules.len());
    for rule in rules {
        let status = if rule.enabled { "enabled" } else { "disabled" };
        println!(
            "  {} [{} {}] ({}) cooldown {}m",
            rule.id, rule.subject, rule.action, status, rule.cooldown_minutes
        );
    }
    Ok(())
}

fn toggle(id: &str, enabled: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !open_store()?.set_enabled(id, enabled)? {
        return Err(format!("Rule '{id}' not found").into());
    }
    println!("rule {id} {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

fn evaluate(snapshot: PathBuf, now: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let now = parse_now(now.as_deref())?;
    let snapshot: StateSnapshot = serde_json::from_str(&std::fs::read_to_string(&snapshot)?)?;
    let rules = open_store()?.load_enabled()?;

    let evaluation = RuleEngine::new().evaluate(&rules, &snapshot, now);
    let errors: Vec<_> = evaluation
        .errors
        .iter()
        .map(|e| json!({ "rule_id": e.rule_id, "error": e.kind.to_string() }))
        .collect();
    let output = json!({
        "candidates": evaluation.candidates,
        "errors": errors,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
