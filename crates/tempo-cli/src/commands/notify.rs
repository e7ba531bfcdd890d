//! Notification pass command.
//!
//! Rule cooldowns are kept in `cooldowns.json` in the data directory, so a
//! subject that fired in one run stays quiet in the next until its cooldown
//! lapses.

use std::path::PathBuf;

use clap::Subcommand;
use serde_json::json;
use tempo_core::{
    data_dir, Config, DeliveryError, JsonFileRepository, NotificationBatch, NotificationSink,
    RuleStore, ShardedCooldownStore, SmartEngine,
};

use super::parse_now;

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Evaluate rules for one workspace and print the delivered batches
    Run {
        /// Directory holding `<workspace>.json` snapshots
        #[arg(long)]
        dir: PathBuf,
        /// Workspace name
        #[arg(long)]
        workspace: String,
        /// Pass time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<String>,
    },
}

/// Writes each batch to stdout as one JSON line.
struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn deliver(&self, batch: &NotificationBatch) -> Result<(), DeliveryError> {
        let line =
            serde_json::to_string(batch).map_err(|e| DeliveryError::Rejected(e.to_string()))?;
        println!("{line}");
        Ok(())
    }
}

pub fn run(action: NotifyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        NotifyAction::Run {
            dir,
            workspace,
            now,
        } => {
            let now = parse_now(now.as_deref())?;
            let config = Config::load_or_default();
            let rules = RuleStore::open(config.rules.seed_defaults)?.load_enabled()?;
            tracing::debug!(rules = rules.len(), workspace = %workspace, "loaded enabled rules");

            let cooldown_path = data_dir()?.join("cooldowns.json");
            let cooldowns = ShardedCooldownStore::load(&cooldown_path)?;
            let engine = SmartEngine::with_cooldown_store(&config, cooldowns);
            let repository = JsonFileRepository::new(dir);
            let report =
                engine.run_notification_pass(&repository, &StdoutSink, &workspace, &rules, now)?;
            engine.rule_engine().cooldowns().save(&cooldown_path)?;

            let summary = json!({
                "workspace": report.workspace,
                "candidates": report.candidates,
                "delivered": report.delivered.len(),
                "failed": report.failed.len(),
                "rule_errors": report
                    .rule_errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>(),
            });
            eprintln!("{summary}");
        }
    }
    Ok(())
}
