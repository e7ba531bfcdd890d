use std::path::PathBuf;

use clap::Subcommand;
use tempo_core::{Config, ScheduleRequest, SmartEngine};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Build a schedule from a JSON request file ("-" reads stdin)
    Build {
        /// Path to the request JSON
        request: PathBuf,
        /// Print a table instead of JSON
        #[arg(long)]
        table: bool,
    },
}

pub fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ScheduleAction::Build { request, table } => {
            let content = if request.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                std::fs::read_to_string(&request)?
            };
            let request: ScheduleRequest = serde_json::from_str(&content)?;

            let engine = SmartEngine::from_config(&Config::load_or_default());
            let outcome = engine.build_schedule(&request)?;

            if !table {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }

            println!("Scheduled ({}):", outcome.schedule.len());
            for entry in &outcome.schedule.entries {
                println!(
                    "  {} - {}  {}",
                    entry.start.format("%Y-%m-%d %H:%M"),
                    entry.end.format("%H:%M"),
                    entry.task_id
                );
            }
            for pause in &outcome.schedule.breaks {
                println!(
                    "  {} - {}  (break)",
                    pause.start.format("%Y-%m-%d %H:%M"),
                    pause.end.format("%H:%M")
                );
            }
            if !outcome.is_complete() {
                println!();
                println!("Unscheduled ({}):", outcome.unscheduled.len());
                for u in &outcome.unscheduled {
                    println!("  {} ({:?})", u.task_id, u.reason);
                }
            }
        }
    }
    Ok(())
}
