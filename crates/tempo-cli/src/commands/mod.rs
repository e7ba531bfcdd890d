pub mod config;
pub mod energy;
pub mod notify;
pub mod rules;
pub mod schedule;

use chrono::{DateTime, Utc};

/// Parse an optional `--now` override, defaulting to the current time.
pub fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    match now {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .map_err(|e| format!("invalid --now '{raw}': {e}"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}
