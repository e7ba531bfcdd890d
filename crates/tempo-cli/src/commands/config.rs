//! `tempo config`: inspect and edit `config.toml`.
//!
//! Keys are dotted section paths such as `scheduler.slot_minutes` or
//! `notifications.batch_window_minutes`. Edits are validated before they are
//! written, so a rejected value leaves the file untouched.

use clap::Subcommand;
use tempo_core::Config;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value
    Get { key: String },
    /// Change one value and save
    Set { key: String, value: String },
    /// Print the whole configuration as TOML
    Show,
    /// Print where the configuration file lives
    Path,
    /// Overwrite the file with built-in defaults
    Reset,
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Get { key } => print_value(&key),
        ConfigAction::Set { key, value } => update_value(&key, &value),
        ConfigAction::Show => show(),
        ConfigAction::Path => {
            println!("{}", Config::path()?.display());
            Ok(())
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            tracing::info!("configuration reset");
            println!("reset {}", Config::path()?.display());
            Ok(())
        }
    }
}

fn print_value(key: &str) -> CliResult {
    let value = Config::load()?
        .get(key)
        .ok_or_else(|| format!("no such config key: {key}"))?;
    println!("{value}");
    Ok(())
}

fn update_value(key: &str, value: &str) -> CliResult {
    let mut config = Config::load()?;
    let before = config.get(key);
    config.set(key, value)?;
    config.save()?;
    match before {
        Some(old) if old != value => println!("{key}: {old} -> {value}"),
        _ => println!("{key} = {value}"),
    }
    Ok(())
}

fn show() -> CliResult {
    let text = toml::to_string_pretty(&Config::load()?)?;
    print!("{text}");
    Ok(())
}
