//! Energy curve command for displaying chronotype presets.

use clap::Subcommand;
use tempo_core::{Config, EnergyProfile};

#[derive(Subcommand)]
pub enum EnergyAction {
    /// Show an energy curve
    Show {
        /// Preset name (morning-person, night-owl, steady); defaults to the configured profile
        preset: Option<String>,
        /// Minimum weight counted as a peak hour
        #[arg(long, default_value_t = 0.8)]
        peak: f64,
    },
}

pub fn run(action: EnergyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        EnergyAction::Show { preset, peak } => show_energy_curve(preset, peak),
    }
}

fn show_energy_curve(preset: Option<String>, peak: f64) -> Result<(), Box<dyn std::error::Error>> {
    let (title, profile) = match preset {
        Some(name) => {
            let profile = EnergyProfile::from_preset_name(&name).ok_or_else(|| {
                format!("Invalid preset: '{name}'. Use morning-person, night-owl or steady")
            })?;
            (name, profile)
        }
        None => (
            "Configured".to_string(),
            Config::load_or_default().scheduler.energy,
        ),
    };
    let curve = profile.resolve()?;

    println!("{}", curve.render_ascii_chart(&title));

    let peaks: Vec<String> = curve
        .peak_hours(peak)
        .iter()
        .map(|h| format!("{h:02}:00"))
        .collect();
    if peaks.is_empty() {
        println!("Peak hours: none at or above {:.0}%", peak * 100.0);
    } else {
        println!("Peak hours: {}", peaks.join(", "));
    }

    Ok(())
}
