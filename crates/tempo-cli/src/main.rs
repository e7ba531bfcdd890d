use clap::{Parser, Subcommand};
use tempo_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "tempo", version, about = "Tempo scheduling and notification-rule CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build schedules from JSON requests
    Schedule {
        #[command(subcommand)]
        action: commands::schedule::ScheduleAction,
    },
    /// Inspect energy curves
    Energy {
        #[command(subcommand)]
        action: commands::energy::EnergyAction,
    },
    /// Notification rule management
    Rules {
        #[command(subcommand)]
        action: commands::rules::RulesAction,
    },
    /// Run notification passes
    Notify {
        #[command(subcommand)]
        action: commands::notify::NotifyAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Logs go to stderr so command output on stdout stays machine-readable.
/// `TEMPO_LOG` wins over the configured `logging.filter`.
fn init_tracing() {
    let filter = std::env::var("TEMPO_LOG")
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| {
            let configured = Config::load_or_default().logging.filter;
            EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new("warn"))
        });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Schedule { action } => commands::schedule::run(action),
        Commands::Energy { action } => commands::energy::run(action),
        Commands::Rules { action } => commands::rules::run(action),
        Commands::Notify { action } => commands::notify::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
