use clap::{Parser, Subcommand};
use ecoquest_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "ecoquest", version, about = "EcoQuest points, challenges and leaderboards")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User accounts
    User {
        #[command(subcommand)]
        action: commands::user::UserAction,
    },
    /// Habit logging and statistics
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Challenge management and progress
    Challenge {
        #[command(subcommand)]
        action: commands::challenge::ChallengeAction,
    },
    /// Leaderboards and rank lookup
    Leaderboard {
        #[command(subcommand)]
        action: commands::leaderboard::LeaderboardAction,
    },
    /// Check a user's total against the ledger and paid bonuses
    Audit {
        /// User ID
        user_id: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing(config: &Config) {
    // stderr keeps stdout clean for JSON output.
    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.logging.filter))
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(&config);

    match cli.command {
        Commands::User { action } => commands::user::run(action, config),
        Commands::Habit { action } => commands::habit::run(action, config),
        Commands::Challenge { action } => commands::challenge::run(action, config),
        Commands::Leaderboard { action } => commands::leaderboard::run(action, config),
        Commands::Audit { user_id } => commands::audit::run(&user_id, config),
        Commands::Config { action } => commands::config::run(action, config),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
