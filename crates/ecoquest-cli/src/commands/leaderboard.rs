use clap::Subcommand;
use ecoquest_core::Config;

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum LeaderboardAction {
    /// All-time standings by total points
    Global {
        /// Maximum rows (defaults to leaderboard.default_limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Standings over the trailing leaderboard.window_days
    Weekly {
        /// Maximum rows (defaults to leaderboard.default_limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// A single user's rank
    Rank {
        /// User ID
        user_id: String,
    },
}

pub fn run(action: LeaderboardAction, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(config)?;

    match action {
        LeaderboardAction::Global { limit } => print_json(&engine.get_global_leaderboard(limit)?),
        LeaderboardAction::Weekly { limit } => print_json(&engine.get_weekly_leaderboard(limit)?),
        LeaderboardAction::Rank { user_id } => print_json(&engine.get_user_rank(&user_id)?),
    }
}
