use chrono::{DateTime, Utc};
use clap::Subcommand;
use ecoquest_core::{Config, Difficulty, NewChallenge};

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum ChallengeAction {
    /// Create a challenge
    Create {
        /// Organizer's user ID
        organizer_id: String,
        /// Challenge title
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        category: String,
        /// Completion bonus
        #[arg(long)]
        points: i64,
        /// Duration in days
        #[arg(long)]
        days: i64,
        /// easy, medium or hard
        #[arg(long, default_value = "medium")]
        difficulty: Difficulty,
        /// Start time (RFC 3339); defaults to now
        #[arg(long)]
        start: Option<DateTime<Utc>>,
    },
    /// List challenges, newest first
    List,
    /// Show a challenge and its participants
    Show {
        /// Challenge ID
        challenge_id: String,
    },
    /// Join a challenge
    Join {
        /// Challenge ID
        challenge_id: String,
        /// User ID
        user_id: String,
    },
    /// Set a participant's progress (0-100)
    Progress {
        /// Challenge ID
        challenge_id: String,
        /// User ID
        user_id: String,
        /// Progress percentage
        #[arg(allow_negative_numbers = true)]
        progress: i64,
    },
}

pub fn run(action: ChallengeAction, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(config)?;

    match action {
        ChallengeAction::Create {
            organizer_id,
            title,
            description,
            category,
            points,
            days,
            difficulty,
            start,
        } => {
            let mut new = NewChallenge::new(title, description, category, points, days)
                .with_difficulty(difficulty);
            if let Some(start) = start {
                new = new.starting_at(start);
            }
            print_json(&engine.create_challenge(&organizer_id, new)?)?;
        }
        ChallengeAction::List => {
            print_json(&engine.list_challenges()?)?;
        }
        ChallengeAction::Show { challenge_id } => {
            let challenge = engine.get_challenge(&challenge_id)?;
            let participants = engine.participants(&challenge_id)?;
            print_json(&serde_json::json!({
                "challenge": challenge,
                "participants": participants,
            }))?;
        }
        ChallengeAction::Join {
            challenge_id,
            user_id,
        } => {
            print_json(&engine.join_challenge(&challenge_id, &user_id)?)?;
        }
        ChallengeAction::Progress {
            challenge_id,
            user_id,
            progress,
        } => {
            let participation = engine.update_challenge_progress(&challenge_id, &user_id, progress)?;
            print_json(&participation)?;
        }
    }
    Ok(())
}
