use chrono::{DateTime, Utc};
use clap::Subcommand;
use ecoquest_core::{Category, Config, Impact, NewHabit};

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Log a habit and credit its points
    Log {
        /// User ID
        user_id: String,
        /// What was done (e.g. "Biked to work")
        action: String,
        /// transport, energy, waste, water, food or other
        #[arg(long)]
        category: Category,
        /// Points earned
        #[arg(long)]
        points: i64,
        /// CO2 saved (kg)
        #[arg(long, default_value_t = 0.0)]
        co2: f64,
        /// Water saved (liters)
        #[arg(long, default_value_t = 0.0)]
        water: f64,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// When the habit happened (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Idempotency key; repeating a log with the same key is a no-op
        #[arg(long)]
        key: Option<String>,
    },
    /// List recent habit logs, newest first
    List {
        /// User ID
        user_id: String,
        /// Maximum entries (defaults to habits.recent_limit)
        #[arg(long)]
        limit: Option<usize>,
        /// Only entries logged at or after this time (RFC 3339)
        #[arg(long, conflicts_with = "limit")]
        since: Option<DateTime<Utc>>,
    },
    /// Totals and per-category counts
    Stats {
        /// User ID
        user_id: String,
    },
}

pub fn run(action: HabitAction, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(config)?;

    match action {
        HabitAction::Log {
            user_id,
            action,
            category,
            points,
            co2,
            water,
            notes,
            at,
            key,
        } => {
            let mut habit = NewHabit::new(action, category, points).with_impact(Impact::new(co2, water));
            if let Some(notes) = notes {
                habit = habit.with_notes(notes);
            }
            if let Some(at) = at {
                habit = habit.at(at);
            }
            if let Some(key) = key {
                habit = habit.with_idempotency_key(key);
            }
            print_json(&engine.log_habit(&user_id, habit)?)?;
        }
        HabitAction::List {
            user_id,
            limit,
            since,
        } => {
            let entries = match since {
                Some(since) => engine.list_habits_since(&user_id, since)?,
                None => engine.list_habits(&user_id, limit)?,
            };
            print_json(&entries)?;
        }
        HabitAction::Stats { user_id } => {
            print_json(&engine.get_habit_stats(&user_id)?)?;
        }
    }
    Ok(())
}
