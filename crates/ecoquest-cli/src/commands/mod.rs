pub mod audit;
pub mod challenge;
pub mod config;
pub mod habit;
pub mod leaderboard;
pub mod user;

use ecoquest_core::{Config, Engine};
use serde::Serialize;

pub(crate) fn open_engine(config: Config) -> Result<Engine, Box<dyn std::error::Error>> {
    tracing::debug!(database = %config.storage.database_file, "opening engine");
    Ok(Engine::open(config)?)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
