//! # EcoQuest Core Library
//!
//! Gamification ledger and ranking engine for EcoQuest: users log
//! sustainability habits, earn points, join time-boxed challenges and compare
//! standings on leaderboards. The `ecoquest` CLI is a thin layer over this
//! crate; an HTTP service would be another.
//!
//! ## Architecture
//!
//! - **Ledger**: append-only habit log; every append credits points in the
//!   same transaction
//! - **Points**: the only writer of `users.total_points`, one atomic `UPDATE`
//! - **Challenges**: participation state machine with a once-only completion
//!   bonus latch
//! - **Ranking**: global, windowed and per-user rank queries (read-only)
//! - **Storage**: SQLite through `rusqlite`, versioned migrations, TOML config
//!
//! ## Key Components
//!
//! - [`Engine`]: the operation surface
//! - [`Database`]: connection handle and transactions
//! - [`Config`]: application configuration
//! - [`Clock`]: injected time source

pub mod challenge;
pub mod clock;
pub mod engine;
pub mod error;
pub mod ledger;
mod points;
pub mod ranking;
pub mod storage;
pub mod user;

pub use challenge::{
    Challenge, ChallengeStatus, Difficulty, NewChallenge, Participation, ProgressState,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Engine, PointsAudit};
pub use error::{ConfigError, CoreError, DatabaseError, ErrorKind, ValidationError};
pub use ledger::{Category, HabitStats, Impact, LedgerEntry, NewHabit};
pub use ranking::{GlobalStanding, UserRank, Window, WindowedStanding};
pub use storage::{Config, Database};
pub use user::{Badge, NewUser, User};
