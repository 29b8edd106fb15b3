//! The operation surface the outer layers (CLI, an HTTP service) call.
//!
//! [`Engine`] wires the ledger, points accumulator, challenge tracker and
//! ranking queries to one [`Database`] and one [`Clock`]. It is `Send +
//! Sync`; share it between request threads behind an `Arc`.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::challenge::{tracker, Challenge, NewChallenge, Participation};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::ledger::{store, HabitStats, LedgerEntry, NewHabit};
use crate::points;
use crate::ranking::{query, GlobalStanding, UserRank, Window, WindowedStanding};
use crate::storage::{Config, Database};
use crate::user::{self, NewUser, User};

/// Outcome of checking a user's total against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsAudit {
    pub user_id: String,
    /// Stored running total.
    pub total_points: i64,
    /// Sum of the user's ledger entries.
    pub ledger_points: i64,
    /// Sum of completion bonuses paid to the user.
    pub bonus_points: i64,
}

impl PointsAudit {
    pub fn expected_total(&self) -> i64 {
        self.ledger_points + self.bonus_points
    }

    pub fn is_consistent(&self) -> bool {
        self.total_points == self.expected_total()
    }
}

pub struct Engine {
    db: Database,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl Engine {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: Config) -> Self {
        Self { db, clock, config }
    }

    /// Open the configured database with the system clock.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config)?;
        Ok(Self::new(db, Arc::new(SystemClock), config))
    }

    /// In-memory engine with default configuration.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self::new(Database::open_memory()?, clock, Config::default()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Clock time truncated to the stored (microsecond) precision.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    // ── Accounts ─────────────────────────────────────────────────────

    pub fn register_user(&self, new: NewUser) -> Result<User> {
        let now = self.now();
        self.db.write(|tx| user::insert(tx, new, now))
    }

    pub fn get_user(&self, user_id: &str) -> Result<User> {
        self.db.read(|conn| user::require(conn, user_id))
    }

    // ── Ledger & points ──────────────────────────────────────────────

    /// Append a habit log and credit its points exactly once.
    pub fn log_habit(&self, user_id: &str, habit: NewHabit) -> Result<LedgerEntry> {
        let now = self.now();
        self.db.write(|tx| store::append(tx, user_id, habit, now))
    }

    /// Apply a raw point delta. Returns the new total.
    pub fn credit(&self, user_id: &str, delta: i64) -> Result<i64> {
        self.db.write(|tx| points::credit(tx, user_id, delta))
    }

    /// Most recent habit logs first; `None` uses `habits.recent_limit`.
    pub fn list_habits(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        let limit = limit.unwrap_or(self.config.habits.recent_limit);
        self.db.read(|conn| {
            user::require(conn, user_id)?;
            store::list_for_user(conn, user_id, limit)
        })
    }

    pub fn list_habits_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<LedgerEntry>> {
        self.db.read(|conn| {
            user::require(conn, user_id)?;
            store::list_for_user_since(conn, user_id, since)
        })
    }

    pub fn get_habit_stats(&self, user_id: &str) -> Result<HabitStats> {
        self.db.read(|conn| {
            user::require(conn, user_id)?;
            store::stats_for_user(conn, user_id)
        })
    }

    /// Compare the stored total with ledger points plus paid bonuses.
    ///
    /// All three figures come from one snapshot, so a concurrent writer on
    /// another handle cannot produce a false drift report.
    pub fn reconcile_user(&self, user_id: &str) -> Result<PointsAudit> {
        self.db.snapshot(|conn| {
            let user = user::require(conn, user_id)?;
            Ok(PointsAudit {
                user_id: user.id,
                total_points: user.total_points,
                ledger_points: store::total_points(conn, user_id)?,
                bonus_points: tracker::awarded_bonus_total(conn, user_id)?,
            })
        })
    }

    // ── Challenges ───────────────────────────────────────────────────

    pub fn create_challenge(&self, organizer_id: &str, new: NewChallenge) -> Result<Challenge> {
        let now = self.now();
        self.db.write(|tx| tracker::create(tx, organizer_id, new, now))
    }

    pub fn get_challenge(&self, challenge_id: &str) -> Result<Challenge> {
        let now = self.now();
        self.db.read(|conn| tracker::require(conn, challenge_id, now))
    }

    pub fn list_challenges(&self) -> Result<Vec<Challenge>> {
        let now = self.now();
        self.db.read(|conn| tracker::list(conn, now))
    }

    pub fn participants(&self, challenge_id: &str) -> Result<Vec<Participation>> {
        self.db.read(|conn| tracker::participants(conn, challenge_id))
    }

    pub fn get_participation(&self, challenge_id: &str, user_id: &str) -> Result<Option<Participation>> {
        self.db
            .read(|conn| tracker::find_participation(conn, challenge_id, user_id))
    }

    pub fn join_challenge(&self, challenge_id: &str, user_id: &str) -> Result<Participation> {
        let now = self.now();
        self.db.write(|tx| tracker::join(tx, challenge_id, user_id, now))
    }

    pub fn update_challenge_progress(
        &self,
        challenge_id: &str,
        user_id: &str,
        progress: i64,
    ) -> Result<Participation> {
        self.db
            .write(|tx| tracker::update_progress(tx, challenge_id, user_id, progress))
    }

    // ── Leaderboards ─────────────────────────────────────────────────

    fn limit(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.config.leaderboard.default_limit)
    }

    pub fn get_global_leaderboard(&self, limit: Option<usize>) -> Result<Vec<GlobalStanding>> {
        let limit = self.limit(limit);
        self.db.read(|conn| query::global(conn, limit))
    }

    /// Leaderboard over the trailing `leaderboard.window_days` (7 by
    /// default), `[now - window, now)`.
    pub fn get_weekly_leaderboard(&self, limit: Option<usize>) -> Result<Vec<WindowedStanding>> {
        let window = Window::trailing(self.now(), self.config.leaderboard.window_days)?;
        let limit = self.limit(limit);
        self.db.read(|conn| query::windowed(conn, window, limit))
    }

    /// Leaderboard over an arbitrary `[start, end)` window.
    pub fn windowed_leaderboard(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<WindowedStanding>> {
        let window = Window::new(start, end)?;
        let limit = self.limit(limit);
        self.db.read(|conn| query::windowed(conn, window, limit))
    }

    pub fn get_user_rank(&self, user_id: &str) -> Result<UserRank> {
        self.db.read(|conn| query::rank_of(conn, user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::CoreError;
    use crate::ledger::Category;
    use chrono::{Duration, TimeZone};

    fn engine() -> (Engine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        ));
        (Engine::in_memory(clock.clone()).unwrap(), clock)
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }

    #[test]
    fn habit_defaults_to_clock_time() {
        let (engine, clock) = engine();
        let user = engine
            .register_user(NewUser::new("Ada", "ada@example.com"))
            .unwrap();
        let entry = engine
            .log_habit(&user.id, NewHabit::new("Biked", Category::Transport, 15))
            .unwrap();
        assert_eq!(entry.logged_at, clock.now());
    }

    #[test]
    fn stats_for_unknown_user() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.get_habit_stats("ghost"),
            Err(CoreError::UserNotFound { .. })
        ));
    }

    #[test]
    fn weekly_window_slides_with_the_clock() {
        let (engine, clock) = engine();
        let user = engine
            .register_user(NewUser::new("Ada", "ada@example.com"))
            .unwrap();
        engine
            .log_habit(&user.id, NewHabit::new("Biked", Category::Transport, 15))
            .unwrap();

        // Entries logged exactly at `now` fall outside `[now - 7d, now)`.
        assert!(engine.get_weekly_leaderboard(None).unwrap().is_empty());

        clock.advance(Duration::hours(1));
        assert_eq!(engine.get_weekly_leaderboard(None).unwrap()[0].weekly_points, 15);

        clock.advance(Duration::days(7));
        assert!(engine.get_weekly_leaderboard(None).unwrap().is_empty());
        assert_eq!(engine.get_global_leaderboard(None).unwrap()[0].points, 15);
    }

    #[test]
    fn reconcile_reports_consistent_totals() {
        let (engine, _) = engine();
        let user = engine
            .register_user(NewUser::new("Ada", "ada@example.com"))
            .unwrap();
        engine
            .log_habit(&user.id, NewHabit::new("Biked", Category::Transport, 15))
            .unwrap();
        let challenge = engine
            .create_challenge(&user.id, NewChallenge::new("Bike week", "Ride daily", "transport", 50, 7))
            .unwrap();
        engine.join_challenge(&challenge.id, &user.id).unwrap();
        engine
            .update_challenge_progress(&challenge.id, &user.id, 100)
            .unwrap();

        let audit = engine.reconcile_user(&user.id).unwrap();
        assert_eq!(audit.ledger_points, 15);
        assert_eq!(audit.bonus_points, 50);
        assert!(audit.is_consistent());

        // A raw credit has no ledger counterpart and shows up as drift.
        engine.credit(&user.id, 5).unwrap();
        assert!(!engine.reconcile_user(&user.id).unwrap().is_consistent());
    }

    #[test]
    fn oversized_weekly_window_is_an_error() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        ));
        let mut config = Config::default();
        config.leaderboard.window_days = 100_000_000;
        let engine = Engine::new(Database::open_memory().unwrap(), clock, config);
        assert!(matches!(
            engine.get_weekly_leaderboard(None),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn far_future_challenge_does_not_break_listing() {
        let (engine, _) = engine();
        let user = engine
            .register_user(NewUser::new("Ada", "ada@example.com"))
            .unwrap();
        assert!(matches!(
            engine.create_challenge(
                &user.id,
                NewChallenge::new("Forever", "Never ends", "waste", 10, 3_000_000)
            ),
            Err(CoreError::Validation(_))
        ));
        assert!(engine.list_challenges().unwrap().is_empty());
    }

    #[test]
    fn windowed_leaderboard_rejects_inverted_range() {
        let (engine, clock) = engine();
        let now = clock.now();
        assert!(matches!(
            engine.windowed_leaderboard(now, now - Duration::days(1), None),
            Err(CoreError::Validation(_))
        ));
    }
}
