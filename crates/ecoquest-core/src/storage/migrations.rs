//! Database schema migrations for ecoquest.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: users, habit ledger, challenges and participations.
///
/// Participations live in their own table keyed by (challenge_id, user_id)
/// so that joins are unique and the award latch can be flipped with a
/// single conditional update.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id           TEXT PRIMARY KEY,
            name         TEXT NOT NULL,
            email        TEXT NOT NULL UNIQUE,
            avatar       TEXT NOT NULL DEFAULT '',
            total_points INTEGER NOT NULL DEFAULT 0 CHECK (total_points >= 0),
            level        INTEGER NOT NULL DEFAULT 1 CHECK (level >= 1),
            streak       INTEGER NOT NULL DEFAULT 0 CHECK (streak >= 0),
            badges       TEXT NOT NULL DEFAULT '[]',
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS habits (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            action      TEXT NOT NULL,
            category    TEXT NOT NULL,
            points      INTEGER NOT NULL CHECK (points >= 0),
            co2_saved   REAL NOT NULL DEFAULT 0,
            water_saved REAL NOT NULL DEFAULT 0,
            notes       TEXT NOT NULL DEFAULT '',
            logged_at   TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS challenges (
            id            TEXT PRIMARY KEY,
            title         TEXT NOT NULL,
            description   TEXT NOT NULL,
            category      TEXT NOT NULL,
            difficulty    TEXT NOT NULL DEFAULT 'Medium',
            points_reward INTEGER NOT NULL CHECK (points_reward > 0),
            duration_days INTEGER NOT NULL CHECK (duration_days > 0),
            start_date    TEXT NOT NULL,
            end_date      TEXT NOT NULL,
            created_by    TEXT NOT NULL REFERENCES users(id),
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS participations (
            challenge_id TEXT NOT NULL REFERENCES challenges(id) ON DELETE CASCADE,
            user_id      TEXT NOT NULL REFERENCES users(id),
            joined_at    TEXT NOT NULL,
            progress     INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
            completed    INTEGER NOT NULL DEFAULT 0,
            awarded      INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (challenge_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_users_points ON users(total_points DESC, created_at);
        CREATE INDEX IF NOT EXISTS idx_habits_user_logged_at ON habits(user_id, logged_at);
        CREATE INDEX IF NOT EXISTS idx_habits_logged_at ON habits(logged_at);
        CREATE INDEX IF NOT EXISTS idx_participations_user ON participations(user_id);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: caller-supplied idempotency keys on habit logs.
///
/// A retried log with the same (user_id, idempotency_key) must resolve to
/// the original row instead of inserting a second one.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE habits ADD COLUMN idempotency_key TEXT;
         CREATE UNIQUE INDEX IF NOT EXISTS idx_habits_idempotency
             ON habits(user_id, idempotency_key)
             WHERE idempotency_key IS NOT NULL;",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}
