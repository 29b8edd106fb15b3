//! SQLite-backed ledger entry store.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{Category, HabitStats, Impact, LedgerEntry, NewHabit};
use crate::error::{CoreError, Result};
use crate::storage::{format_ts, parse_ts};
use crate::{points, user};

const ENTRY_COLUMNS: &str = "id, user_id, action, category, points, co2_saved, water_saved, \
                             notes, logged_at, created_at, idempotency_key";

fn row_to_entry(row: &Row) -> Result<LedgerEntry, rusqlite::Error> {
    let category: String = row.get(3)?;
    let logged_at: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    Ok(LedgerEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action: row.get(2)?,
        category: category.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        points: row.get(4)?,
        impact: Impact::new(row.get(5)?, row.get(6)?),
        notes: row.get(7)?,
        logged_at: parse_ts(8, &logged_at)?,
        created_at: parse_ts(9, &created_at)?,
        idempotency_key: row.get(10)?,
    })
}

fn find_by_key(conn: &Connection, user_id: &str, key: &str) -> Result<Option<LedgerEntry>> {
    let entry = conn
        .query_row(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM habits WHERE user_id = ?1 AND idempotency_key = ?2"
            ),
            params![user_id, key],
            row_to_entry,
        )
        .optional()?;
    Ok(entry)
}

/// Append a habit log and credit its points.
///
/// Must run inside a write transaction: the insert and the credit either
/// both land or neither does.
pub(crate) fn append(
    conn: &Connection,
    user_id: &str,
    new: NewHabit,
    now: DateTime<Utc>,
) -> Result<LedgerEntry> {
    new.validate()?;
    if !user::exists(conn, user_id)? {
        return Err(CoreError::user_not_found(user_id));
    }

    if let Some(key) = new.idempotency_key.as_deref() {
        if let Some(existing) = find_by_key(conn, user_id, key)? {
            tracing::info!(user_id, key, entry_id = %existing.id, "replayed habit log");
            return Ok(existing);
        }
    }

    let entry = LedgerEntry {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        action: new.action.trim().to_string(),
        category: new.category,
        points: new.points,
        impact: new.impact,
        notes: new.notes.unwrap_or_default(),
        logged_at: new.logged_at.unwrap_or(now).trunc_subsecs(6),
        created_at: now,
        idempotency_key: new.idempotency_key,
    };

    conn.execute(
        "INSERT INTO habits (id, user_id, action, category, points, co2_saved, water_saved,
                             notes, logged_at, created_at, idempotency_key)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            entry.id,
            entry.user_id,
            entry.action,
            entry.category.as_str(),
            entry.points,
            entry.impact.co2_saved,
            entry.impact.water_saved,
            entry.notes,
            format_ts(entry.logged_at),
            format_ts(entry.created_at),
            entry.idempotency_key,
        ],
    )?;
    let total = points::credit(conn, user_id, entry.points)?;

    tracing::info!(
        user_id,
        entry_id = %entry.id,
        category = %entry.category,
        points = entry.points,
        total,
        "logged habit"
    );
    Ok(entry)
}

/// Most recent entries first.
pub(crate) fn list_for_user(conn: &Connection, user_id: &str, limit: usize) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM habits
         WHERE user_id = ?1
         ORDER BY logged_at DESC, rowid DESC
         LIMIT ?2"
    ))?;
    let entries = stmt
        .query_map(params![user_id, limit as i64], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Entries with `logged_at >= since`, most recent first.
pub(crate) fn list_for_user_since(
    conn: &Connection,
    user_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM habits
         WHERE user_id = ?1 AND logged_at >= ?2
         ORDER BY logged_at DESC, rowid DESC"
    ))?;
    let entries = stmt
        .query_map(params![user_id, format_ts(since)], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub(crate) fn stats_for_user(conn: &Connection, user_id: &str) -> Result<HabitStats> {
    let mut stmt = conn.prepare(
        "SELECT category, COUNT(*), COALESCE(SUM(points), 0),
                COALESCE(SUM(co2_saved), 0.0), COALESCE(SUM(water_saved), 0.0)
         FROM habits
         WHERE user_id = ?1
         GROUP BY category",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, u64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, f64>(4)?,
        ))
    })?;

    let mut stats = HabitStats::default();
    for row in rows {
        let (category, count, points, co2, water) = row?;
        stats.total_habits += count;
        stats.total_points += points;
        stats.total_co2_saved += co2;
        stats.total_water_saved += water;
        match category.parse::<Category>() {
            Ok(category) => {
                *stats.category_breakdown.entry(category).or_insert(0) += count;
            }
            Err(_) => tracing::warn!(user_id, %category, "unrecognized category in ledger"),
        }
    }
    Ok(stats)
}

/// Sum of all ledger points for a user.
pub(crate) fn total_points(conn: &Connection, user_id: &str) -> Result<i64> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(points), 0) FROM habits WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(total)
}
