//! Ranking queries over the users table and the habit ledger.

use rusqlite::{params, Connection, OptionalExtension};

use super::{GlobalStanding, UserRank, Window, WindowedStanding};
use crate::error::{CoreError, Result};
use crate::storage::format_ts;
use crate::user::parse_badges;

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Top `limit` users by all-time points, ordinal ranks.
pub(crate) fn global(conn: &Connection, limit: usize) -> Result<Vec<GlobalStanding>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, name, total_points, level, streak, badges, avatar
         FROM users
         ORDER BY total_points DESC, created_at ASC, rowid ASC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![sql_limit(limit)], |row| {
        let badges: String = row.get(5)?;
        Ok(GlobalStanding {
            rank: 0,
            user_id: row.get(0)?,
            name: row.get(1)?,
            points: row.get(2)?,
            level: row.get(3)?,
            streak: row.get(4)?,
            badges: parse_badges(5, &badges)?,
            avatar: row.get(6)?,
        })
    })?;

    let mut standings = Vec::new();
    for (index, row) in rows.enumerate() {
        let mut standing = row?;
        standing.rank = index as u64 + 1;
        standings.push(standing);
    }
    tracing::debug!(limit, rows = standings.len(), "global ranking");
    Ok(standings)
}

/// Top `limit` users by points logged inside `window`, ordinal ranks.
///
/// Users without entries in the window are absent.
pub(crate) fn windowed(conn: &Connection, window: Window, limit: usize) -> Result<Vec<WindowedStanding>> {
    let mut stmt = conn.prepare_cached(
        "SELECT u.id, u.name, u.avatar, u.level, w.sum_points, w.entry_count
         FROM (
             SELECT user_id, SUM(points) AS sum_points, COUNT(*) AS entry_count
             FROM habits
             WHERE logged_at >= ?1 AND logged_at < ?2
             GROUP BY user_id
         ) w
         JOIN users u ON u.id = w.user_id
         ORDER BY w.sum_points DESC, u.created_at ASC, u.rowid ASC
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(
        params![format_ts(window.start), format_ts(window.end), sql_limit(limit)],
        |row| {
            Ok(WindowedStanding {
                rank: 0,
                user_id: row.get(0)?,
                name: row.get(1)?,
                avatar: row.get(2)?,
                level: row.get(3)?,
                weekly_points: row.get(4)?,
                habit_count: row.get(5)?,
            })
        },
    )?;

    let mut standings = Vec::new();
    for (index, row) in rows.enumerate() {
        let mut standing = row?;
        standing.rank = index as u64 + 1;
        standings.push(standing);
    }
    tracing::debug!(
        start = %window.start,
        end = %window.end,
        limit,
        rows = standings.len(),
        "windowed ranking"
    );
    Ok(standings)
}

/// Competition rank: 1 + number of users with strictly more points.
pub(crate) fn rank_of(conn: &Connection, user_id: &str) -> Result<UserRank> {
    let (points, level): (i64, i64) = conn
        .query_row(
            "SELECT total_points, level FROM users WHERE id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| CoreError::user_not_found(user_id))?;

    let ahead: u64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE total_points > ?1",
        params![points],
        |row| row.get(0),
    )?;
    Ok(UserRank {
        rank: ahead + 1,
        points,
        level,
    })
}
