//! Challenge catalogue and participation progress, backed by SQLite.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{Challenge, ChallengeStatus, Difficulty, NewChallenge, Participation, MAX_PROGRESS};
use crate::error::{is_unique_violation, CoreError, Result, ValidationError};
use crate::storage::{format_ts, parse_ts};
use crate::{points, user};

const CHALLENGE_SELECT: &str = "SELECT c.id, c.title, c.description, c.category, c.difficulty,
            c.points_reward, c.duration_days, c.start_date, c.end_date, c.created_by,
            c.created_at,
            (SELECT COUNT(*) FROM participations p WHERE p.challenge_id = c.id)
     FROM challenges c";

const PARTICIPATION_COLUMNS: &str =
    "challenge_id, user_id, joined_at, progress, completed, awarded";

fn conversion_error(
    index: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

fn row_to_challenge(row: &Row, now: DateTime<Utc>) -> Result<Challenge, rusqlite::Error> {
    let difficulty: String = row.get(4)?;
    let start_date = parse_ts(7, &row.get::<_, String>(7)?)?;
    let end_date = parse_ts(8, &row.get::<_, String>(8)?)?;
    Ok(Challenge {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        difficulty: difficulty
            .parse::<Difficulty>()
            .map_err(|e| conversion_error(4, e))?,
        points_reward: row.get(5)?,
        duration_days: row.get(6)?,
        start_date,
        end_date,
        created_by: row.get(9)?,
        created_at: parse_ts(10, &row.get::<_, String>(10)?)?,
        status: ChallengeStatus::at(start_date, end_date, now),
        participant_count: row.get(11)?,
    })
}

fn row_to_participation(row: &Row) -> Result<Participation, rusqlite::Error> {
    Ok(Participation {
        challenge_id: row.get(0)?,
        user_id: row.get(1)?,
        joined_at: parse_ts(2, &row.get::<_, String>(2)?)?,
        progress: row.get(3)?,
        completed: row.get(4)?,
        awarded: row.get(5)?,
    })
}

pub(crate) fn create(
    conn: &Connection,
    organizer_id: &str,
    new: NewChallenge,
    now: DateTime<Utc>,
) -> Result<Challenge> {
    new.validate()?;
    if !user::exists(conn, organizer_id)? {
        return Err(CoreError::user_not_found(organizer_id));
    }

    let start_date = new.start_date.unwrap_or(now).trunc_subsecs(6);
    let end_date = new.end_date(start_date)?;

    let challenge = Challenge {
        id: Uuid::new_v4().to_string(),
        title: new.title.trim().to_string(),
        description: new.description.trim().to_string(),
        category: new.category.trim().to_string(),
        difficulty: new.difficulty,
        points_reward: new.points_reward,
        duration_days: new.duration_days,
        start_date,
        end_date,
        created_by: organizer_id.to_string(),
        created_at: now,
        status: ChallengeStatus::at(start_date, end_date, now),
        participant_count: 0,
    };

    conn.execute(
        "INSERT INTO challenges (id, title, description, category, difficulty, points_reward,
                                 duration_days, start_date, end_date, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            challenge.id,
            challenge.title,
            challenge.description,
            challenge.category,
            challenge.difficulty.as_str(),
            challenge.points_reward,
            challenge.duration_days,
            format_ts(challenge.start_date),
            format_ts(challenge.end_date),
            challenge.created_by,
            format_ts(challenge.created_at),
        ],
    )?;

    tracing::info!(
        challenge_id = %challenge.id,
        organizer_id,
        points_reward = challenge.points_reward,
        "created challenge"
    );
    Ok(challenge)
}

pub(crate) fn find(conn: &Connection, challenge_id: &str, now: DateTime<Utc>) -> Result<Option<Challenge>> {
    let challenge = conn
        .query_row(
            &format!("{CHALLENGE_SELECT} WHERE c.id = ?1"),
            params![challenge_id],
            |row| row_to_challenge(row, now),
        )
        .optional()?;
    Ok(challenge)
}

pub(crate) fn require(conn: &Connection, challenge_id: &str, now: DateTime<Utc>) -> Result<Challenge> {
    find(conn, challenge_id, now)?.ok_or_else(|| CoreError::challenge_not_found(challenge_id))
}

fn challenge_exists(conn: &Connection, challenge_id: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM challenges WHERE id = ?1",
            params![challenge_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Newest first.
pub(crate) fn list(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Challenge>> {
    let mut stmt = conn.prepare(&format!(
        "{CHALLENGE_SELECT} ORDER BY c.created_at DESC, c.rowid DESC"
    ))?;
    let challenges = stmt
        .query_map([], |row| row_to_challenge(row, now))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(challenges)
}

pub(crate) fn find_participation(
    conn: &Connection,
    challenge_id: &str,
    user_id: &str,
) -> Result<Option<Participation>> {
    let participation = conn
        .query_row(
            &format!(
                "SELECT {PARTICIPATION_COLUMNS} FROM participations
                 WHERE challenge_id = ?1 AND user_id = ?2"
            ),
            params![challenge_id, user_id],
            row_to_participation,
        )
        .optional()?;
    Ok(participation)
}

/// Participations of a challenge in join order.
pub(crate) fn participants(conn: &Connection, challenge_id: &str) -> Result<Vec<Participation>> {
    if !challenge_exists(conn, challenge_id)? {
        return Err(CoreError::challenge_not_found(challenge_id));
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT {PARTICIPATION_COLUMNS} FROM participations
         WHERE challenge_id = ?1
         ORDER BY joined_at ASC, rowid ASC"
    ))?;
    let rows = stmt
        .query_map(params![challenge_id], row_to_participation)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Create a participation with progress 0.
///
/// Uniqueness comes from the (challenge_id, user_id) primary key, so two
/// racing joins still leave exactly one row.
pub(crate) fn join(
    conn: &Connection,
    challenge_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Participation> {
    if !challenge_exists(conn, challenge_id)? {
        return Err(CoreError::challenge_not_found(challenge_id));
    }
    if !user::exists(conn, user_id)? {
        return Err(CoreError::user_not_found(user_id));
    }

    let participation = Participation {
        challenge_id: challenge_id.to_string(),
        user_id: user_id.to_string(),
        joined_at: now,
        progress: 0,
        completed: false,
        awarded: false,
    };

    let inserted = conn.execute(
        "INSERT INTO participations (challenge_id, user_id, joined_at, progress, completed, awarded)
         VALUES (?1, ?2, ?3, 0, 0, 0)",
        params![challenge_id, user_id, format_ts(now)],
    );
    match inserted {
        Ok(_) => {
            tracing::info!(challenge_id, user_id, "joined challenge");
            Ok(participation)
        }
        Err(e) if is_unique_violation(&e) => {
            tracing::warn!(challenge_id, user_id, "rejected duplicate join");
            Err(CoreError::AlreadyJoined {
                challenge_id: challenge_id.to_string(),
                user_id: user_id.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Record new progress and pay the completion bonus at most once.
///
/// Must run inside a write transaction. The bonus is paid only when the
/// conditional `awarded = 0 -> 1` update actually changes the row, so
/// repeated or racing updates to 100 credit exactly once.
pub(crate) fn update_progress(
    conn: &Connection,
    challenge_id: &str,
    user_id: &str,
    progress: i64,
) -> Result<Participation> {
    if !(0..=MAX_PROGRESS).contains(&progress) {
        return Err(ValidationError::OutOfRange {
            field: "progress".into(),
            value: progress,
            min: 0,
            max: MAX_PROGRESS,
        }
        .into());
    }

    let current = find_participation(conn, challenge_id, user_id)?.ok_or_else(|| {
        CoreError::NotParticipant {
            challenge_id: challenge_id.to_string(),
            user_id: user_id.to_string(),
        }
    })?;

    let completed = progress == MAX_PROGRESS;
    conn.execute(
        "UPDATE participations SET progress = ?1, completed = ?2
         WHERE challenge_id = ?3 AND user_id = ?4",
        params![progress, completed, challenge_id, user_id],
    )?;

    let mut awarded = current.awarded;
    if completed {
        let latched = conn.execute(
            "UPDATE participations SET awarded = 1
             WHERE challenge_id = ?1 AND user_id = ?2 AND awarded = 0",
            params![challenge_id, user_id],
        )?;
        if latched == 1 {
            let reward: i64 = conn.query_row(
                "SELECT points_reward FROM challenges WHERE id = ?1",
                params![challenge_id],
                |row| row.get(0),
            )?;
            let total = points::credit(conn, user_id, reward)?;
            tracing::info!(challenge_id, user_id, reward, total, "awarded completion bonus");
            awarded = true;
        }
    }

    Ok(Participation {
        progress: progress as u8,
        completed,
        awarded,
        ..current
    })
}

/// Sum of completion bonuses paid to a user.
pub(crate) fn awarded_bonus_total(conn: &Connection, user_id: &str) -> Result<i64> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(c.points_reward), 0)
         FROM participations p JOIN challenges c ON c.id = p.challenge_id
         WHERE p.user_id = ?1 AND p.awarded = 1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(total)
}
