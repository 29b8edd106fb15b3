//! Points accumulator.
//!
//! `total_points` is the most contended value in the system. It is only ever
//! changed by the single `UPDATE ... SET total_points = total_points + ?`
//! below, so concurrent credits add up regardless of interleaving.

use rusqlite::{params, Connection};

use crate::error::{CoreError, Result, ValidationError};
use crate::user;

/// Add `delta` to a user's total and return the new total.
///
/// `delta` may be negative. A credit that would take the total below zero
/// is rejected and leaves the total untouched.
///
/// # Errors
/// `UserNotFound` if the user does not exist, `Validation` for an
/// underflowing debit.
pub(crate) fn credit(conn: &Connection, user_id: &str, delta: i64) -> Result<i64> {
    let mut stmt = conn.prepare_cached(
        "UPDATE users
         SET total_points = total_points + ?1
         WHERE id = ?2 AND total_points + ?1 >= 0
         RETURNING total_points",
    )?;
    let mut rows = stmt.query(params![delta, user_id])?;
    if let Some(row) = rows.next()? {
        let total: i64 = row.get(0)?;
        tracing::debug!(user_id, delta, total, "credited points");
        return Ok(total);
    }

    if user::exists(conn, user_id)? {
        Err(ValidationError::invalid(
            "delta",
            format!("debit of {} would make the total negative", delta.unsigned_abs()),
        )
        .into())
    } else {
        Err(CoreError::user_not_found(user_id))
    }
}
