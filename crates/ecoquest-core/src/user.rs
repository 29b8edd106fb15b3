//! User accounts as seen by the ledger.
//!
//! Accounts belong to the account subsystem. The core reads them for
//! leaderboards and only ever changes `total_points`, through
//! [`crate::points::credit`]. Registration lives here so the CLI and tests
//! can create users.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{is_unique_violation, CoreError, Result, ValidationError};
use crate::storage::{format_ts, parse_ts};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub name: String,
    pub icon: String,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub total_points: i64,
    pub level: i64,
    pub streak: i64,
    pub badges: Vec<Badge>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            avatar: None,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

pub(crate) const USER_COLUMNS: &str =
    "id, name, email, avatar, total_points, level, streak, badges, created_at";

/// Decode a badge list stored as JSON text.
pub(crate) fn parse_badges(index: usize, raw: &str) -> Result<Vec<Badge>, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_user(row: &Row) -> Result<User, rusqlite::Error> {
    let badges: String = row.get(7)?;
    let created_at: String = row.get(8)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        avatar: row.get(3)?,
        total_points: row.get(4)?,
        level: row.get(5)?,
        streak: row.get(6)?,
        badges: parse_badges(7, &badges)?,
        created_at: parse_ts(8, &created_at)?,
    })
}

pub(crate) fn insert(conn: &Connection, new: NewUser, now: DateTime<Utc>) -> Result<User> {
    let name = new.name.trim().to_string();
    if name.is_empty() {
        return Err(ValidationError::MissingField("name".into()).into());
    }
    let email = new.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::MissingField("email".into()).into());
    }
    if !email.contains('@') {
        return Err(ValidationError::invalid("email", "must contain '@'").into());
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name,
        email,
        avatar: new.avatar.unwrap_or_default(),
        total_points: 0,
        level: 1,
        streak: 0,
        badges: Vec::new(),
        created_at: now,
    };

    let inserted = conn.execute(
        "INSERT INTO users (id, name, email, avatar, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.id, user.name, user.email, user.avatar, format_ts(now)],
    );
    match inserted {
        Ok(_) => Ok(user),
        Err(e) if is_unique_violation(&e) => Err(CoreError::DuplicateEmail { email: user.email }),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn find(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub(crate) fn require(conn: &Connection, user_id: &str) -> Result<User> {
    find(conn, user_id)?.ok_or_else(|| CoreError::user_not_found(user_id))
}

pub(crate) fn exists(conn: &Connection, user_id: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", params![user_id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}
