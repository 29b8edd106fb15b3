//! Leaderboards and rank lookup.
//!
//! Two conventions coexist and callers can observe both at a tie:
//!
//! - listings ([`GlobalStanding`], [`WindowedStanding`]) use **ordinal**
//!   ranks: position in the list, 1-based, ties broken by earliest account
//!   creation and then insertion order, so tied users get consecutive
//!   numbers;
//! - [`UserRank`] uses **competition** ranking: 1 + the number of users with
//!   strictly more points, so everyone tied at the top is rank 1.
//!
//! Nothing here writes.

pub(crate) mod query;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::user::Badge;

/// Row of the all-time leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStanding {
    pub rank: u64,
    pub user_id: String,
    pub name: String,
    pub points: i64,
    pub level: i64,
    pub streak: i64,
    pub badges: Vec<Badge>,
    pub avatar: String,
}

/// Row of a windowed leaderboard.
///
/// Profile fields are joined live at query time, so a user's level can
/// differ between two queries over the same historical window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedStanding {
    pub rank: u64,
    pub user_id: String,
    pub name: String,
    pub avatar: String,
    pub level: i64,
    /// Points logged inside the window.
    pub weekly_points: i64,
    /// Ledger entries logged inside the window.
    pub habit_count: u64,
}

/// Competition-style rank of a single user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRank {
    pub rank: u64,
    pub points: i64,
    pub level: i64,
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The `days` days leading up to (and excluding) `now`.
    pub fn trailing(now: DateTime<Utc>, days: i64) -> Result<Self, ValidationError> {
        let span = Duration::try_days(days)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| ValidationError::invalid("window_days", "must be a positive day count"))?;
        let start = now.checked_sub_signed(span).ok_or_else(|| {
            ValidationError::invalid("window_days", format!("{days} days reaches before the calendar"))
        })?;
        Self::new(start, now)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}
