//! Time-boxed group challenges and per-user participation.
//!
//! ## Participation states
//!
//! ```text
//! Joined (0) -> InProgress (1..=99) -> Completed (100)
//! ```
//!
//! The state is derived from `progress`. Reaching `Completed` pays the
//! challenge's `points_reward` once per participation; the `awarded` latch
//! keeps later updates to 100 from paying again.

pub(crate) mod tracker;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::storage::check_storable;

/// Highest accepted progress value.
pub const MAX_PROGRESS: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ValidationError::invalid(
                "difficulty",
                format!("expected Easy, Medium or Hard, got '{s}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Upcoming,
    Active,
    Completed,
}

impl ChallengeStatus {
    /// Status of a challenge running over `[start, end)` as seen at `now`.
    pub fn at(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            ChallengeStatus::Upcoming
        } else if now < end {
            ChallengeStatus::Active
        } else {
            ChallengeStatus::Completed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub points_reward: i64,
    pub duration_days: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// Derived from the clock when the challenge was read.
    pub status: ChallengeStatus,
    pub participant_count: u64,
}

/// A challenge creation request.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub points_reward: i64,
    pub duration_days: i64,
    /// Defaults to the engine clock's now.
    pub start_date: Option<DateTime<Utc>>,
}

impl NewChallenge {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        points_reward: i64,
        duration_days: i64,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: category.into(),
            difficulty: Difficulty::default(),
            points_reward,
            duration_days,
            start_date: None,
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("category", &self.category),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field.into()));
            }
        }
        if self.points_reward <= 0 {
            return Err(ValidationError::invalid(
                "points_reward",
                format!("must be greater than 0, got {}", self.points_reward),
            ));
        }
        if self.duration_days <= 0 {
            return Err(ValidationError::invalid(
                "duration_days",
                format!("must be greater than 0, got {}", self.duration_days),
            ));
        }
        match self.start_date {
            Some(start) => self.end_date(start).map(|_| ()),
            None => Ok(()),
        }
    }

    /// End of a challenge starting at `start`, checked to be storable.
    pub fn end_date(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
        check_storable("start_date", start)?;
        let end = Duration::try_days(self.duration_days)
            .and_then(|d| start.checked_add_signed(d))
            .ok_or_else(|| {
                ValidationError::invalid(
                    "duration_days",
                    format!("{} days is out of range", self.duration_days),
                )
            })?;
        check_storable("duration_days", end)?;
        Ok(end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    Joined,
    InProgress,
    Completed,
}

impl ProgressState {
    pub fn from_progress(progress: u8) -> Self {
        match progress {
            0 => ProgressState::Joined,
            p if i64::from(p) >= MAX_PROGRESS => ProgressState::Completed,
            _ => ProgressState::InProgress,
        }
    }
}

/// One user's standing in one challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub challenge_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub progress: u8,
    pub completed: bool,
    /// Set once the completion bonus has been paid.
    pub awarded: bool,
}

impl Participation {
    pub fn state(&self) -> ProgressState {
        ProgressState::from_progress(self.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn status_follows_the_clock() {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let end = start + Duration::days(7);
        assert_eq!(
            ChallengeStatus::at(start, end, start - Duration::seconds(1)),
            ChallengeStatus::Upcoming
        );
        assert_eq!(ChallengeStatus::at(start, end, start), ChallengeStatus::Active);
        assert_eq!(
            ChallengeStatus::at(start, end, end - Duration::seconds(1)),
            ChallengeStatus::Active
        );
        assert_eq!(ChallengeStatus::at(start, end, end), ChallengeStatus::Completed);
    }

    #[test]
    fn progress_states() {
        assert_eq!(ProgressState::from_progress(0), ProgressState::Joined);
        assert_eq!(ProgressState::from_progress(1), ProgressState::InProgress);
        assert_eq!(ProgressState::from_progress(99), ProgressState::InProgress);
        assert_eq!(ProgressState::from_progress(100), ProgressState::Completed);
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!("Easy".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert!("extreme".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::default(), Difficulty::Medium);
    }

    #[test]
    fn new_challenge_validation() {
        let ok = NewChallenge::new("Plastic-free week", "No single-use plastic", "waste", 50, 7);
        assert!(ok.validate().is_ok());

        let mut bad = ok.clone();
        bad.points_reward = 0;
        assert!(bad.validate().is_err());

        let mut bad = ok.clone();
        bad.duration_days = -1;
        assert!(bad.validate().is_err());

        let mut bad = ok;
        bad.title = " ".into();
        assert_eq!(bad.validate(), Err(ValidationError::MissingField("title".into())));
    }

    #[test]
    fn end_date_must_stay_within_storable_years() {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let forever = NewChallenge::new("Forever", "Never ends", "waste", 10, 3_000_000);
        assert!(matches!(
            forever.end_date(start),
            Err(ValidationError::InvalidValue { field, .. }) if field == "duration_days"
        ));
        assert!(forever.clone().starting_at(start).validate().is_err());

        let decade = NewChallenge::new("Decade", "Ten years", "waste", 10, 3650);
        assert_eq!(decade.end_date(start).unwrap(), start + Duration::days(3650));

        let late = Utc.with_ymd_and_hms(9999, 12, 30, 0, 0, 0).unwrap();
        assert!(decade.clone().starting_at(late).validate().is_err());
    }
}
