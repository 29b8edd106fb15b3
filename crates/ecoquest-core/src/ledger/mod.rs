//! Habit ledger.
//!
//! Every habit log is an immutable [`LedgerEntry`]: "user U earned P points
//! for action A in category C at time T". Entries are appended, never
//! updated or removed, and each append credits the user's total in the same
//! transaction.

pub(crate) mod store;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::storage::check_storable;

/// Recognized habit categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Transport,
    Energy,
    Waste,
    Water,
    Food,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Transport,
        Category::Energy,
        Category::Waste,
        Category::Water,
        Category::Food,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Transport => "transport",
            Category::Energy => "energy",
            Category::Waste => "waste",
            Category::Water => "water",
            Category::Food => "food",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// Environmental impact attached to a habit log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Impact {
    #[serde(default)]
    pub co2_saved: f64,
    #[serde(default)]
    pub water_saved: f64,
}

impl Impact {
    pub fn new(co2_saved: f64, water_saved: f64) -> Self {
        Self {
            co2_saved,
            water_saved,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [("co2_saved", self.co2_saved), ("water_saved", self.water_saved)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::invalid(
                    field,
                    format!("must be a non-negative number, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

/// A habit log request.
#[derive(Debug, Clone)]
pub struct NewHabit {
    pub action: String,
    pub category: Category,
    pub points: i64,
    pub impact: Impact,
    pub notes: Option<String>,
    /// Defaults to the engine clock's now.
    pub logged_at: Option<DateTime<Utc>>,
    /// Makes the log safe to retry: a repeat with the same key returns the
    /// original entry and credits nothing.
    pub idempotency_key: Option<String>,
}

impl NewHabit {
    pub fn new(action: impl Into<String>, category: Category, points: i64) -> Self {
        Self {
            action: action.into(),
            category,
            points,
            impact: Impact::default(),
            notes: None,
            logged_at: None,
            idempotency_key: None,
        }
    }

    pub fn with_impact(mut self, impact: Impact) -> Self {
        self.impact = impact;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn at(mut self, logged_at: DateTime<Utc>) -> Self {
        self.logged_at = Some(logged_at);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.action.trim().is_empty() {
            return Err(ValidationError::MissingField("action".into()));
        }
        if self.points < 0 {
            return Err(ValidationError::OutOfRange {
                field: "points".into(),
                value: self.points,
                min: 0,
                max: i64::MAX,
            });
        }
        if matches!(&self.idempotency_key, Some(key) if key.trim().is_empty()) {
            return Err(ValidationError::invalid("idempotency_key", "must not be blank"));
        }
        if let Some(at) = self.logged_at {
            check_storable("logged_at", at)?;
        }
        self.impact.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub action: String,
    pub category: Category,
    pub points: i64,
    pub impact: Impact,
    pub notes: String,
    pub logged_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Per-user totals over the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HabitStats {
    pub total_habits: u64,
    pub total_points: i64,
    pub total_co2_saved: f64,
    pub total_water_saved: f64,
    pub category_breakdown: BTreeMap<Category, u64>,
}
