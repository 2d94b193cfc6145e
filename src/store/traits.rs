//! `StudentStore` trait — single async interface for all persistence.
//!
//! Typed records are constructed here, at the storage boundary; nothing
//! above this layer ever sees a raw row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// A student roster record.
///
/// The matricule is the durable key; a student without one cannot own a
/// destination record. Immutable once loaded within a conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub family_name: String,
    pub given_name: String,
    pub region: Option<String>,
    pub group_tag: Option<String>,
    pub matricule: Option<i64>,
}

impl Student {
    /// "Family Given" form used in replies to the user.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.family_name, self.given_name)
    }
}

/// A weekly destination record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRecord {
    pub matricule: i64,
    pub destination: String,
    pub created_at: DateTime<Utc>,
}

/// One row of the weekly export (student joined to their destination).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub family_name: String,
    pub given_name: String,
    pub destination: String,
}

/// Backend-agnostic storage trait covering students and destinations.
#[async_trait]
pub trait StudentStore: Send + Sync {
    // ── Students ────────────────────────────────────────────────────

    /// Exact, case-sensitive lookup on family name.
    async fn find_student_by_family_name(
        &self,
        family_name: &str,
    ) -> Result<Option<Student>, DatabaseError>;

    /// All students in storage iteration order (insertion order).
    /// Used for local edit-distance ranking.
    async fn list_students(&self) -> Result<Vec<Student>, DatabaseError>;

    /// Insert a student row.
    async fn insert_student(&self, student: &Student) -> Result<(), DatabaseError>;

    /// Number of student rows.
    async fn count_students(&self) -> Result<u64, DatabaseError>;

    // ── Destinations ────────────────────────────────────────────────

    /// Destination records for a student with `created_at` in
    /// `[start, end)`, most recent first.
    async fn destinations_in_range(
        &self,
        matricule: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DestinationRecord>, DatabaseError>;

    /// Insert a destination record. Insert-only: never checks for an
    /// existing row (the engine owns the delete-before-set ordering).
    async fn insert_destination(&self, record: &DestinationRecord) -> Result<(), DatabaseError>;

    /// Delete a student's destination records with `created_at` in
    /// `[start, end)`. Returns the number of rows deleted.
    async fn delete_destinations_in_range(
        &self,
        matricule: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;

    /// Update the denormalized `current_destination` column on the
    /// student row.
    async fn set_current_destination(
        &self,
        matricule: i64,
        destination: Option<&str>,
    ) -> Result<(), DatabaseError>;

    /// Students joined to their destination records with `created_at`
    /// in `[start, end)`, ordered by family name.
    async fn weekly_roster(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RosterEntry>, DatabaseError>;
}
