//! Destination store — the weekly-scoped destination record per student.
//!
//! "Current" always means the ISO week (Monday-start) containing now.
//! The store itself is insert-only: it never checks for an existing record.
//! The engine owns the delete-before-set ordering that keeps the
//! one-record-per-student-per-week invariant.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::error::{DatabaseError, StoreError};
use crate::store::{DestinationRecord, Student, StudentStore};

/// Maximum destination length, in characters.
pub const MAX_DESTINATION_CHARS: usize = 20;

/// `[start, end)` of the ISO week containing `now` (Monday 00:00 UTC).
pub fn week_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let date = now.date_naive();
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    let start = monday
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc();
    (start, start + Duration::days(7))
}

/// Manages the weekly destination record lifecycle.
pub struct DestinationStore {
    store: Arc<dyn StudentStore>,
}

impl DestinationStore {
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self { store }
    }

    /// Reject destinations longer than [`MAX_DESTINATION_CHARS`].
    pub fn validate(destination: &str) -> Result<(), StoreError> {
        let length = destination.chars().count();
        if length > MAX_DESTINATION_CHARS {
            return Err(StoreError::DestinationTooLong {
                length,
                max: MAX_DESTINATION_CHARS,
            });
        }
        Ok(())
    }

    /// The student's destination for the current ISO week, if any.
    ///
    /// At most one record per week is expected; if storage ever contains
    /// more (corruption), the most recent wins.
    pub async fn current_for(&self, matricule: i64) -> Result<Option<String>, DatabaseError> {
        let (start, end) = week_bounds(Utc::now());
        let records = self
            .store
            .destinations_in_range(matricule, start, end)
            .await?;
        Ok(records.into_iter().next().map(|r| r.destination))
    }

    /// Insert a destination record timestamped now and update the
    /// student's denormalized `current_destination` column.
    ///
    /// Insert-only: callers must route through [`Self::clear`] first when
    /// a record already exists this week.
    pub async fn set(&self, student: &Student, destination: &str) -> Result<(), StoreError> {
        Self::validate(destination)?;
        let matricule = require_matricule(student)?;

        self.store
            .insert_destination(&DestinationRecord {
                matricule,
                destination: destination.to_string(),
                created_at: Utc::now(),
            })
            .await?;
        self.store
            .set_current_destination(matricule, Some(destination))
            .await?;

        tracing::info!(matricule, destination, "Destination recorded");
        Ok(())
    }

    /// Delete the student's record(s) for the current ISO week and clear
    /// the denormalized column. A no-op if none existed; never touches
    /// prior weeks.
    pub async fn clear(&self, student: &Student) -> Result<(), StoreError> {
        let matricule = require_matricule(student)?;
        let (start, end) = week_bounds(Utc::now());

        let deleted = self
            .store
            .delete_destinations_in_range(matricule, start, end)
            .await?;
        self.store.set_current_destination(matricule, None).await?;

        tracing::info!(matricule, deleted, "Current-week destination cleared");
        Ok(())
    }
}

fn require_matricule(student: &Student) -> Result<i64, StoreError> {
    student.matricule.ok_or_else(|| StoreError::MissingMatricule {
        family_name: student.family_name.clone(),
        given_name: student.given_name.clone(),
    })
}
