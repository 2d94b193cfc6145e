//! Roster seeding — imports students from a CSV file when the table is empty.
//!
//! Expected header: `family_name,given_name,region,group_tag,matricule`.
//! Empty optional fields deserialize to `None`.

use std::path::Path;

use crate::error::RosterError;
use crate::store::{Student, StudentStore};

/// Seed the students table from a CSV file. Returns the number of rows
/// inserted; 0 when the table already has students (the file is ignored).
pub async fn seed_if_empty(store: &dyn StudentStore, path: &Path) -> Result<usize, RosterError> {
    if store.count_students().await? > 0 {
        tracing::debug!(path = %path.display(), "Students table not empty; roster skipped");
        return Ok(0);
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut inserted = 0;
    for row in reader.deserialize::<Student>() {
        let student = row?;
        store.insert_student(&student).await?;
        inserted += 1;
    }

    tracing::info!(inserted, path = %path.display(), "Roster seeded");
    Ok(inserted)
}
