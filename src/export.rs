//! Weekly export — CSV of (family name, given name, destination) for all
//! destination records created in the current ISO week.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, Utc};

use crate::destinations::week_bounds;
use crate::error::ExportError;
use crate::store::StudentStore;

/// Produces the weekly destination list as a CSV file.
pub struct WeeklyExporter {
    store: Arc<dyn StudentStore>,
    out_dir: PathBuf,
}

impl WeeklyExporter {
    pub fn new(store: Arc<dyn StudentStore>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            out_dir: out_dir.into(),
        }
    }

    /// Write the current week's roster to a CSV file and return its path.
    pub async fn export_current_week(&self) -> Result<PathBuf, ExportError> {
        let (start, end) = week_bounds(Utc::now());
        let entries = self.store.weekly_roster(start, end).await?;

        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(file_name(start.date_naive()));

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["family_name", "given_name", "destination"])?;
        for entry in &entries {
            writer.write_record([&entry.family_name, &entry.given_name, &entry.destination])?;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), rows = entries.len(), "Weekly export written");
        Ok(path)
    }
}

/// `destinations-<iso year>-W<week>.csv`, derived from the week's Monday.
fn file_name(monday: chrono::NaiveDate) -> String {
    let iso = monday.iso_week();
    format!("destinations-{}-W{:02}.csv", iso.year(), iso.week())
}
