//! libSQL backend — async `StudentStore` implementation.
//!
//! Supports local file and in-memory databases. The connection is acquired
//! once at startup and reused for all operations; `libsql::Connection` is
//! `Send + Sync` and safe for concurrent async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{DestinationRecord, RosterEntry, Student, StudentStore};

/// Student columns in canonical order, shared by all SELECTs.
const STUDENT_COLUMNS: &str = "family_name, given_name, region, group_tag, matricule";

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp write format. Fixed-width microseconds so that
/// lexicographic comparison in SQL matches chronological order.
fn fmt_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert `Option<i64>` to a libsql Value.
fn opt_int(n: Option<i64>) -> libsql::Value {
    match n {
        Some(n) => libsql::Value::Integer(n),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a Student.
///
/// Column order matches STUDENT_COLUMNS:
/// 0:family_name, 1:given_name, 2:region, 3:group_tag, 4:matricule
fn row_to_student(row: &libsql::Row) -> Result<Student, libsql::Error> {
    Ok(Student {
        family_name: row.get(0)?,
        given_name: row.get(1)?,
        // Nullable columns: a NULL read fails typed extraction, so fall
        // back to None rather than erroring.
        region: row.get::<String>(2).ok(),
        group_tag: row.get::<String>(3).ok(),
        matricule: row.get::<i64>(4).ok(),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl StudentStore for LibSqlBackend {
    async fn find_student_by_family_name(
        &self,
        family_name: &str,
    ) -> Result<Option<Student>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {STUDENT_COLUMNS} FROM students WHERE family_name = ?1 ORDER BY id ASC LIMIT 1"
                ),
                params![family_name],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_student_by_family_name: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let student = row_to_student(&row).map_err(|e| {
                    DatabaseError::Query(format!("find_student_by_family_name row: {e}"))
                })?;
                Ok(Some(student))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!(
                "find_student_by_family_name next: {e}"
            ))),
        }
    }

    async fn list_students(&self) -> Result<Vec<Student>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY id ASC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_students: {e}")))?;

        let mut students = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            students.push(
                row_to_student(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_students row: {e}")))?,
            );
        }
        Ok(students)
    }

    async fn insert_student(&self, student: &Student) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO students (family_name, given_name, region, group_tag, matricule)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                student.family_name.as_str(),
                student.given_name.as_str(),
                opt_text(student.region.as_deref()),
                opt_text(student.group_tag.as_deref()),
                opt_int(student.matricule),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_student: {e}")))?;

        debug!(family_name = %student.family_name, "Student inserted");
        Ok(())
    }

    async fn count_students(&self) -> Result<u64, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query("SELECT COUNT(*) FROM students", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_students: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count_students row: {e}")))?;
                Ok(count as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_students next: {e}"))),
        }
    }

    async fn destinations_in_range(
        &self,
        matricule: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DestinationRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT matricule, destination, created_at FROM destinations
                 WHERE matricule = ?1 AND created_at >= ?2 AND created_at < ?3
                 ORDER BY created_at DESC",
                params![matricule, fmt_datetime(start), fmt_datetime(end)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("destinations_in_range: {e}")))?;

        let mut records = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let created_str: String = row
                .get(2)
                .map_err(|e| DatabaseError::Query(format!("destinations_in_range row: {e}")))?;
            records.push(DestinationRecord {
                matricule: row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("destinations_in_range row: {e}")))?,
                destination: row
                    .get(1)
                    .map_err(|e| DatabaseError::Query(format!("destinations_in_range row: {e}")))?,
                created_at: parse_datetime(&created_str),
            });
        }
        Ok(records)
    }

    async fn insert_destination(&self, record: &DestinationRecord) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO destinations (matricule, destination, created_at) VALUES (?1, ?2, ?3)",
            params![
                record.matricule,
                record.destination.as_str(),
                fmt_datetime(record.created_at),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_destination: {e}")))?;

        debug!(matricule = record.matricule, "Destination inserted");
        Ok(())
    }

    async fn delete_destinations_in_range(
        &self,
        matricule: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let conn = self.conn();
        let deleted = conn
            .execute(
                "DELETE FROM destinations
                 WHERE matricule = ?1 AND created_at >= ?2 AND created_at < ?3",
                params![matricule, fmt_datetime(start), fmt_datetime(end)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_destinations_in_range: {e}")))?;

        Ok(deleted)
    }

    async fn set_current_destination(
        &self,
        matricule: i64,
        destination: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "UPDATE students SET current_destination = ?1 WHERE matricule = ?2",
            params![opt_text(destination), matricule],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("set_current_destination: {e}")))?;
        Ok(())
    }

    async fn weekly_roster(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RosterEntry>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT s.family_name, s.given_name, d.destination
                 FROM students s
                 JOIN destinations d ON s.matricule = d.matricule
                 WHERE d.created_at >= ?1 AND d.created_at < ?2
                 ORDER BY s.family_name ASC, s.given_name ASC",
                params![fmt_datetime(start), fmt_datetime(end)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("weekly_roster: {e}")))?;

        let mut entries = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            entries.push(RosterEntry {
                family_name: row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("weekly_roster row: {e}")))?,
                given_name: row
                    .get(1)
                    .map_err(|e| DatabaseError::Query(format!("weekly_roster row: {e}")))?,
                destination: row
                    .get(2)
                    .map_err(|e| DatabaseError::Query(format!("weekly_roster row: {e}")))?,
            });
        }
        Ok(entries)
    }
}
