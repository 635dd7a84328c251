//! The async store handle: CRUD over students/attendance/admins plus the
//! 12-hour attendance dedup and student-id generation.
//!
//! All SQL runs on the connection's worker thread via `tokio-rusqlite`;
//! one `Store` is cheap to clone and share across handlers.

use crate::db;
use crate::models::{AttendanceRecord, NewMark, Student};
use crate::{StoreError, DATE_FORMAT, DEDUP_WINDOW_SECS, TIME_FORMAT};
use chrono::NaiveDateTime;
use rand::Rng;
use rusqlite::params;
use std::collections::HashSet;
use std::path::Path;
use tokio_rusqlite::Connection;

/// Generated student ids are the fixed prefix plus five random digits.
const ID_PREFIX: &str = "817";
const ID_ATTEMPTS: usize = 10_000;

/// Outcome of the mark-attendance dedup check, computed inside the
/// connection closure.
enum MarkOutcome {
    UnknownStudent,
    Duplicate,
    Marked(NewMark),
}

/// Async handle to the attendance database.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file and apply migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref().to_path_buf()).await?;
        conn.call(|conn| Ok(db::bootstrap(conn).map_err(other)?))
            .await?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (tests and ephemeral runs).
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|conn| Ok(db::bootstrap(conn).map_err(other)?))
            .await?;
        Ok(Self { conn })
    }

    // --- students ---

    /// All students, ordered by name.
    pub async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        let students = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, faculty, dob, email, address FROM students ORDER BY name",
                )?;
                let rows = stmt
                    .query_map([], student_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(students)
    }

    pub async fn get_student(&self, student_id: &str) -> Result<Option<Student>, StoreError> {
        let student_id = student_id.to_string();
        let student = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, faculty, dob, email, address FROM students WHERE id = ?1",
                )?;
                let mut rows = stmt.query_map([student_id], student_from_row)?;
                Ok(rows.next().transpose()?)
            })
            .await?;
        Ok(student)
    }

    /// Insert or replace a student row.
    pub async fn upsert_student(&self, student: &Student) -> Result<(), StoreError> {
        let s = student.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO students (id, name, faculty, dob, email, address)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![s.id, s.name, s.faculty, s.dob, s.email, s.address],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Update an existing student; errors when the id is unknown.
    pub async fn update_student(&self, student: &Student) -> Result<(), StoreError> {
        let s = student.clone();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE students
                     SET name = ?2, faculty = ?3, dob = ?4, email = ?5, address = ?6
                     WHERE id = ?1",
                    params![s.id, s.name, s.faculty, s.dob, s.email, s.address],
                )?;
                Ok(changed)
            })
            .await?;
        if changed == 0 {
            return Err(StoreError::StudentNotFound(student.id.clone()));
        }
        Ok(())
    }

    /// Delete a student; their attendance rows cascade. Returns whether a
    /// row was actually removed.
    pub async fn delete_student(&self, student_id: &str) -> Result<bool, StoreError> {
        let student_id = student_id.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM students WHERE id = ?1", [student_id])?)
            })
            .await?;
        Ok(changed > 0)
    }

    /// Generate a fresh unique student id: the fixed prefix plus five
    /// random digits, retried against the existing id set.
    pub async fn next_student_id(&self) -> Result<String, StoreError> {
        let existing: HashSet<String> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id FROM students")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<HashSet<_>, _>>()?;
                Ok(ids)
            })
            .await?;

        let mut rng = rand::thread_rng();
        for _ in 0..ID_ATTEMPTS {
            let candidate = format!("{ID_PREFIX}{}", rng.gen_range(10_000..=99_999));
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
        }
        Err(StoreError::IdSpaceExhausted(ID_ATTEMPTS))
    }

    // --- attendance ---

    /// All attendance records joined with student names, newest first.
    pub async fn list_attendance(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        let records = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT a.id, s.id, s.name, a.date, a.time
                     FROM attendance a
                     JOIN students s ON a.student_id = s.id
                     ORDER BY a.date DESC, a.time DESC",
                )?;
                let rows = stmt
                    .query_map([], record_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(records)
    }

    /// Attendance records for one student, newest first.
    pub async fn attendance_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let student_id = student_id.to_string();
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT a.id, s.id, s.name, a.date, a.time
                     FROM attendance a
                     JOIN students s ON a.student_id = s.id
                     WHERE s.id = ?1
                     ORDER BY a.date DESC, a.time DESC",
                )?;
                let rows = stmt
                    .query_map([student_id], record_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(records)
    }

    /// Mark attendance at `now` unless the student's most recent record is
    /// less than 12 hours old.
    ///
    /// Returns the inserted row, or `None` when deduplicated. The check
    /// reads only the single newest row by (date, time), so an imported
    /// out-of-order record can mask an older one.
    pub async fn mark_attendance(
        &self,
        student_id: &str,
        now: NaiveDateTime,
    ) -> Result<Option<NewMark>, StoreError> {
        let sid = student_id.to_string();
        let outcome = self
            .conn
            .call(move |conn| {
                let name: Option<String> = conn
                    .query_row(
                        "SELECT name FROM students WHERE id = ?1",
                        [sid.as_str()],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(ignore_no_rows)?;
                let Some(name) = name else {
                    return Ok(MarkOutcome::UnknownStudent);
                };

                let last: Option<(String, String)> = conn
                    .query_row(
                        "SELECT date, time FROM attendance
                         WHERE student_id = ?1
                         ORDER BY date DESC, time DESC LIMIT 1",
                        [sid.as_str()],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .map(Some)
                    .or_else(ignore_no_rows)?;

                if let Some((last_date, last_time)) = last {
                    // Unparseable historical rows fall through to a fresh mark.
                    if let Ok(last_dt) = NaiveDateTime::parse_from_str(
                        &format!("{last_date} {last_time}"),
                        "%Y-%m-%d %H:%M:%S",
                    ) {
                        if (now - last_dt).num_seconds() < DEDUP_WINDOW_SECS {
                            return Ok(MarkOutcome::Duplicate);
                        }
                    }
                }

                let date = now.format(DATE_FORMAT).to_string();
                let time = now.format(TIME_FORMAT).to_string();
                conn.execute(
                    "INSERT INTO attendance (student_id, date, time) VALUES (?1, ?2, ?3)",
                    params![sid, date, time],
                )?;

                Ok(MarkOutcome::Marked(NewMark {
                    student_id: sid,
                    name,
                    date,
                    time,
                }))
            })
            .await?;

        match outcome {
            MarkOutcome::UnknownStudent => {
                Err(StoreError::StudentNotFound(student_id.to_string()))
            }
            MarkOutcome::Duplicate => Ok(None),
            MarkOutcome::Marked(mark) => Ok(Some(mark)),
        }
    }

    /// Insert a raw attendance row, bypassing the dedup window (CSV import).
    pub async fn insert_attendance(
        &self,
        student_id: &str,
        date: &str,
        time: &str,
    ) -> Result<(), StoreError> {
        let (sid, date, time) = (student_id.to_string(), date.to_string(), time.to_string());
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO attendance (student_id, date, time) VALUES (?1, ?2, ?3)",
                    params![sid, date, time],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Delete one attendance row by primary key.
    pub async fn delete_attendance(&self, attendance_id: i64) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM attendance WHERE id = ?1", [attendance_id])?)
            })
            .await?;
        Ok(changed > 0)
    }

    // --- admins ---

    /// Plaintext credential check against the admins table.
    pub async fn verify_admin(&self, admin_id: &str, password: &str) -> Result<bool, StoreError> {
        let (admin_id, password) = (admin_id.to_string(), password.to_string());
        let found = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM admins WHERE id = ?1 AND password = ?2",
                    params![admin_id, password],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(found)
    }
}

fn student_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        faculty: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        dob: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        email: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        address: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: row.get(0)?,
        student_id: row.get(1)?,
        name: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
    })
}

fn ignore_no_rows<T>(err: rusqlite::Error) -> Result<Option<T>, rusqlite::Error> {
    match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}

fn other(err: StoreError) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(err))
}
