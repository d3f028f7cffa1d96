use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::error::StoreError;
use crate::materialize::{CourseId, ExamRecord, ExamStore, TermId, Upsert};
use crate::model::{Crn, Room};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating database directory {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("opening database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS terms (
            id         INTEGER PRIMARY KEY,
            code       TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS rooms (
            id         INTEGER PRIMARY KEY,
            building   TEXT NOT NULL,
            room       TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(building, room)
        );

        CREATE TABLE IF NOT EXISTS courses (
            id         INTEGER PRIMARY KEY,
            term_id    INTEGER NOT NULL REFERENCES terms(id),
            crn        INTEGER NOT NULL,
            title      TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(term_id, crn)
        );

        CREATE TABLE IF NOT EXISTS exams (
            id            INTEGER PRIMARY KEY,
            term_id       INTEGER NOT NULL REFERENCES terms(id),
            crn           INTEGER NOT NULL,
            combined_crns TEXT NOT NULL,   -- JSON array
            exam_date     TEXT NOT NULL,
            start_minute  INTEGER NOT NULL CHECK(start_minute BETWEEN 0 AND 1439),
            end_minute    INTEGER NOT NULL CHECK(end_minute BETWEEN 0 AND 1439),
            location      TEXT,
            course_id     INTEGER REFERENCES courses(id),
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at    TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(term_id, crn),
            CHECK(start_minute < end_minute)
        );
        CREATE INDEX IF NOT EXISTS idx_exams_date ON exams(exam_date);
        CREATE INDEX IF NOT EXISTS idx_exams_orphan ON exams(term_id) WHERE course_id IS NULL;
        ",
    )?;
    Ok(())
}

// ── Store ──

/// [`ExamStore`] over a connection or an open transaction.
pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> SqliteStore<'a> {
        SqliteStore { conn }
    }
}

impl ExamStore for SqliteStore<'_> {
    fn resolve_term(&mut self, code: &str) -> Result<TermId, StoreError> {
        self.conn
            .execute("INSERT OR IGNORE INTO terms (code) VALUES (?1)", [code])?;
        let id = self
            .conn
            .query_row("SELECT id FROM terms WHERE code = ?1", [code], |r| r.get(0))?;
        Ok(id)
    }

    fn ensure_room(&mut self, room: &Room) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO rooms (building, room) VALUES (?1, ?2)",
            rusqlite::params![room.building, room.room],
        )?;
        Ok(inserted > 0)
    }

    fn find_course(&mut self, term: TermId, crn: Crn) -> Result<Option<CourseId>, StoreError> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM courses WHERE term_id = ?1 AND crn = ?2",
                rusqlite::params![term, crn.get()],
                |r| r.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn upsert_exam(&mut self, r: &ExamRecord) -> Result<Upsert, StoreError> {
        let combined = serde_json::to_string(&r.combined)?;
        let location = r.location.as_ref().map(|l| l.to_string());
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM exams WHERE term_id = ?1 AND crn = ?2",
                rusqlite::params![r.term_id, r.crn.get()],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                // A known course link is never cleared by a later import.
                self.conn.execute(
                    "UPDATE exams
                     SET combined_crns = ?1, exam_date = ?2, start_minute = ?3, end_minute = ?4,
                         location = ?5, course_id = COALESCE(?6, course_id),
                         updated_at = datetime('now')
                     WHERE id = ?7",
                    rusqlite::params![
                        combined, r.date.to_string(), r.time.start(), r.time.end(),
                        location, r.course_id, id,
                    ],
                )?;
                Ok(Upsert::Updated)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO exams
                     (term_id, crn, combined_crns, exam_date, start_minute, end_minute, location, course_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        r.term_id, r.crn.get(), combined, r.date.to_string(),
                        r.time.start(), r.time.end(), location, r.course_id,
                    ],
                )?;
                Ok(Upsert::Created)
            }
        }
    }
}

// ── Relinking ──

/// Attach orphan exams of `term_code` to courses imported since. Returns the
/// number of records linked.
pub fn relink_orphans(conn: &Connection, term_code: &str) -> Result<usize, StoreError> {
    let linked = conn.execute(
        "UPDATE exams
         SET course_id = (
                 SELECT c.id FROM courses c
                 WHERE c.term_id = exams.term_id AND c.crn = exams.crn
             ),
             updated_at = datetime('now')
         WHERE course_id IS NULL
           AND term_id = (SELECT id FROM terms WHERE code = ?1)
           AND EXISTS (
               SELECT 1 FROM courses c WHERE c.term_id = exams.term_id AND c.crn = exams.crn
           )",
        [term_code],
    )?;
    Ok(linked)
}

// ── Listing ──

pub struct ExamRow {
    pub crn: u32,
    pub combined_crns: String,
    pub exam_date: String,
    pub start_minute: u16,
    pub end_minute: u16,
    pub location: Option<String>,
    pub course_id: Option<CourseId>,
}

pub fn fetch_exams(conn: &Connection, term_code: &str) -> Result<Vec<ExamRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT e.crn, e.combined_crns, e.exam_date, e.start_minute, e.end_minute,
                e.location, e.course_id
         FROM exams e
         JOIN terms t ON t.id = e.term_id
         WHERE t.code = ?1
         ORDER BY e.exam_date, e.start_minute, e.crn",
    )?;
    let rows = stmt
        .query_map([term_code], |row| {
            Ok(ExamRow {
                crn: row.get(0)?,
                combined_crns: row.get(1)?,
                exam_date: row.get(2)?,
                start_minute: row.get(3)?,
                end_minute: row.get(4)?,
                location: row.get(5)?,
                course_id: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub terms: usize,
    pub rooms: usize,
    pub courses: usize,
    pub exams: usize,
    pub linked: usize,
    pub orphan: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats, StoreError> {
    let count = |sql: &str| -> Result<usize, StoreError> {
        Ok(conn.query_row(sql, [], |r| r.get(0))?)
    };
    let exams = count("SELECT COUNT(*) FROM exams")?;
    let linked = count("SELECT COUNT(*) FROM exams WHERE course_id IS NOT NULL")?;
    Ok(Stats {
        terms: count("SELECT COUNT(*) FROM terms")?,
        rooms: count("SELECT COUNT(*) FROM rooms")?,
        courses: count("SELECT COUNT(*) FROM courses")?,
        exams,
        linked,
        orphan: exams - linked,
    })
}
