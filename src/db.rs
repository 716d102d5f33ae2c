// 🗄️ Store setup - SQLite schema + import audit trail
//
// Source → Indicator → Observation, with one value per
// (indicator, place, year) enforced by a UNIQUE constraint.

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Open (or create) a database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    tracing::debug!(path = %path.display(), "database opened");
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            url TEXT,
            description TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS indicators (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            unit TEXT,
            source_id INTEGER REFERENCES sources(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            indicator_id INTEGER NOT NULL REFERENCES indicators(id),
            geo_id TEXT NOT NULL,
            geo_level TEXT NOT NULL,
            year INTEGER NOT NULL,
            value REAL NOT NULL,
            CONSTRAINT uq_obs_one_value UNIQUE (indicator_id, geo_id, year)
        )",
        [],
    )?;

    // ==========================================================================
    // Import runs (append-only audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            indicator_code TEXT NOT NULL,
            file TEXT NOT NULL,
            sheet TEXT NOT NULL,
            column_label TEXT NOT NULL,
            content_sha256 TEXT,
            rows_read INTEGER NOT NULL,
            rows_inserted INTEGER NOT NULL,
            rows_dropped INTEGER NOT NULL,
            imported_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_obs_indicator_year_level
         ON observations(indicator_id, year, geo_level)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_import_runs_indicator ON import_runs(indicator_code)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// IMPORT RUNS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRun {
    pub run_id: String,
    pub indicator_code: String,
    pub file: String,
    pub sheet: String,
    pub column: String,
    pub content_sha256: Option<String>,
    pub rows_read: usize,
    pub rows_inserted: usize,
    pub rows_dropped: usize,
    pub imported_at: DateTime<Utc>,
}

impl ImportRun {
    pub fn new(indicator_code: &str, file: &str, sheet: &str, column: &str) -> Self {
        ImportRun {
            run_id: uuid::Uuid::new_v4().to_string(),
            indicator_code: indicator_code.to_string(),
            file: file.to_string(),
            sheet: sheet.to_string(),
            column: column.to_string(),
            content_sha256: None,
            rows_read: 0,
            rows_inserted: 0,
            rows_dropped: 0,
            imported_at: Utc::now(),
        }
    }
}

pub fn insert_import_run(conn: &Connection, run: &ImportRun) -> Result<()> {
    conn.execute(
        "INSERT INTO import_runs (
            run_id, indicator_code, file, sheet, column_label, content_sha256,
            rows_read, rows_inserted, rows_dropped, imported_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            run.run_id,
            run.indicator_code,
            run.file,
            run.sheet,
            run.column,
            run.content_sha256,
            run.rows_read as i64,
            run.rows_inserted as i64,
            run.rows_dropped as i64,
            run.imported_at.to_rfc3339(),
        ],
    )?;

    Ok(())
}

/// Runs for one indicator, newest first
pub fn get_import_runs(conn: &Connection, indicator_code: &str) -> Result<Vec<ImportRun>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, indicator_code, file, sheet, column_label, content_sha256,
                rows_read, rows_inserted, rows_dropped, imported_at
         FROM import_runs
         WHERE indicator_code = ?1
         ORDER BY imported_at DESC, id DESC",
    )?;

    let runs = stmt
        .query_map(params![indicator_code], |row| {
            let imported_at: String = row.get(9)?;
            let rows_read: i64 = row.get(6)?;
            let rows_inserted: i64 = row.get(7)?;
            let rows_dropped: i64 = row.get(8)?;

            Ok(ImportRun {
                run_id: row.get(0)?,
                indicator_code: row.get(1)?,
                file: row.get(2)?,
                sheet: row.get(3)?,
                column: row.get(4)?,
                content_sha256: row.get(5)?,
                rows_read: rows_read as usize,
                rows_inserted: rows_inserted as usize,
                rows_dropped: rows_dropped as usize,
                imported_at: DateTime::parse_from_rfc3339(&imported_at)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
                    })?
                    .with_timezone(&Utc),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_is_repeatable() {
        let conn = open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('sources', 'indicators', 'observations', 'import_runs')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn test_unique_observation_key() {
        let conn = open_in_memory().unwrap();
        conn.execute("INSERT INTO sources (name) VALUES ('S')", []).unwrap();
        conn.execute(
            "INSERT INTO indicators (code, name, unit, source_id) VALUES ('X', 'X', '%', 1)",
            [],
        )
        .unwrap();

        let insert = "INSERT INTO observations (indicator_id, geo_id, geo_level, year, value)
                      VALUES (1, '11', 'uf', 2022, 1.0)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_import_run_log() {
        let conn = open_in_memory().unwrap();

        let mut run = ImportRun::new("IBGE_X", "censo.xlsx", "Tabela 1", "Total");
        run.content_sha256 = Some("ab".repeat(32));
        run.rows_read = 27;
        run.rows_inserted = 27;
        insert_import_run(&conn, &run).unwrap();

        let runs = get_import_runs(&conn, "IBGE_X").unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, run.run_id);
        assert_eq!(runs[0].rows_inserted, 27);
        assert_eq!(runs[0].content_sha256, run.content_sha256);

        assert!(get_import_runs(&conn, "OTHER").unwrap().is_empty());
    }
}
