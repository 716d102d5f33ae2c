// 📚 Indicator Catalog - create-once Sources and Indicators
//
// Lookups go by natural key (source name, indicator code). A hit returns the
// stored entity untouched even if the caller passes different fields: catalog
// entries are written once and never updated.

use crate::error::{IndicatorError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub source_id: i64,
}

impl Source {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Source {
            id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            description: row.get(3)?,
        })
    }
}

impl Indicator {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let unit: Option<String> = row.get(3)?;
        Ok(Indicator {
            id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            unit: unit.unwrap_or_default(),
            source_id: row.get(4)?,
        })
    }
}

// ============================================================================
// SOURCES
// ============================================================================

pub fn find_source(conn: &Connection, name: &str) -> Result<Option<Source>> {
    let source = conn
        .query_row(
            "SELECT id, name, url, description FROM sources WHERE name = ?1",
            params![name],
            Source::from_row,
        )
        .optional()?;
    Ok(source)
}

pub fn get_or_create_source(
    conn: &mut Connection,
    name: &str,
    url: Option<&str>,
    description: Option<&str>,
) -> Result<Source> {
    let tx = conn.transaction()?;

    if let Some(source) = find_source(&tx, name)? {
        return Ok(source);
    }

    tx.execute(
        "INSERT INTO sources (name, url, description) VALUES (?1, ?2, ?3)",
        params![name, url, description],
    )?;
    let source = Source {
        id: tx.last_insert_rowid(),
        name: name.to_string(),
        url: url.map(str::to_string),
        description: description.map(str::to_string),
    };
    tx.commit()?;

    tracing::info!(source = name, id = source.id, "source created");
    Ok(source)
}

// ============================================================================
// INDICATORS
// ============================================================================

pub fn find_indicator(conn: &Connection, code: &str) -> Result<Option<Indicator>> {
    let indicator = conn
        .query_row(
            "SELECT id, code, name, unit, source_id FROM indicators WHERE code = ?1",
            params![code],
            Indicator::from_row,
        )
        .optional()?;
    Ok(indicator)
}

/// Like `find_indicator`, but a miss is an `IndicatorNotFound` error
pub fn require_indicator(conn: &Connection, code: &str) -> Result<Indicator> {
    find_indicator(conn, code)?.ok_or_else(|| IndicatorError::IndicatorNotFound(code.to_string()))
}

pub fn get_or_create_indicator(
    conn: &mut Connection,
    code: &str,
    name: &str,
    unit: &str,
    source: &Source,
) -> Result<Indicator> {
    let tx = conn.transaction()?;

    if let Some(indicator) = find_indicator(&tx, code)? {
        if indicator.name != name || indicator.unit != unit {
            tracing::debug!(code, "indicator exists, new name/unit ignored");
        }
        return Ok(indicator);
    }

    tx.execute(
        "INSERT INTO indicators (code, name, unit, source_id) VALUES (?1, ?2, ?3, ?4)",
        params![code, name, unit, source.id],
    )?;
    let indicator = Indicator {
        id: tx.last_insert_rowid(),
        code: code.to_string(),
        name: name.to_string(),
        unit: unit.to_string(),
        source_id: source.id,
    };
    tx.commit()?;

    tracing::info!(indicator = code, source = %source.name, id = indicator.id, "indicator created");
    Ok(indicator)
}

pub fn list_indicators(conn: &Connection) -> Result<Vec<Indicator>> {
    let mut stmt = conn.prepare("SELECT id, code, name, unit, source_id FROM indicators ORDER BY code")?;
    let indicators = stmt
        .query_map([], Indicator::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(indicators)
}
