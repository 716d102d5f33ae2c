// 💾 Observation Store - idempotent upsert keyed by (indicator, geo_id, year)
//
// Read-then-write per row inside one transaction per call. Re-running the same
// input leaves the store unchanged; changed values overwrite in place. The
// geo_level of an existing row is never rewritten.
//
// No mutual exclusion across callers: two concurrent upserts for the same key
// race at the SQLite transaction level.

use crate::error::Result;
use crate::extractor::CanonicalObservationRow;
use crate::geography::GeoLevel;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// A row ready to be stored for some indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationInput {
    pub geo_id: String,
    pub geo_level: GeoLevel,
    pub year: i32,
    pub value: f64,
}

impl ObservationInput {
    pub fn new(geo_id: &str, geo_level: GeoLevel, year: i32, value: f64) -> Self {
        ObservationInput {
            geo_id: geo_id.to_string(),
            geo_level,
            year,
            value,
        }
    }
}

impl From<&CanonicalObservationRow> for ObservationInput {
    fn from(row: &CanonicalObservationRow) -> Self {
        ObservationInput {
            geo_id: row.geo_id.clone(),
            geo_level: row.geo_level,
            year: row.year,
            value: row.value,
        }
    }
}

/// A stored observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub indicator_id: i64,
    pub geo_id: String,
    pub geo_level: String,
    pub year: i32,
    pub value: f64,
}

/// Insert new keys, overwrite values of existing ones
///
/// Returns the number of newly inserted rows; updates are not counted.
pub fn upsert_observations(conn: &mut Connection, indicator_id: i64, rows: &[ObservationInput]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut inserted = 0;
    let mut updated = 0;

    {
        let mut find = tx.prepare_cached(
            "SELECT id FROM observations WHERE indicator_id = ?1 AND geo_id = ?2 AND year = ?3",
        )?;
        let mut update = tx.prepare_cached("UPDATE observations SET value = ?1 WHERE id = ?2")?;
        let mut insert = tx.prepare_cached(
            "INSERT INTO observations (indicator_id, geo_id, geo_level, year, value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        for row in rows {
            let existing: Option<i64> = find
                .query_row(params![indicator_id, row.geo_id, row.year], |r| r.get(0))
                .optional()?;

            match existing {
                Some(id) => {
                    update.execute(params![row.value, id])?;
                    updated += 1;
                }
                None => {
                    insert.execute(params![
                        indicator_id,
                        row.geo_id,
                        row.geo_level.as_str(),
                        row.year,
                        row.value
                    ])?;
                    inserted += 1;
                }
            }
        }
    }

    tx.commit()?;

    tracing::info!(indicator_id, inserted, updated, "observations upserted");
    Ok(inserted)
}

/// All observations of one indicator for a year and level, ordered by geo_id
pub fn observations_for(conn: &Connection, indicator_id: i64, year: i32, level: GeoLevel) -> Result<Vec<Observation>> {
    let mut stmt = conn.prepare(
        "SELECT id, indicator_id, geo_id, geo_level, year, value
         FROM observations
         WHERE indicator_id = ?1 AND year = ?2 AND geo_level = ?3
         ORDER BY geo_id",
    )?;

    let observations = stmt
        .query_map(params![indicator_id, year, level.as_str()], |row| {
            Ok(Observation {
                id: row.get(0)?,
                indicator_id: row.get(1)?,
                geo_id: row.get(2)?,
                geo_level: row.get(3)?,
                year: row.get(4)?,
                value: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(observations)
}

pub fn count_observations(conn: &Connection, indicator_id: i64) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM observations WHERE indicator_id = ?1",
        params![indicator_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{get_or_create_indicator, get_or_create_source};
    use crate::db::open_in_memory;

    fn setup() -> (Connection, i64) {
        let mut conn = open_in_memory().unwrap();
        let src = get_or_create_source(&mut conn, "TEST", None, None).unwrap();
        let ind = get_or_create_indicator(&mut conn, "T", "Test", "%", &src).unwrap();
        (conn, ind.id)
    }

    fn rows() -> Vec<ObservationInput> {
        vec![
            ObservationInput::new("11", GeoLevel::State, 2022, 7.5),
            ObservationInput::new("12", GeoLevel::State, 2022, 9.1),
            ObservationInput::new("29", GeoLevel::State, 2022, 8.3),
        ]
    }

    #[test]
    fn test_upsert_twice_is_idempotent() {
        let (mut conn, id) = setup();

        let first = upsert_observations(&mut conn, id, &rows()).unwrap();
        let after_first = observations_for(&conn, id, 2022, GeoLevel::State).unwrap();

        let second = upsert_observations(&mut conn, id, &rows()).unwrap();
        let after_second = observations_for(&conn, id, 2022, GeoLevel::State).unwrap();

        assert_eq!(first, 3, "first upsert inserts every row");
        assert_eq!(second, 0, "second upsert inserts nothing");
        assert_eq!(after_first, after_second);
        assert_eq!(count_observations(&conn, id).unwrap(), 3);
    }

    #[test]
    fn test_changed_value_updates_in_place() {
        let (mut conn, id) = setup();
        upsert_observations(&mut conn, id, &rows()).unwrap();

        let changed = vec![ObservationInput::new("12", GeoLevel::State, 2022, 10.0)];
        let inserted = upsert_observations(&mut conn, id, &changed).unwrap();

        assert_eq!(inserted, 0);
        assert_eq!(count_observations(&conn, id).unwrap(), 3);

        let stored = observations_for(&conn, id, 2022, GeoLevel::State).unwrap();
        let acre = stored.iter().find(|o| o.geo_id == "12").unwrap();
        assert_eq!(acre.value, 10.0);
    }

    #[test]
    fn test_geo_level_is_not_rewritten() {
        let (mut conn, id) = setup();
        upsert_observations(&mut conn, id, &rows()).unwrap();

        let relabeled = vec![ObservationInput::new("11", GeoLevel::Municipality, 2022, 1.0)];
        upsert_observations(&mut conn, id, &relabeled).unwrap();

        let states = observations_for(&conn, id, 2022, GeoLevel::State).unwrap();
        let rondonia = states.iter().find(|o| o.geo_id == "11").unwrap();
        assert_eq!(rondonia.geo_level, "uf");
        assert_eq!(rondonia.value, 1.0);
        assert!(observations_for(&conn, id, 2022, GeoLevel::Municipality).unwrap().is_empty());
    }

    #[test]
    fn test_years_are_separate_keys() {
        let (mut conn, id) = setup();
        upsert_observations(&mut conn, id, &rows()).unwrap();

        let next_year = vec![ObservationInput::new("11", GeoLevel::State, 2023, 7.7)];
        assert_eq!(upsert_observations(&mut conn, id, &next_year).unwrap(), 1);
        assert_eq!(count_observations(&conn, id).unwrap(), 4);
    }

    #[test]
    fn test_last_call_wins() {
        let (mut conn, id) = setup();
        for value in [1.0, 2.0, 3.0] {
            let batch = vec![ObservationInput::new("35", GeoLevel::State, 2022, value)];
            upsert_observations(&mut conn, id, &batch).unwrap();
        }

        let stored = observations_for(&conn, id, 2022, GeoLevel::State).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, 3.0);
    }
}
