// 📥 Import pipeline - sheet → catalog → observation store
//
// extract → get-or-create source → get-or-create indicator → upsert → audit row

use crate::catalog::{get_or_create_indicator, get_or_create_source};
use crate::config::AppConfig;
use crate::db::{insert_import_run, ImportRun};
use crate::error::{IndicatorError, Result};
use crate::extractor::{ExtractionStats, ObservationExtractor};
use crate::geography::GeographyTable;
use crate::observations::{upsert_observations, ObservationInput};
use crate::sheet::SheetSource;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

// ============================================================================
// REQUEST / REPORT
// ============================================================================

/// What to read and which indicator it feeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportRequest {
    pub sheet: String,
    pub column: String,
    pub year: i32,
    pub indicator_code: String,
    pub indicator_name: String,
    pub unit: String,
}

impl Default for ImportRequest {
    fn default() -> Self {
        ImportRequest {
            sheet: "Tabela 1".to_string(),
            column: "Total".to_string(),
            year: 2022,
            indicator_code: "IBGE_CENSO_PCD_PERCENT_TOTAL".to_string(),
            indicator_name: "Percentual de pessoas com deficiência (Total)".to_string(),
            unit: "%".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: String,
    pub file: String,
    pub sheet: String,
    pub column: String,
    /// Column name as found in the sheet
    pub matched_column: String,
    /// Canonical rows produced by extraction
    pub rows_read: usize,
    /// New observations (updates are not counted)
    pub rows_inserted: usize,
    pub rows_dropped: usize,
    pub stats: ExtractionStats,
    pub indicator_code: String,
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Import one column of one sheet as an indicator
///
/// Extraction runs before anything is written: a sheet whose column cannot be
/// resolved leaves the catalog untouched.
pub fn import_indicator(
    conn: &mut Connection,
    source: &dyn SheetSource,
    request: &ImportRequest,
    config: &AppConfig,
) -> Result<ImportReport> {
    let column_label = request.column.trim();

    let extraction = ObservationExtractor::new(GeographyTable::ibge())
        .with_header_search_depth(config.header_search_depth)
        .extract(source, &request.sheet, column_label, request.year)?;

    let data_source = get_or_create_source(
        conn,
        &config.source.name,
        config.source.url.as_deref(),
        config.source.description.as_deref(),
    )?;
    let indicator = get_or_create_indicator(
        conn,
        &request.indicator_code,
        &request.indicator_name,
        &request.unit,
        &data_source,
    )?;

    let rows: Vec<ObservationInput> = extraction.rows.iter().map(ObservationInput::from).collect();
    let inserted = upsert_observations(conn, indicator.id, &rows)?;

    let mut run = ImportRun::new(&indicator.code, source.label(), &request.sheet, column_label);
    run.content_sha256 = source.content_sha256().map(str::to_string);
    run.rows_read = rows.len();
    run.rows_inserted = inserted;
    run.rows_dropped = extraction.stats.dropped();
    insert_import_run(conn, &run)?;

    tracing::info!(
        run_id = %run.run_id,
        indicator = %indicator.code,
        file = source.label(),
        rows = rows.len(),
        inserted,
        "import finished"
    );

    Ok(ImportReport {
        run_id: run.run_id,
        file: source.label().to_string(),
        sheet: request.sheet.clone(),
        column: request.column.clone(),
        matched_column: extraction.column,
        rows_read: rows.len(),
        rows_inserted: inserted,
        rows_dropped: extraction.stats.dropped(),
        stats: extraction.stats,
        indicator_code: indicator.code,
    })
}

// ============================================================================
// INSPECTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkbookInspection {
    pub file: String,
    pub sheets: Vec<String>,
    /// Row 0 read as header, trimmed; only when a sheet was asked for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_columns_guess: Option<Vec<String>>,
}

/// List sheets and, optionally, a naive header preview of one of them
pub fn inspect_workbook(source: &dyn SheetSource, sheet: Option<&str>) -> Result<WorkbookInspection> {
    let sheets = source.sheet_names();

    let preview_columns_guess = match sheet {
        Some(name) if !sheets.iter().any(|s| s == name) => {
            return Err(IndicatorError::SheetNotFound {
                sheet: name.to_string(),
                available: sheets,
            });
        }
        Some(name) => {
            let table = source.read_with_header(name, 0)?;
            Some(table.columns.iter().map(|c| c.trim().to_string()).collect())
        }
        None => None,
    };

    Ok(WorkbookInspection {
        file: source.label().to_string(),
        sheets,
        preview_columns_guess,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_indicator;
    use crate::db::{get_import_runs, open_in_memory};
    use crate::geography::GeoLevel;
    use crate::observations::observations_for;
    use crate::sheet::{Grid, MemorySheets};

    fn workbook() -> MemorySheets {
        MemorySheets::new("censo.xlsx")
            .with_sheet("Notas", Grid::from_strs(&[&["Notas gerais"]]))
            .with_sheet(
                "Tabela 1",
                Grid::from_strs(&[
                    &["Tabela 1 - Pessoas com deficiência, por UF"],
                    &["UF", "Total", "Homens"],
                    &["Brasil", "8,9", "7,7"],
                    &["Acre", "9,1", "8,0"],
                    &["Bahia", "9,6", "8,4"],
                    &["São Paulo", "8,0", "6,8"],
                    &["Sergipe", "n/d", "1,0"],
                ]),
            )
    }

    #[test]
    fn test_import_end_to_end() {
        let mut conn = open_in_memory().unwrap();
        let config = AppConfig::default();

        let report = import_indicator(&mut conn, &workbook(), &ImportRequest::default(), &config).unwrap();

        assert_eq!(report.rows_read, 3);
        assert_eq!(report.rows_inserted, 3);
        assert_eq!(report.rows_dropped, 2);
        assert_eq!(report.matched_column, "Total");
        assert_eq!(report.file, "censo.xlsx");

        let indicator = find_indicator(&conn, "IBGE_CENSO_PCD_PERCENT_TOTAL").unwrap().unwrap();
        let stored = observations_for(&conn, indicator.id, 2022, GeoLevel::State).unwrap();
        let ids: Vec<&str> = stored.iter().map(|o| o.geo_id.as_str()).collect();
        assert_eq!(ids, vec!["12", "29", "35"]);

        let runs = get_import_runs(&conn, "IBGE_CENSO_PCD_PERCENT_TOTAL").unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, report.run_id);
    }

    #[test]
    fn test_reimport_inserts_nothing() {
        let mut conn = open_in_memory().unwrap();
        let config = AppConfig::default();
        let request = ImportRequest::default();

        import_indicator(&mut conn, &workbook(), &request, &config).unwrap();
        let second = import_indicator(&mut conn, &workbook(), &request, &config).unwrap();

        assert_eq!(second.rows_read, 3);
        assert_eq!(second.rows_inserted, 0);
        assert_eq!(get_import_runs(&conn, &request.indicator_code).unwrap().len(), 2);
    }

    #[test]
    fn test_bad_column_writes_nothing() {
        let mut conn = open_in_memory().unwrap();
        let request = ImportRequest {
            column: "Mulheres".to_string(),
            ..ImportRequest::default()
        };

        let err = import_indicator(&mut conn, &workbook(), &request, &AppConfig::default()).unwrap_err();
        assert!(matches!(err, IndicatorError::ColumnNotFound { .. }));
        assert!(find_indicator(&conn, &request.indicator_code).unwrap().is_none());
    }

    #[test]
    fn test_inspect_lists_sheets() {
        let inspection = inspect_workbook(&workbook(), None).unwrap();
        assert_eq!(inspection.sheets, vec!["Notas", "Tabela 1"]);
        assert!(inspection.preview_columns_guess.is_none());
    }

    #[test]
    fn test_inspect_preview_uses_first_row() {
        let inspection = inspect_workbook(&workbook(), Some("Tabela 1")).unwrap();
        let columns = inspection.preview_columns_guess.unwrap();
        assert_eq!(columns[0], "Tabela 1 - Pessoas com deficiência, por UF");
        assert_eq!(columns[1], "Unnamed: 1");
    }

    #[test]
    fn test_inspect_unknown_sheet() {
        let err = inspect_workbook(&workbook(), Some("Tabela 9")).unwrap_err();
        assert!(matches!(err, IndicatorError::SheetNotFound { .. }));
    }
}
