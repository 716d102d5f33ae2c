// 🧭 Spreadsheet Column Resolver - find the header row and the wanted column
//
// Census sheets put a title block above the table and often split the header
// over several rows. Strategy:
// 1. First row whose first cell is a known geography = start of data
// 2. Nearest non-blank first cell above it = header candidate
// 3. Re-read with the candidate, +1, +2, ... as header until a column name
//    starts with the requested label

use crate::error::{IndicatorError, Result};
use crate::geography::GeographyTable;
use crate::sheet::{NamedTable, SheetSource};

/// Number of header rows tried when the config doesn't say otherwise
pub const DEFAULT_HEADER_SEARCH_DEPTH: usize = 4;

/// Outcome of a successful resolution
#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    /// Table re-read with the winning header row, columns normalized
    pub table: NamedTable,
    /// Normalized name of the matched column
    pub column: String,
    pub column_index: usize,
    /// First row (in the raw grid) that matched a geography name
    pub first_data_row: usize,
}

pub struct ColumnResolver<'a> {
    geography: &'a GeographyTable,
    /// How many header rows to try, starting at the candidate
    header_search_depth: usize,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(geography: &'a GeographyTable) -> Self {
        ColumnResolver {
            geography,
            header_search_depth: DEFAULT_HEADER_SEARCH_DEPTH,
        }
    }

    /// Builder pattern: override search depth (minimum 1)
    pub fn with_header_search_depth(mut self, depth: usize) -> Self {
        self.header_search_depth = depth.max(1);
        self
    }

    /// Locate (header candidate row, first data row) in the raw grid
    pub fn find_header_candidate(&self, source: &dyn SheetSource, sheet: &str) -> Result<(usize, usize)> {
        let grid = source.read_grid(sheet)?;
        let first_col = grid.first_column();

        let first_data_row = first_col
            .iter()
            .position(|value| self.geography.is_known(value))
            .ok_or_else(|| IndicatorError::NoGeographyRows {
                sheet: sheet.to_string(),
            })?;

        let header_row = first_col[..first_data_row]
            .iter()
            .rposition(|value| !value.is_empty())
            .ok_or_else(|| IndicatorError::HeaderNotFound {
                sheet: sheet.to_string(),
                data_row: first_data_row,
            })?;

        Ok((header_row, first_data_row))
    }

    pub fn resolve(&self, source: &dyn SheetSource, sheet: &str, column_label: &str) -> Result<ResolvedColumn> {
        let (header_row, first_data_row) = self.find_header_candidate(source, sheet)?;
        let wanted = column_label.trim().to_lowercase();
        let mut last_columns: Vec<String> = Vec::new();

        for candidate in header_row..header_row + self.header_search_depth {
            let mut table = match source.read_with_header(sheet, candidate) {
                Ok(table) => table,
                Err(e) => {
                    tracing::debug!(sheet, candidate, error = %e, "header candidate unreadable, skipping");
                    continue;
                }
            };

            let columns: Vec<String> = table.columns.iter().map(|c| normalize_column_name(c)).collect();
            last_columns = columns.clone();

            let matched = columns
                .iter()
                .position(|c| c.to_lowercase().starts_with(&wanted));

            if let Some(column_index) = matched {
                let column = columns[column_index].clone();
                table.columns = columns;

                tracing::debug!(sheet, header_row = candidate, column = %column, "column resolved");
                return Ok(ResolvedColumn {
                    table,
                    column,
                    column_index,
                    first_data_row,
                });
            }
        }

        Err(IndicatorError::ColumnNotFound {
            column: column_label.to_string(),
            sheet: sheet.to_string(),
            last_columns,
        })
    }
}

/// Collapse runs of whitespace (including line breaks inside merged header
/// cells) into single spaces
pub fn normalize_column_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{Grid, MemorySheets};

    fn resolver() -> ColumnResolver<'static> {
        ColumnResolver::new(GeographyTable::ibge())
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("  Pessoas com\n deficiência  "), "Pessoas com deficiência");
        assert_eq!(normalize_column_name(""), "");
    }

    #[test]
    fn test_simple_header_directly_above_data() {
        let sheets = MemorySheets::new("mem").with_sheet(
            "Tabela 1",
            Grid::from_strs(&[
                &["Unidade", "Total", "Homens"],
                &["Brasil", "8,9", "7,7"],
                &["Acre", "9,1", "8,0"],
            ]),
        );

        let resolved = resolver().resolve(&sheets, "Tabela 1", "total").unwrap();
        assert_eq!(resolved.column, "Total");
        assert_eq!(resolved.column_index, 1);
        assert_eq!(resolved.table.header_row, 0);
        assert_eq!(resolved.first_data_row, 1);
    }

    #[test]
    fn test_true_header_two_rows_below_candidate() {
        // candidate row is the title "Grandes Regiões"; the real column names
        // sit two rows further down
        let sheets = MemorySheets::new("mem").with_sheet(
            "Tabela 1",
            Grid::from_strs(&[
                &["Tabela 1 - População residente"],
                &[],
                &["Grandes Regiões e UF", "Pessoas"],
                &["", "Com deficiência"],
                &["", "Total   de\npessoas", "Homens"],
                &["Brasil", "8,9", "7,7"],
                &["Rondônia", "7,5", "6,9"],
            ]),
        );

        let (candidate, first_data) = resolver().find_header_candidate(&sheets, "Tabela 1").unwrap();
        assert_eq!(candidate, 2);
        assert_eq!(first_data, 5);

        let resolved = resolver().resolve(&sheets, "Tabela 1", "Total de").unwrap();
        assert_eq!(resolved.table.header_row, 4);
        assert_eq!(resolved.column, "Total de pessoas");
        assert_eq!(resolved.table.rows[0][0], "Brasil");
    }

    #[test]
    fn test_column_not_found_carries_last_columns() {
        let sheets = MemorySheets::new("mem").with_sheet(
            "Tabela 1",
            Grid::from_strs(&[
                &["Unidade", "Homens"],
                &["Acre", "8,0"],
            ]),
        );

        match resolver().resolve(&sheets, "Tabela 1", "Total") {
            Err(IndicatorError::ColumnNotFound { last_columns, column, .. }) => {
                assert_eq!(column, "Total");
                // candidates 0 and 1 were readable, 2 and 3 are past the end
                assert_eq!(last_columns, vec!["Acre".to_string(), "8,0".to_string()]);
            }
            other => panic!("expected ColumnNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_search_depth_is_configurable() {
        let sheets = MemorySheets::new("mem").with_sheet(
            "Tabela 1",
            Grid::from_strs(&[
                &["Unidade"],
                &["", "a"],
                &["", "b"],
                &["", "Total"],
                &["Acre", "9,1"],
            ]),
        );

        let shallow = resolver().with_header_search_depth(3);
        assert!(matches!(
            shallow.resolve(&sheets, "Tabela 1", "Total"),
            Err(IndicatorError::ColumnNotFound { .. })
        ));

        let resolved = resolver().resolve(&sheets, "Tabela 1", "Total").unwrap();
        assert_eq!(resolved.table.header_row, 3);
    }

    #[test]
    fn test_no_geography_rows() {
        let sheets = MemorySheets::new("mem").with_sheet(
            "Tabela 1",
            Grid::from_strs(&[&["Unidade", "Total"], &["Atlantis", "1"]]),
        );
        assert!(matches!(
            resolver().resolve(&sheets, "Tabela 1", "Total"),
            Err(IndicatorError::NoGeographyRows { .. })
        ));
    }

    #[test]
    fn test_no_header_above_data() {
        let sheets = MemorySheets::new("mem").with_sheet(
            "Tabela 1",
            Grid::from_strs(&[&["", "Total"], &["Acre", "1"]]),
        );
        assert!(matches!(
            resolver().resolve(&sheets, "Tabela 1", "Total"),
            Err(IndicatorError::HeaderNotFound { data_row: 1, .. })
        ));
    }
}
