// 🧾 Observation Extractor - sheet → canonical state-level rows
//
// Permissive by design: a row with an unknown place, an aggregate place or an
// unparseable value is dropped and counted, the rest of the sheet still loads.

use crate::error::Result;
use crate::geography::{GeoLevel, GeographyTable};
use crate::numeric;
use crate::resolver::ColumnResolver;
use crate::sheet::SheetSource;
use serde::{Deserialize, Serialize};

// ============================================================================
// OUTPUT TYPES
// ============================================================================

/// One extracted data point, not yet tied to an indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalObservationRow {
    pub geo_name: String,
    pub geo_id: String,
    pub geo_level: GeoLevel,
    pub year: i32,
    pub value: f64,
}

/// Where the rows of a sheet went
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Data rows below the header
    pub rows_scanned: usize,
    /// First cell is not a geography name (notes, blanks, footers)
    pub skipped_non_geography: usize,
    /// Country / region totals
    pub skipped_aggregate: usize,
    /// Known state but the value cell did not parse
    pub dropped_malformed: usize,
}

impl ExtractionStats {
    pub fn dropped(&self) -> usize {
        self.skipped_non_geography + self.skipped_aggregate + self.dropped_malformed
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub rows: Vec<CanonicalObservationRow>,
    /// Normalized name of the column the values came from
    pub column: String,
    pub header_row: usize,
    pub stats: ExtractionStats,
}

// ============================================================================
// EXTRACTOR
// ============================================================================

pub struct ObservationExtractor<'a> {
    geography: &'a GeographyTable,
    header_search_depth: usize,
}

impl<'a> ObservationExtractor<'a> {
    pub fn new(geography: &'a GeographyTable) -> Self {
        ObservationExtractor {
            geography,
            header_search_depth: crate::resolver::DEFAULT_HEADER_SEARCH_DEPTH,
        }
    }

    /// Builder pattern: forwarded to the column resolver
    pub fn with_header_search_depth(mut self, depth: usize) -> Self {
        self.header_search_depth = depth;
        self
    }

    /// Extract state-level rows for one column of one sheet
    ///
    /// Output keeps sheet order. Every row has a geo_id and a finite value.
    pub fn extract(
        &self,
        source: &dyn SheetSource,
        sheet: &str,
        column_label: &str,
        year: i32,
    ) -> Result<Extraction> {
        let resolved = ColumnResolver::new(self.geography)
            .with_header_search_depth(self.header_search_depth)
            .resolve(source, sheet, column_label)?;

        let mut stats = ExtractionStats::default();
        let mut rows = Vec::new();

        for raw in &resolved.table.rows {
            stats.rows_scanned += 1;

            let name = raw.first().map(|s| s.trim()).unwrap_or("");
            let geo_id = match self.geography.resolve(name) {
                Some(id) => id,
                None => {
                    stats.skipped_non_geography += 1;
                    continue;
                }
            };

            if self.geography.is_aggregate(name) {
                stats.skipped_aggregate += 1;
                continue;
            }

            let cell = raw.get(resolved.column_index).map(|s| s.as_str());
            let value = match numeric::parse_cell(cell) {
                Some(v) => v,
                None => {
                    tracing::warn!(sheet, geo = name, cell = ?cell, "unparseable value, row dropped");
                    stats.dropped_malformed += 1;
                    continue;
                }
            };

            rows.push(CanonicalObservationRow {
                geo_name: name.to_string(),
                geo_id: geo_id.to_string(),
                geo_level: GeoLevel::State,
                year,
                value,
            });
        }

        tracing::info!(
            file = source.label(),
            sheet,
            column = %resolved.column,
            extracted = rows.len(),
            dropped = stats.dropped(),
            "sheet extracted"
        );

        Ok(Extraction {
            rows,
            column: resolved.column,
            header_row: resolved.table.header_row,
            stats,
        })
    }
}
