// Indicator Hub - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod catalog;
pub mod config;
pub mod correlation;
pub mod db;
pub mod error;
pub mod extractor;
pub mod geography;
pub mod import;
pub mod logging;
pub mod mock;
pub mod numeric;
pub mod observations;
pub mod resolver;
pub mod sheet;

// Re-export commonly used types
pub use catalog::{
    get_or_create_indicator, get_or_create_source, find_indicator, list_indicators,
    require_indicator, Indicator, Source,
};
pub use config::{AppConfig, SourceConfig};
pub use correlation::{
    correlate, scatter_plot, write_pairs_csv, AlignedPair, CorrelationResult,
    ScatterPlot, ScatterPoint, MIN_ALIGNED_SAMPLE,
};
pub use db::{open_database, open_in_memory, setup_database, get_import_runs, ImportRun};
pub use error::{IndicatorError, Result};
pub use extractor::{CanonicalObservationRow, Extraction, ExtractionStats, ObservationExtractor};
pub use geography::{GeoLevel, GeographyTable};
pub use import::{import_indicator, inspect_workbook, ImportReport, ImportRequest, WorkbookInspection};
pub use mock::{load_mock_data, MockLoadReport};
pub use observations::{upsert_observations, Observation, ObservationInput};
pub use resolver::{ColumnResolver, ResolvedColumn};
pub use sheet::{CsvSheet, Grid, MemorySheets, NamedTable, SheetSource, Workbook};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
