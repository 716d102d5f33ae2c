// Indicator Hub - CLI
// Import spreadsheet columns as indicators, correlate them, dump scatter data.
// Results go to stdout as JSON, logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicator_hub::config::DATABASE_ENV;
use indicator_hub::mock::DEFAULT_SEED;
use indicator_hub::{
    correlate, import_indicator, inspect_workbook, load_mock_data, logging, open_database,
    scatter_plot, write_pairs_csv, AppConfig, CsvSheet, GeoLevel, ImportRequest, SheetSource,
    Workbook,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indicator-hub")]
#[command(about = "Regional indicator ingestion and correlation")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to ./indicator-hub.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overrides the config file
    #[arg(long, global = true, env = DATABASE_ENV)]
    db: Option<PathBuf>,

    /// Debug logging for the crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one column of a spreadsheet (xlsx/xls/ods or csv) as an indicator
    Import {
        path: PathBuf,
        #[arg(long, default_value = "Tabela 1")]
        sheet: String,
        #[arg(long, default_value = "Total")]
        column: String,
        /// Defaults to the configured year
        #[arg(long)]
        year: Option<i32>,
        #[arg(long = "code", default_value = "IBGE_CENSO_PCD_PERCENT_TOTAL")]
        indicator_code: String,
        #[arg(long = "name", default_value = "Percentual de pessoas com deficiência (Total)")]
        indicator_name: String,
        #[arg(long, default_value = "%")]
        unit: String,
        /// Field delimiter for .csv inputs
        #[arg(long, default_value_t = ';')]
        delimiter: char,
    },
    /// List sheets, optionally previewing the first row of one
    Inspect {
        path: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long, default_value_t = ';')]
        delimiter: char,
    },
    /// Load the seeded MOCK_A / MOCK_B series
    Mock {
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
    /// Pearson r between two stored indicators
    Correlate {
        a: String,
        b: String,
        #[arg(long)]
        year: Option<i32>,
        /// "uf" or "mun"
        #[arg(long, value_parser = parse_level)]
        level: Option<GeoLevel>,
        /// Also write the aligned pairs here as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Scatter data (points, axis labels, title) for two indicators
    Scatter {
        a: String,
        b: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, value_parser = parse_level)]
        level: Option<GeoLevel>,
        #[arg(long)]
        x_label: Option<String>,
        #[arg(long)]
        y_label: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    match cli.command {
        Commands::Import {
            path,
            sheet,
            column,
            year,
            indicator_code,
            indicator_name,
            unit,
            delimiter,
        } => {
            let source = open_sheet_source(&path, delimiter)?;
            let request = ImportRequest {
                sheet,
                column,
                year: year.unwrap_or(config.default_year),
                indicator_code,
                indicator_name,
                unit,
            };

            let mut conn = open_database(&config.database_path)
                .with_context(|| format!("failed to open database {}", config.database_path.display()))?;
            let report = import_indicator(&mut conn, source.as_ref(), &request, &config)
                .with_context(|| format!("import of {} failed", path.display()))?;
            print_json(&report)
        }
        Commands::Inspect { path, sheet, delimiter } => {
            let source = open_sheet_source(&path, delimiter)?;
            let inspection = inspect_workbook(source.as_ref(), sheet.as_deref())?;
            print_json(&inspection)
        }
        Commands::Mock { seed } => {
            let mut conn = open_database(&config.database_path)?;
            let report = load_mock_data(&mut conn, seed).context("mock load failed")?;
            print_json(&report)
        }
        Commands::Correlate { a, b, year, level, csv } => {
            let conn = open_database(&config.database_path)?;
            let result = correlate(
                &conn,
                &a,
                &b,
                year.unwrap_or(config.default_year),
                level.unwrap_or(config.default_level),
            )
            .with_context(|| format!("correlation {} x {} failed", a, b))?;

            if let Some(csv_path) = csv {
                let file = std::fs::File::create(&csv_path)
                    .with_context(|| format!("failed to create {}", csv_path.display()))?;
                write_pairs_csv(file, &result)?;
                tracing::info!(path = %csv_path.display(), pairs = result.pairs.len(), "pairs written");
            }
            print_json(&result)
        }
        Commands::Scatter {
            a,
            b,
            year,
            level,
            x_label,
            y_label,
        } => {
            let conn = open_database(&config.database_path)?;
            let plot = scatter_plot(
                &conn,
                &a,
                &b,
                year.unwrap_or(config.default_year),
                level.unwrap_or(config.default_level),
                x_label.as_deref(),
                y_label.as_deref(),
            )?;
            print_json(&plot)
        }
    }
}

fn parse_level(raw: &str) -> std::result::Result<GeoLevel, String> {
    raw.parse::<GeoLevel>().map_err(|e| e.to_string())
}

/// CSV by extension, everything else goes through the workbook reader
fn open_sheet_source(path: &Path, delimiter: char) -> Result<Box<dyn SheetSource>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        let delimiter = u8::try_from(delimiter).context("CSV delimiter must be a single-byte character")?;
        Ok(Box::new(CsvSheet::open(path, delimiter)?))
    } else {
        Ok(Box::new(Workbook::open(path)?))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
