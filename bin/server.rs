// Indicator Hub - Web Server
// JSON API over the catalog, importer and correlation engine (axum)

use anyhow::Context;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use indicator_hub::mock::DEFAULT_SEED;
use indicator_hub::{
    correlate, import_indicator, inspect_workbook, load_mock_data, logging, open_database,
    scatter_plot, AppConfig, CorrelationResult, GeoLevel, ImportReport, ImportRequest,
    IndicatorError, MockLoadReport, ScatterPlot, WorkbookInspection, Workbook,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;

/// Uploaded workbooks above this are rejected by axum
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: Arc<AppConfig>,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::internal("database lock poisoned".to_string()))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn internal(detail: String) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail,
        }
    }

    fn bad_request(detail: String) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            detail,
        }
    }
}

impl From<IndicatorError> for ApiError {
    fn from(err: IndicatorError) -> Self {
        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else if err.is_bad_request() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "request failed");
        }
        ApiError {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::bad_request(format!("invalid multipart body: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run spreadsheet decoding and SQLite work off the async workers
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal(format!("worker task failed: {}", e)))?
}

// ============================================================================
// Query types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MockQuery {
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CorrelationQuery {
    #[serde(rename = "indA", alias = "a")]
    ind_a: String,
    #[serde(rename = "indB", alias = "b")]
    ind_b: String,
    year: Option<i32>,
    level: Option<GeoLevel>,
}

#[derive(Debug, Deserialize)]
struct ScatterQuery {
    #[serde(rename = "indA", alias = "a")]
    ind_a: String,
    #[serde(rename = "indB", alias = "b")]
    ind_b: String,
    year: Option<i32>,
    level: Option<GeoLevel>,
    #[serde(rename = "xlabel", alias = "x_label")]
    x_label: Option<String>,
    #[serde(rename = "ylabel", alias = "y_label")]
    y_label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PathQuery {
    path: PathBuf,
    sheet: Option<String>,
}

/// Import options from the query string; anything left out falls back to
/// the census defaults
#[derive(Debug, Deserialize)]
struct ImportOptions {
    sheet: Option<String>,
    column: Option<String>,
    year: Option<i32>,
    indicator_code: Option<String>,
    indicator_name: Option<String>,
    unit: Option<String>,
}

impl ImportOptions {
    fn into_request(self, config: &AppConfig) -> ImportRequest {
        let defaults = ImportRequest {
            year: config.default_year,
            ..ImportRequest::default()
        };
        ImportRequest {
            sheet: self.sheet.unwrap_or(defaults.sheet),
            column: self.column.unwrap_or(defaults.column),
            year: self.year.unwrap_or(defaults.year),
            indicator_code: self.indicator_code.unwrap_or(defaults.indicator_code),
            indicator_name: self.indicator_name.unwrap_or(defaults.indicator_name),
            unit: self.unit.unwrap_or(defaults.unit),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "version": indicator_hub::VERSION }))
}

/// POST /data/mock/load
async fn mock_load(State(state): State<AppState>, Query(q): Query<MockQuery>) -> ApiResult<MockLoadReport> {
    let report = blocking(move || {
        let mut conn = state.conn()?;
        Ok(load_mock_data(&mut conn, q.seed.unwrap_or(DEFAULT_SEED))?)
    })
    .await?;
    Ok(Json(report))
}

/// GET /data/correlation?indA=..&indB=..
async fn correlation(
    State(state): State<AppState>,
    Query(q): Query<CorrelationQuery>,
) -> ApiResult<CorrelationResult> {
    let conn = state.conn()?;
    let result = correlate(
        &conn,
        &q.ind_a,
        &q.ind_b,
        q.year.unwrap_or(state.config.default_year),
        q.level.unwrap_or(state.config.default_level),
    )?;
    Ok(Json(result))
}

/// GET /data/ibge/inspect?path=..
async fn inspect(Query(q): Query<PathQuery>) -> ApiResult<WorkbookInspection> {
    let inspection = blocking(move || {
        let workbook = Workbook::open(&q.path)?;
        Ok(inspect_workbook(&workbook, q.sheet.as_deref())?)
    })
    .await?;
    Ok(Json(inspection))
}

/// POST /data/ibge/import-xlsx/by-path?path=..&sheet=..&column=..
async fn import_by_path(
    State(state): State<AppState>,
    Query(target): Query<PathQuery>,
    Query(options): Query<ImportOptions>,
) -> ApiResult<ImportReport> {
    let request = options.into_request(&state.config);
    let report = blocking(move || {
        let workbook = Workbook::open(&target.path)?;
        let mut conn = state.conn()?;
        Ok(import_indicator(&mut conn, &workbook, &request, &state.config)?)
    })
    .await?;
    Ok(Json(report))
}

/// POST /data/ibge/import-xlsx/upload?sheet=..  - multipart, workbook in the `file` part
async fn import_upload(
    State(state): State<AppState>,
    Query(options): Query<ImportOptions>,
    mut multipart: Multipart,
) -> ApiResult<ImportReport> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }
    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::bad_request("missing multipart field 'file'".to_string()))?;

    let request = options.into_request(&state.config);
    let report = blocking(move || {
        let workbook = Workbook::from_upload(&filename, bytes)?;
        let mut conn = state.conn()?;
        Ok(import_indicator(&mut conn, &workbook, &request, &state.config)?)
    })
    .await?;
    Ok(Json(report))
}

/// GET /data/plot/scatter?indA=..&indB=..
async fn scatter(State(state): State<AppState>, Query(q): Query<ScatterQuery>) -> ApiResult<ScatterPlot> {
    let conn = state.conn()?;
    let plot = scatter_plot(
        &conn,
        &q.ind_a,
        &q.ind_b,
        q.year.unwrap_or(state.config.default_year),
        q.level.unwrap_or(state.config.default_level),
        q.x_label.as_deref(),
        q.y_label.as_deref(),
    )?;
    Ok(Json(plot))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging(false);

    let config = AppConfig::load(None).context("failed to load configuration")?;
    let conn = open_database(&config.database_path)
        .with_context(|| format!("failed to open database {}", config.database_path.display()))?;
    tracing::info!(db = %config.database_path.display(), "database opened");

    let addr = config.server_addr.clone();
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config: Arc::new(config),
    };

    let data_routes = Router::new()
        .route("/mock/load", post(mock_load))
        .route("/correlation", get(correlation))
        .route("/ibge/inspect", get(inspect))
        .route("/ibge/import-xlsx/by-path", post(import_by_path))
        .route(
            "/ibge/import-xlsx/upload",
            post(import_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/plot/scatter", get(scatter))
        .with_state(state);

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/data", data_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "🚀 server listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    fn query<T: serde::de::DeserializeOwned>(uri: &str) -> T {
        let uri: Uri = uri.parse().unwrap();
        Query::<T>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_correlation_query_takes_ind_names() {
        let q: CorrelationQuery = query("/data/correlation?indA=MOCK_A&indB=MOCK_B&year=2010&level=mun");
        assert_eq!(q.ind_a, "MOCK_A");
        assert_eq!(q.ind_b, "MOCK_B");
        assert_eq!(q.year, Some(2010));
        assert_eq!(q.level, Some(GeoLevel::Municipality));

        let q: CorrelationQuery = query("/data/correlation?a=X&b=Y");
        assert_eq!((q.ind_a.as_str(), q.ind_b.as_str()), ("X", "Y"));
        assert_eq!(q.year, None);
    }

    #[test]
    fn test_scatter_query_labels() {
        let q: ScatterQuery = query("/data/plot/scatter?indA=A&indB=B&xlabel=Renda&ylabel=TEA");
        assert_eq!(q.x_label.as_deref(), Some("Renda"));
        assert_eq!(q.y_label.as_deref(), Some("TEA"));
    }

    #[test]
    fn test_by_path_query_fills_defaults() {
        let uri = "/data/ibge/import-xlsx/by-path?path=data%2Fcenso.xlsx&column=Homens&year=2010";
        let target: PathQuery = query(uri);
        let options: ImportOptions = query(uri);

        assert_eq!(target.path, PathBuf::from("data/censo.xlsx"));
        let request = options.into_request(&AppConfig::default());
        assert_eq!(request.column, "Homens");
        assert_eq!(request.year, 2010);
        assert_eq!(request.sheet, "Tabela 1");
        assert_eq!(request.indicator_code, "IBGE_CENSO_PCD_PERCENT_TOTAL");
    }

    #[test]
    fn test_error_status_mapping() {
        let err = ApiError::from(IndicatorError::IndicatorNotFound("X".to_string()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = ApiError::from(IndicatorError::InsufficientSample { count: 2 });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blocking_runs_work_and_propagates_errors() {
        let value = blocking(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);

        let err = blocking(|| -> Result<(), ApiError> {
            Err(IndicatorError::FileNotFound("x.xlsx".to_string()).into())
        })
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
