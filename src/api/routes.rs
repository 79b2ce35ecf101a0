use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ledger::{CumulativePoint, StoreError, SummaryMetrics};
use crate::models::{IdentityError, UserIdentity, WagerRecord};
use crate::report::{format_record, format_units};
use crate::tracker::{SlipError, SlipTracker};
use crate::vision::SlipImage;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub tracker: SlipTracker,
    pub default_unit_size: f64,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/users", get(list_users).post(add_user))
        .route("/api/users/:user/ledger", get(get_ledger))
        .route("/api/users/:user/summary", get(get_summary))
        .route("/api/users/:user/series", get(get_series))
        .route("/api/users/:user/slips", post(analyze_slips))
        .route("/api/users/:user/records", post(record_reply))
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_users(State(state): State<AppState>) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.tracker.store().list_users()?;
    Ok(Json(UsersResponse { users }))
}

async fn add_user(
    State(state): State<AppState>,
    Json(req): Json<AddUserRequest>,
) -> Result<(StatusCode, Json<UserIdentity>), ApiError> {
    let user = state.tracker.store().add_user(&req.name)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_ledger(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let user = UserIdentity::new(&user)?;
    let records = state.tracker.store().read(&user)?;
    Ok(Json(LedgerResponse {
        count: records.len(),
        records,
    }))
}

async fn get_summary(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(params): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let user = UserIdentity::new(&user)?;
    let unit_size = params.unit_size.unwrap_or(state.default_unit_size);
    let view = state.tracker.view(&user, unit_size)?;

    Ok(Json(SummaryResponse {
        user,
        units_change: view.metrics.units_change().ok(),
        units_display: format_units(&view.metrics),
        record: format_record(&view.metrics),
        loss_count: view.metrics.loss_count(),
        win_rate: view.metrics.win_rate(),
        metrics: view.metrics,
    }))
}

async fn get_series(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let user = UserIdentity::new(&user)?;
    let view = state.tracker.view(&user, state.default_unit_size)?;
    Ok(Json(SeriesResponse {
        points: view.series,
    }))
}

async fn analyze_slips(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let user = UserIdentity::new(&user)?;
    if req.images.is_empty() {
        return Err(ApiError::BadRequest("no images submitted".to_string()));
    }

    let mut images = Vec::with_capacity(req.images.len());
    for (i, upload) in req.images.into_iter().enumerate() {
        let bytes = STANDARD
            .decode(upload.data_base64.trim())
            .map_err(|e| ApiError::BadRequest(format!("image {}: invalid base64: {}", i, e)))?;
        let name = upload.name.unwrap_or_else(|| format!("slip-{}", i + 1));
        let mime = upload.mime_type.unwrap_or_else(|| "image/jpeg".to_string());
        images.push(SlipImage::new(name, mime, bytes));
    }

    let report = state.tracker.process_batch(&user, &images).await;
    Ok(Json(AnalyzeResponse {
        recorded_rows: report.recorded_rows(),
        failed: report.failed(),
        slips: report
            .outcomes
            .into_iter()
            .map(|o| SlipResult::from_outcome(o.slip, o.result))
            .collect(),
    }))
}

async fn record_reply(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(req): Json<RecordRequest>,
) -> Result<Json<SlipResult>, ApiError> {
    let user = UserIdentity::new(&user)?;
    match state.tracker.record_reply(&user, req.text) {
        Ok(recorded) => Ok(Json(SlipResult::from_outcome(
            "text".to_string(),
            Ok(recorded),
        ))),
        Err(SlipError::Parse(e)) => Err(ApiError::BadRequest(e.to_string())),
        Err(SlipError::Store(e)) => Err(e.into()),
        Err(SlipError::Extraction(e)) => Err(ApiError::Internal(e.to_string())),
    }
}

// ===== Request/Response Types =====

#[derive(Deserialize)]
struct AddUserRequest {
    name: String,
}

#[derive(Deserialize)]
struct SummaryQuery {
    unit_size: Option<f64>,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    images: Vec<ImageUpload>,
}

#[derive(Deserialize)]
struct ImageUpload {
    name: Option<String>,
    mime_type: Option<String>,
    data_base64: String,
}

#[derive(Deserialize)]
struct RecordRequest {
    text: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct UsersResponse {
    users: Vec<UserIdentity>,
}

#[derive(Serialize)]
struct LedgerResponse {
    count: usize,
    records: Vec<WagerRecord>,
}

#[derive(Serialize)]
struct SummaryResponse {
    user: UserIdentity,
    metrics: SummaryMetrics,
    units_change: Option<f64>,
    units_display: String,
    record: String,
    loss_count: u64,
    win_rate: f64,
}

#[derive(Serialize)]
struct SeriesResponse {
    points: Vec<CumulativePoint>,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    recorded_rows: usize,
    failed: usize,
    slips: Vec<SlipResult>,
}

#[derive(Serialize)]
struct SlipResult {
    slip: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
    records: Vec<WagerRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SlipResult {
    fn from_outcome(
        slip: String,
        result: Result<crate::tracker::RecordedSlip, SlipError>,
    ) -> Self {
        match result {
            Ok(recorded) => Self {
                slip,
                ok: true,
                reply: Some(recorded.reply),
                records: recorded.records,
                error: None,
            },
            Err(e) => Self {
                slip,
                ok: false,
                reply: None,
                records: Vec::new(),
                error: Some(format!("could not process this slip: {}", e)),
            },
        }
    }
}

// ===== Error Handling =====

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUser(_) => ApiError::Conflict(err.to_string()),
            StoreError::ReservedName | StoreError::InvalidName => {
                ApiError::BadRequest(err.to_string())
            }
            StoreError::Unavailable(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                tracing::error!("Store error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedgerStore;
    use crate::vision::SlipExtractor;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

    struct BytesAsReplyExtractor;

    #[async_trait]
    impl SlipExtractor for BytesAsReplyExtractor {
        async fn extract(&self, image: &SlipImage) -> anyhow::Result<String> {
            // The image bytes carry the reply text.
            Ok(String::from_utf8(image.bytes.clone())?)
        }
    }

    async fn spawn_app() -> String {
        let state = AppState {
            tracker: SlipTracker::new(
                Arc::new(MemoryLedgerStore::new()),
                Arc::new(BytesAsReplyExtractor),
            ),
            default_unit_size: 5.0,
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            ApiError::from(StoreError::DuplicateUser("a".into())),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(StoreError::ReservedName),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(StoreError::Unavailable("disk".into())),
            ApiError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn test_users_endpoints() {
        let base = spawn_app().await;
        let http = reqwest::Client::new();

        let resp = http
            .post(format!("{}/api/users", base))
            .json(&json!({ "name": "Nikh" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

        let resp = http
            .post(format!("{}/api/users", base))
            .json(&json!({ "name": "Nikh" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CONFLICT);

        let resp = http
            .post(format!("{}/api/users", base))
            .json(&json!({ "name": "New User" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        let body: Value = http
            .get(format!("{}/api/users", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["users"], json!(["Nikh"]));
    }

    #[tokio::test]
    async fn test_slips_then_summary() {
        let base = spawn_app().await;
        let http = reqwest::Client::new();

        let good = STANDARD.encode("Amount Wagered | Amount Won\n---|---\n$100 | $150\n$50 | $0");
        let bad = STANDARD.encode("Amount Wagered | Amount Won\n---|---\n$1 | $2 | $3");
        let body: Value = http
            .post(format!("{}/api/users/Nikh/slips", base))
            .json(&json!({ "images": [
                { "name": "bad.jpg", "data_base64": bad },
                { "name": "good.jpg", "data_base64": good },
            ]}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["failed"], 1);
        assert_eq!(body["recorded_rows"], 2);
        assert_eq!(body["slips"][0]["ok"], false);
        assert_eq!(body["slips"][1]["ok"], true);

        let summary: Value = http
            .get(format!("{}/api/users/Nikh/summary?unit_size=0", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(summary["metrics"]["total_wagered"], 150.0);
        assert_eq!(summary["metrics"]["win_count"], 1);
        assert_eq!(summary["record"], "1-2");
        assert_eq!(summary["loss_count"], 1);
        assert_eq!(summary["win_rate"], 0.5);
        assert_eq!(summary["units_change"], Value::Null);
        assert_eq!(summary["units_display"], "0 u");
    }

    #[tokio::test]
    async fn test_unknown_user_reads_empty_ledger() {
        let base = spawn_app().await;
        let resp = reqwest::get(format!("{}/api/users/ghost/ledger", base))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["count"], 0);
        assert_eq!(body["records"], json!([]));
    }
}
