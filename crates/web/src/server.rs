//! HTTP API server
//!
//! Thin axum surface over the orchestrator. Handlers translate between
//! wire payloads and engine calls; all domain decisions live in the
//! engine. Error-to-status mapping is centralized in `ApiError`.

use crate::config::ServerConfig;
use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reelcheck_common::{
    ClassId, DetectionResult, Error, NextStep, ParagraphResult, RunSnapshot, ScriptPlan,
    StepRecord, TestKind, TextSearchResult,
};
use reelcheck_common::registry::SubCase;
use reelcheck_engine::{Orchestrator, StartOutcome, StepOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Wire wrapper mapping engine errors to HTTP statuses.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::UnknownRun(_) => StatusCode::NOT_FOUND,
            Error::DetectionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::Adapter(_) => StatusCode::BAD_GATEWAY,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({ "detail": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub test_type: String,
    pub game_url: String,
    #[serde(default)]
    pub sub_case: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub run_id: String,
    pub test_type: String,
    pub next_step: NextStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_plan: Option<ScriptPlan>,
}

#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub run_id: String,
    pub class_id: ClassId,
    pub screenshot: String,
    #[serde(default)]
    pub client_action_result: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub status: String,
    pub step_result: StepRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<NextStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_result: Option<RunSnapshot>,
}

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub screenshot: String,
    pub class_ids: Vec<ClassId>,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub detections: Vec<DetectionResult>,
}

#[derive(Debug, Deserialize)]
pub struct FindTextRequest {
    pub screenshot: String,
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ParagraphRequest {
    pub screenshot: String,
}

#[derive(Debug, Serialize)]
pub struct TestTypeInfo {
    pub name: String,
    pub kind: TestKind,
    pub flow: Vec<ClassId>,
    pub description: String,
    pub sub_cases: Vec<SubCase>,
}

#[derive(Debug, Serialize)]
pub struct TestTypesResponse {
    pub test_types: Vec<TestTypeInfo>,
}

/// Build the application router.
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/test-types", get(list_test_types))
        .route("/api/test/start", post(start_test))
        .route("/api/test/step", post(step_test))
        .route("/api/test/results/:run_id", get(test_results))
        .route("/api/detect", post(detect))
        .route("/api/text/find", post(find_text))
        .route("/api/text/paragraph", post(extract_paragraph))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    if allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "reelcheck",
        "version": reelcheck_common::VERSION,
        "status": "ok",
    }))
}

async fn list_test_types(State(state): State<AppState>) -> Json<TestTypesResponse> {
    let mut test_types: Vec<TestTypeInfo> = state
        .orchestrator
        .registry()
        .definitions()
        .map(|def| TestTypeInfo {
            name: def.name.clone(),
            kind: def.kind,
            flow: def.flow.clone(),
            description: def.description.clone(),
            sub_cases: def.sub_cases.clone(),
        })
        .collect();
    test_types.sort_by(|a, b| a.name.cmp(&b.name));
    Json(TestTypesResponse { test_types })
}

async fn start_test(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let outcome = state
        .orchestrator
        .start(&req.test_type, &req.game_url, req.sub_case.as_deref())?;
    let resp = match outcome {
        StartOutcome::Stepwise { run_id, next_step } => StartResponse {
            run_id,
            test_type: req.test_type,
            next_step,
            script_plan: None,
        },
        StartOutcome::Scripted {
            run_id,
            next_step,
            plan,
        } => StartResponse {
            run_id,
            test_type: req.test_type,
            next_step,
            script_plan: Some(plan),
        },
    };
    Ok(Json(resp))
}

async fn step_test(
    State(state): State<AppState>,
    Json(req): Json<StepRequest>,
) -> Result<Json<StepResponse>, ApiError> {
    let action_result = req.client_action_result.unwrap_or(serde_json::Value::Null);
    let outcome = state
        .orchestrator
        .step(&req.run_id, req.class_id, &req.screenshot, action_result)
        .await?;
    let resp = match outcome {
        StepOutcome::Continue { step, next_step } => StepResponse {
            status: "continue".to_string(),
            step_result: step,
            next_step: Some(next_step),
            final_result: None,
        },
        StepOutcome::Complete { step, final_result } => StepResponse {
            status: "complete".to_string(),
            step_result: step,
            next_step: None,
            final_result: Some(final_result),
        },
    };
    Ok(Json(resp))
}

async fn test_results(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSnapshot>, ApiError> {
    Ok(Json(state.orchestrator.results(&run_id).await?))
}

async fn detect(
    State(state): State<AppState>,
    Json(req): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    let detections = state
        .orchestrator
        .detect_elements(&req.screenshot, &req.class_ids)
        .await?;
    Ok(Json(DetectResponse { detections }))
}

async fn find_text(
    State(state): State<AppState>,
    Json(req): Json<FindTextRequest>,
) -> Result<Json<TextSearchResult>, ApiError> {
    Ok(Json(
        state
            .orchestrator
            .find_text(&req.screenshot, &req.query)
            .await?,
    ))
}

async fn extract_paragraph(
    State(state): State<AppState>,
    Json(req): Json<ParagraphRequest>,
) -> Result<Json<ParagraphResult>, ApiError> {
    Ok(Json(state.orchestrator.extract_paragraph(&req.screenshot).await?))
}

/// Bind and serve until shutdown.
pub async fn serve(config: ServerConfig, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let state = AppState { orchestrator };
    let app = router(state, &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("Reelcheck API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
