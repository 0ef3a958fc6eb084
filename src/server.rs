//! HTTP adapter for the cry classifier
//!
//! # Endpoints
//!
//! - `POST /v1/predict?species=dog&lang=ko` - Classify a raw audio body
//! - `GET /v1/labels?species=cat&state=화남` - Label set for a species, optionally
//!   validating one state name against it
//! - `GET /health` - Model contract and load

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use petcry_core::{ErrorKind, PipelineError, Prediction, PredictionMap, Species};
use petcry_neural::CryEngine;

/// Uploads above this size are refused before decoding.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub engine: CryEngine,
    /// Reject with 503 when the queue is full instead of waiting for a slot.
    pub shed_load: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictParams {
    pub species: Option<String>,
    /// `ko` renders cry states with their Korean names.
    pub lang: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub species: Option<Species>,
    pub state: Option<String>,
    pub duration_secs: f32,
    pub predictions: PredictionMap,
    pub elapsed_ms: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct LabelsParams {
    pub species: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LabelsResponse {
    pub species: Option<Species>,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub input_shape: [usize; 4],
    pub num_classes: usize,
    pub workers: usize,
    pub queue_depth: usize,
    pub in_flight: usize,
}

/// POST /v1/predict - Classify one recording
async fn predict(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PredictParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = request_id(&headers);
    let started = Instant::now();

    let result = if state.shed_load {
        state
            .engine
            .try_predict(body.to_vec(), params.species.clone())
            .await
    } else {
        state
            .engine
            .predict(body.to_vec(), params.species.clone())
            .await
    };

    match result {
        Ok(prediction) => {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            tracing::info!(
                request_id = %request_id,
                state = ?prediction.top_state,
                elapsed_ms,
                "predict ok"
            );
            let korean = params.lang.as_deref() == Some("ko");
            let payload = ApiResponse {
                data: render(prediction, korean, elapsed_ms),
            };
            json_response(StatusCode::OK, &request_id, &payload)
        }
        Err(err) => {
            tracing::warn!(request_id = %request_id, error = %err, "predict failed");
            pipeline_error_response(&request_id, &err)
        }
    }
}

fn render(prediction: Prediction, korean: bool, elapsed_ms: f64) -> PredictResponse {
    let predictions = if korean {
        prediction.predictions.localized()
    } else {
        prediction.predictions
    };
    PredictResponse {
        species: prediction.species,
        state: predictions.top().map(|(label, _)| label.to_string()),
        duration_secs: prediction.duration_secs,
        predictions,
        elapsed_ms,
    }
}

/// GET /v1/labels - Label set for a species tag
async fn labels(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LabelsParams>,
    headers: HeaderMap,
) -> Response {
    let request_id = request_id(&headers);
    let mapper = state.engine.pipeline().labels();

    let (species, set) = match mapper.resolve(params.species.as_deref()) {
        Ok(resolved) => resolved,
        Err(err) => return pipeline_error_response(&request_id, &err),
    };

    let checked = match params.state.as_deref() {
        Some(name) => match mapper.validate_state(species, name) {
            Ok(canonical) => Some(canonical),
            Err(err) => return pipeline_error_response(&request_id, &err),
        },
        None => None,
    };

    let payload = ApiResponse {
        data: LabelsResponse {
            species,
            labels: set.iter().map(str::to_string).collect(),
            state: checked,
        },
    };
    json_response(StatusCode::OK, &request_id, &payload)
}

/// GET /health - Model contract and load
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let classifier = state.engine.pipeline().classifier();
    let config = state.engine.config();
    let response = HealthResponse {
        status: "ok".to_string(),
        input_shape: classifier.input_shape(),
        num_classes: classifier.num_classes(),
        workers: config.workers,
        queue_depth: config.queue_depth,
        in_flight: state.engine.in_flight(),
    };
    (StatusCode::OK, Json(response))
}

/// Create the axum router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/predict", post(predict))
        .route("/v1/labels", get(labels))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the server
pub async fn serve(state: Arc<AppState>, addr: std::net::SocketAddr) -> std::io::Result<()> {
    let router = create_router(state);

    tracing::info!("Starting petcry server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// HTTP status and stable code for a request failure.
pub fn classify_pipeline_error(err: &PipelineError) -> StatusCode {
    match err.kind() {
        ErrorKind::Decode | ErrorKind::Shape | ErrorKind::InvalidSpecies => StatusCode::BAD_REQUEST,
        ErrorKind::ModelUnavailable if err.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn pipeline_error_response(request_id: &str, err: &PipelineError) -> Response {
    error_response(
        classify_pipeline_error(err),
        request_id,
        err.kind().as_str(),
        err.to_string(),
        None,
    )
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(new_request_id)
}

fn set_request_id(resp: &mut Response, request_id: &str) {
    if let Ok(hv) = HeaderValue::from_str(request_id) {
        resp.headers_mut().insert("x-request-id", hv);
    }
}

fn json_response<T: serde::Serialize>(
    status: StatusCode,
    request_id: &str,
    payload: &T,
) -> Response {
    let mut resp = (status, Json(payload)).into_response();
    set_request_id(&mut resp, request_id);
    resp
}

fn error_response(
    status: StatusCode,
    request_id: &str,
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
) -> Response {
    let payload = ErrorBody {
        code,
        message,
        details,
    };
    json_response(status, request_id, &payload)
}

fn new_request_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "req_{}_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
        hex::encode(bytes)
    )
}
