//! HTTP API for predictions, chat, health checks, and Prometheus metrics

use advisor_lib::health::{self, Collaborators, ComponentStatus};
use advisor_lib::models::{ChatRequest, CropRequest, ImageUpload, Language};
use advisor_lib::{AdvisoryService, ServiceError, ServiceMetrics};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
pub struct AppState {
    pub service: Arc<AdvisoryService>,
    pub collaborators: Collaborators,
    pub metrics: ServiceMetrics,
}

impl AppState {
    pub fn new(service: Arc<AdvisoryService>, collaborators: Collaborators) -> Self {
        Self {
            service,
            collaborators,
            metrics: ServiceMetrics::new(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    detail: String,
}

/// Map a pipeline error onto the wire: 503 for missing models, 400 for bad
/// input or low confidence, generic 500 otherwise. Internal detail never
/// reaches the client.
fn error_response(state: &AppState, endpoint: &str, err: ServiceError) -> Response {
    let (status, detail, outcome) = match &err {
        ServiceError::ModelUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string(), "model_unavailable")
        }
        ServiceError::InvalidInput(_) => (StatusCode::BAD_REQUEST, err.to_string(), "invalid_input"),
        ServiceError::LowConfidence(_) => {
            (StatusCode::BAD_REQUEST, err.to_string(), "low_confidence")
        }
        ServiceError::Internal(e) => {
            error!(endpoint, error = %format!("{e:#}"), "Unhandled error processing request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unable to process the request. Please try again later.".to_string(),
                "error",
            )
        }
    };

    state.metrics.inc_request(endpoint, outcome);
    (
        status,
        Json(ErrorBody {
            success: false,
            detail,
        }),
    )
        .into_response()
}

fn success_response<T: Serialize>(state: &AppState, endpoint: &str, body: T) -> Response {
    state.metrics.inc_request(endpoint, "success");
    Json(body).into_response()
}

async fn recommend_crop(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CropRequest>,
) -> Response {
    match state.service.recommend_crop(request).await {
        Ok(body) => success_response(&state, "recommend_crop", body),
        Err(err) => error_response(&state, "recommend_crop", err),
    }
}

async fn detect_disease(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<ImageUpload> = None;
    let mut user_id: Option<String> = None;
    let mut language = Language::English;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name() {
                Some("file") => {
                    let content_type = field.content_type().map(str::to_string);
                    match field.bytes().await {
                        Ok(bytes) => {
                            upload = Some(ImageUpload {
                                bytes: bytes.to_vec(),
                                content_type,
                            });
                        }
                        Err(_) => {
                            return error_response(
                                &state,
                                "detect_disease",
                                ServiceError::invalid_input("Could not read the uploaded file"),
                            );
                        }
                    }
                }
                Some("user_id") => {
                    user_id = field.text().await.ok().filter(|s| !s.is_empty());
                }
                Some("language") => {
                    if let Ok(code) = field.text().await {
                        language = Language::from_code(&code);
                    }
                }
                _ => {}
            },
            Ok(None) => break,
            Err(_) => {
                return error_response(
                    &state,
                    "detect_disease",
                    ServiceError::invalid_input("Malformed multipart request"),
                );
            }
        }
    }

    let Some(upload) = upload else {
        return error_response(
            &state,
            "detect_disease",
            ServiceError::invalid_input("Missing file field 'file'"),
        );
    };

    match state.service.detect_disease(upload, user_id, language).await {
        Ok(body) => success_response(&state, "detect_disease", body),
        Err(err) => error_response(&state, "detect_disease", err),
    }
}

async fn chat(State(state): State<Arc<AppState>>, Json(request): Json<ChatRequest>) -> Response {
    match state.service.chat(request).await {
        Ok(body) => success_response(&state, "chat", body),
        Err(err) => error_response(&state, "chat", err),
    }
}

/// Health check - 200 while at least one model serves, 503 when both failed
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = health::health_of(state.service.registry(), state.collaborators);

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = health::readiness_of(state.service.registry());

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/recommend_crop", post(recommend_crop))
        .route("/detect_disease", post(detect_disease))
        .route("/chat", post(chat))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
