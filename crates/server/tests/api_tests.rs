//! Integration tests for the API endpoints
//!
//! The router is rebuilt here from advisor-lib parts with both model slots
//! unavailable: everything except actual inference is exercised end to end.

use advisor_lib::advice::RuleBasedComposer;
use advisor_lib::health::{self, Collaborators, ComponentStatus};
use advisor_lib::history::HistoryStore;
use advisor_lib::models::{ChatRequest, CropRequest, ImageUpload, Language};
use advisor_lib::pipeline::DEFAULT_CONFIDENCE_FLOOR;
use advisor_lib::registry::{CropPredict, ModelSlot, NUM_FEATURES};
use advisor_lib::{AdvisoryService, ModelRegistry, ServiceError, ServiceMetrics};
use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tower::ServiceExt;

struct AppState {
    service: Arc<AdvisoryService>,
    collaborators: Collaborators,
    metrics: ServiceMetrics,
}

fn error_response(state: &AppState, endpoint: &str, err: ServiceError) -> Response {
    let (status, detail, outcome) = match &err {
        ServiceError::ModelUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string(), "model_unavailable")
        }
        ServiceError::InvalidInput(_) => (StatusCode::BAD_REQUEST, err.to_string(), "invalid_input"),
        ServiceError::LowConfidence(_) => {
            (StatusCode::BAD_REQUEST, err.to_string(), "low_confidence")
        }
        ServiceError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unable to process the request. Please try again later.".to_string(),
            "error",
        ),
    };
    state.metrics.inc_request(endpoint, outcome);
    (
        status,
        Json(serde_json::json!({ "success": false, "detail": detail })),
    )
        .into_response()
}

async fn recommend_crop(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CropRequest>,
) -> Response {
    match state.service.recommend_crop(request).await {
        Ok(body) => Json(body).into_response(),
        Err(err) => error_response(&state, "recommend_crop", err),
    }
}

async fn detect_disease(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut upload: Option<ImageUpload> = None;
    let mut user_id: Option<String> = None;
    let mut language = Language::English;

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("file") => {
                let content_type = field.content_type().map(str::to_string);
                if let Ok(bytes) = field.bytes().await {
                    upload = Some(ImageUpload {
                        bytes: bytes.to_vec(),
                        content_type,
                    });
                }
            }
            Some("user_id") => user_id = field.text().await.ok().filter(|s| !s.is_empty()),
            Some("language") => {
                if let Ok(code) = field.text().await {
                    language = Language::from_code(&code);
                }
            }
            _ => {}
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
        Ok(body) => Json(body).into_response(),
        Err(err) => error_response(&state, "detect_disease", err),
    }
}

async fn chat(State(state): State<Arc<AppState>>, Json(request): Json<ChatRequest>) -> Response {
    match state.service.chat(request).await {
        Ok(body) => Json(body).into_response(),
        Err(err) => error_response(&state, "chat", err),
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = health::health_of(state.service.registry(), state.collaborators);
    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
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

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer).unwrap();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

fn app_with_registry(registry: ModelRegistry) -> Router {
    let service = Arc::new(AdvisoryService::new(
        Arc::new(registry),
        Arc::new(RuleBasedComposer),
        None,
        Arc::new(HistoryStore::disabled()),
        DEFAULT_CONFIDENCE_FLOOR,
    ));
    let state = Arc::new(AppState {
        service,
        collaborators: Collaborators::default(),
        metrics: ServiceMetrics::new(),
    });

    Router::new()
        .route("/recommend_crop", post(recommend_crop))
        .route("/detect_disease", post(detect_disease))
        .route("/chat", post(chat))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

fn setup_test_app() -> Router {
    app_with_registry(ModelRegistry::unavailable("artifacts not present in tests"))
}

/// Recommender keyed on one exact feature vector.
struct TableCrop;

impl CropPredict for TableCrop {
    fn predict(&self, features: &[f32; NUM_FEATURES]) -> anyhow::Result<(String, f32)> {
        if features == &[90.0, 40.0, 40.0, 25.0, 80.0, 6.5, 200.0] {
            Ok(("rice".to_string(), 0.92))
        } else {
            Ok(("maize".to_string(), 0.41))
        }
    }
}

fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_upload(content_type: &str, payload: &[u8]) -> Request<Body> {
    let boundary = "agrimind-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"leaf\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/detect_disease")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn valid_crop_body() -> serde_json::Value {
    serde_json::json!({
        "N": 90, "P": 40, "K": 40,
        "temperature": 25, "humidity": 80, "ph": 6.5, "rainfall": 200,
        "user_id": "farmer-1", "language": "en"
    })
}

#[tokio::test]
async fn test_recommend_crop_success_with_loaded_model() {
    let app = app_with_registry(ModelRegistry::from_slots(
        ModelSlot::Loaded(Box::new(TableCrop)),
        ModelSlot::Unavailable {
            reason: "not needed here".to_string(),
        },
    ));

    let response = app
        .oneshot(json_request("/recommend_crop", valid_crop_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["recommended_crop"], "rice");
    assert!(!body["advice"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_recommend_crop_returns_503_without_model() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request("/recommend_crop", valid_crop_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("Crop recommendation model not available"));
}

#[tokio::test]
async fn test_recommend_crop_rejects_missing_field() {
    let app = setup_test_app();

    // rainfall is missing
    let body = serde_json::json!({
        "N": 90, "P": 40, "K": 40,
        "temperature": 25, "humidity": 80, "ph": 6.5,
        "user_id": "farmer-1"
    });
    let response = app
        .oneshot(json_request("/recommend_crop", body))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_detect_disease_rejects_text_upload_with_400() {
    let app = setup_test_app();

    let response = app
        .oneshot(multipart_upload("text/plain", b"hello"))
        .await
        .unwrap();

    // Rejected on content-type, before the (unavailable) model would 503
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["detail"].as_str().unwrap().contains("file type"));
}

#[tokio::test]
async fn test_detect_disease_returns_503_for_image_without_model() {
    let app = setup_test_app();

    let response = app
        .oneshot(multipart_upload("image/png", &[0x89, 0x50, 0x4e, 0x47]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("Disease detection model not available"));
}

#[tokio::test]
async fn test_detect_disease_requires_file_field() {
    let app = setup_test_app();

    let boundary = "agrimind-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"user_id\"\r\n\r\n\
         farmer-1\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/detect_disease")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_succeeds_with_rule_based_composer() {
    let app = setup_test_app();

    let body = serde_json::json!({
        "message": "when should I plant rice?",
        "user_id": "farmer-1",
        "language": "en"
    });
    let response = app.oneshot(json_request("/chat", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(!body["response"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_healthz_reports_unhealthy_without_models() {
    let app = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert!(body["components"]["crop_model"].is_object());
    assert!(body["components"]["disease_model"].is_object());
}

#[tokio::test]
async fn test_readyz_not_ready_without_models() {
    let app = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["ready"], false);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let app = setup_test_app();

    // Touch a couple of metrics so they appear in the exposition
    let metrics = ServiceMetrics::new();
    metrics.set_model_loaded("crop", false);
    metrics.inc_request("recommend_crop", "model_unavailable");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("agrimind_model_loaded"));
    assert!(text.contains("agrimind_requests_total"));
}
