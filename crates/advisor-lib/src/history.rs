//! Interaction history client
//!
//! Appends interaction records to an external document store, organized per
//! requester id with one sub-collection per interaction kind. Each record
//! carries a client-side timestamp. Strictly best-effort: the response path
//! spawns these writes and never waits on them, and failures are logged and
//! swallowed.

use crate::models::SoilSample;
use crate::observability::ServiceMetrics;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const RECOMMENDATIONS: &str = "recommendations";
pub const DETECTIONS: &str = "detections";
pub const CHATS: &str = "chats";

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationRecord {
    pub crop: String,
    pub advice: String,
    pub soil: SoilSample,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionRecord {
    pub crop: String,
    pub disease: String,
    pub is_healthy: bool,
    pub confidence: f32,
    pub advice: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRecord {
    pub question: String,
    pub response: String,
}

/// Wire wrapper adding the write timestamp to every record.
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    data: &'a T,
}

/// Client for the append-only history collaborator. Constructed without an
/// endpoint it becomes a no-op.
pub struct HistoryStore {
    http: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
    metrics: ServiceMetrics,
}

impl HistoryStore {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            timeout,
            metrics: ServiceMetrics::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(2))
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    pub async fn record_recommendation(
        &self,
        user_id: &str,
        record: &RecommendationRecord,
    ) -> Result<()> {
        self.append(user_id, RECOMMENDATIONS, record).await
    }

    pub async fn record_detection(&self, user_id: &str, record: &DetectionRecord) -> Result<()> {
        self.append(user_id, DETECTIONS, record).await
    }

    pub async fn record_chat(&self, user_id: &str, record: &ChatRecord) -> Result<()> {
        self.append(user_id, CHATS, record).await
    }

    async fn append(&self, user_id: &str, collection: &str, record: &impl Serialize) -> Result<()> {
        let Some(base_url) = &self.base_url else {
            debug!(collection, "History store disabled, skipping write");
            return Ok(());
        };

        let url = format!("{base_url}/farmers/{user_id}/{collection}");
        let envelope = Envelope {
            timestamp: Utc::now(),
            data: record,
        };
        let response = self
            .http
            .post(&url)
            .json(&envelope)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("History write to {collection} failed"))?;

        anyhow::ensure!(
            response.status().is_success(),
            "History store returned status {} for {collection}",
            response.status()
        );
        Ok(())
    }
}

/// What a detached history write should append.
#[derive(Debug, Clone)]
pub enum HistoryWrite {
    Recommendation(RecommendationRecord),
    Detection(DetectionRecord),
    Chat(ChatRecord),
}

impl HistoryStore {
    /// Fire a write without blocking the response path. Failures are logged
    /// at warn level and counted, never propagated.
    pub fn spawn_write(self: &Arc<Self>, user_id: String, write: HistoryWrite) {
        let store = self.clone();
        tokio::spawn(async move {
            let result = match &write {
                HistoryWrite::Recommendation(record) => {
                    store.record_recommendation(&user_id, record).await
                }
                HistoryWrite::Detection(record) => store.record_detection(&user_id, record).await,
                HistoryWrite::Chat(record) => store.record_chat(&user_id, record).await,
            };
            if let Err(e) = result {
                store.metrics.inc_history_failures();
                warn!(user_id = %user_id, error = %format!("{e:#}"), "History write failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::Mutex;

    async fn spawn_store_stub() -> (String, Arc<Mutex<Vec<String>>>) {
        let paths = Arc::new(Mutex::new(Vec::new()));
        let seen = paths.clone();
        let app = Router::new().route(
            "/farmers/:user/:collection",
            post(
                move |Path((user, collection)): Path<(String, String)>,
                      Json(_body): Json<serde_json::Value>| {
                    let seen = seen.clone();
                    async move {
                        seen.lock().unwrap().push(format!("{user}/{collection}"));
                        axum::http::StatusCode::CREATED
                    }
                },
            ),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), paths)
    }

    #[test]
    fn test_envelope_flattens_record_fields() {
        let record = ChatRecord {
            question: "q".to_string(),
            response: "r".to_string(),
        };
        let envelope = Envelope {
            timestamp: Utc::now(),
            data: &record,
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("timestamp").is_some());
        assert_eq!(value["question"], "q");
        assert_eq!(value["response"], "r");
    }

    #[tokio::test]
    async fn test_disabled_store_is_a_noop() {
        let store = HistoryStore::disabled();
        assert!(!store.is_enabled());
        let record = ChatRecord {
            question: "q".to_string(),
            response: "r".to_string(),
        };
        store.record_chat("farmer-1", &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_records_land_in_per_user_collections() {
        let (base, paths) = spawn_store_stub().await;
        let store = HistoryStore::new(Some(base), Duration::from_secs(2));

        store
            .record_chat(
                "farmer-1",
                &ChatRecord {
                    question: "q".to_string(),
                    response: "r".to_string(),
                },
            )
            .await
            .unwrap();
        store
            .record_detection(
                "farmer-2",
                &DetectionRecord {
                    crop: "Tomato".to_string(),
                    disease: "Healthy".to_string(),
                    is_healthy: true,
                    confidence: 0.9,
                    advice: "keep going".to_string(),
                },
            )
            .await
            .unwrap();

        let seen = paths.lock().unwrap();
        assert_eq!(seen.as_slice(), ["farmer-1/chats", "farmer-2/detections"]);
    }

    #[tokio::test]
    async fn test_unreachable_store_reports_error() {
        let store = HistoryStore::new(
            Some("http://127.0.0.1:1".to_string()),
            Duration::from_millis(200),
        );
        let record = ChatRecord {
            question: "q".to_string(),
            response: "r".to_string(),
        };
        assert!(store.record_chat("farmer-1", &record).await.is_err());
    }
}
