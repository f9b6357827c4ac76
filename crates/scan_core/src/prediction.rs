//! Remote classification: the client trait, its HTTP implementation, and
//! the mapping from raw responses to user-facing outcomes.

use crate::config::ClientConfig;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const SERVER_FAILURE_MESSAGE: &str = "Server connection failed. Is the backend running?";

/// Multipart field the service reads the image from.
pub const UPLOAD_FIELD: &str = "file";

const NO_TUMOR_LABEL: &str = "no tumor";

/// Image payload for a single prediction request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub name: String,
    pub content: Arc<[u8]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub class_number: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    message: String,
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("malformed prediction payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("prediction payload carried an empty label")]
    EmptyLabel,
    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(String),
    #[error("prediction request ended before a response arrived")]
    Aborted,
}

/// What the user sees once a diagnosis completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionOutcome {
    Success { label: String },
    Failure { reason: String },
}

impl PredictionOutcome {
    /// Maps a raw client result. Failure causes collapse into one message.
    pub fn from_result(result: Result<String, PredictionError>) -> Self {
        match result {
            Ok(raw) => Self::Success {
                label: normalize_label(&raw),
            },
            Err(_) => Self::Failure {
                reason: SERVER_FAILURE_MESSAGE.to_string(),
            },
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Success { label } => Some(label),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason } => Some(reason),
        }
    }

    /// `Some(true)` when a successful label indicates a tumor.
    pub fn tumor_detected(&self) -> Option<bool> {
        self.label().map(is_tumor_label)
    }
}

/// Upper-cases the first character only: `"glioma"` becomes `"Glioma"`.
pub fn normalize_label(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn is_tumor_label(label: &str) -> bool {
    label.to_lowercase() != NO_TUMOR_LABEL
}

/// Sends one image to a classifier and returns its raw label.
#[async_trait]
pub trait PredictionClient: Send + Sync {
    async fn predict(&self, upload: ImageUpload) -> Result<String, PredictionError>;
}

/// [`PredictionClient`] talking to the classification service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    http: Client,
    endpoint: Url,
}

impl HttpPredictionClient {
    pub fn new(config: &ClientConfig) -> Result<Self, PredictionError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| PredictionError::InvalidEndpoint(format!("{}: {e}", config.endpoint)))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Asks the service root for its greeting, to tell whether it is up.
    pub async fn health(&self) -> Result<String, PredictionError> {
        let root = self
            .endpoint
            .join("/")
            .map_err(|e| PredictionError::InvalidEndpoint(e.to_string()))?;
        let response = self.http.get(root).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PredictionError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        let body = response.bytes().await?;
        let health: HealthResponse = serde_json::from_slice(&body)?;
        Ok(health.message)
    }

    fn upload_form(upload: ImageUpload) -> Result<Form, PredictionError> {
        let mime = mime_guess::from_path(&upload.name).first_or_octet_stream();
        let part = Part::bytes(upload.content.to_vec())
            .file_name(upload.name)
            .mime_str(mime.as_ref())?;
        Ok(Form::new().part(UPLOAD_FIELD, part))
    }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn predict(&self, upload: ImageUpload) -> Result<String, PredictionError> {
        let name = upload.name.clone();
        let form = Self::upload_form(upload)?;
        let response = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PredictionError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.bytes().await?;
        let parsed: PredictResponse = serde_json::from_slice(&body)?;
        if parsed.prediction.is_empty() {
            return Err(PredictionError::EmptyLabel);
        }
        tracing::debug!(
            file = %name,
            class_number = ?parsed.class_number,
            message = parsed.message.as_deref().unwrap_or(""),
            "prediction received"
        );
        Ok(parsed.prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Multipart, http::StatusCode, routing::{get, post}};
    use rstest::rstest;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::sync::{Mutex, oneshot};

    #[rstest]
    #[case("glioma", "Glioma")]
    #[case("no tumor", "No tumor")]
    #[case("meningioma", "Meningioma")]
    #[case("Pituitary", "Pituitary")]
    #[case("ßeta", "SSeta")]
    #[case("", "")]
    fn normalizes_first_character_only(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_label(raw), expected);
    }

    #[rstest]
    #[case("No tumor", false)]
    #[case("NO TUMOR", false)]
    #[case("no tumor", false)]
    #[case("Meningioma", true)]
    #[case("Glioma", true)]
    #[case("no tumour", true)]
    fn classifies_tumor_labels(#[case] label: &str, #[case] tumor: bool) {
        assert_eq!(is_tumor_label(label), tumor);
    }

    #[test]
    fn any_failure_maps_to_the_same_message() {
        for err in [PredictionError::EmptyLabel, PredictionError::Aborted] {
            let outcome = PredictionOutcome::from_result(Err(err));
            assert_eq!(outcome.failure_reason(), Some(SERVER_FAILURE_MESSAGE));
            assert_eq!(outcome.tumor_detected(), None);
        }
    }

    #[test]
    fn success_is_normalized_and_classified() {
        let outcome = PredictionOutcome::from_result(Ok("no tumor".into()));
        assert_eq!(outcome.label(), Some("No tumor"));
        assert_eq!(outcome.tumor_detected(), Some(false));
    }

    #[derive(Debug)]
    struct ReceivedUpload {
        field: String,
        file_name: Option<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    }

    async fn spawn_classifier(
        status: StatusCode,
        body: serde_json::Value,
    ) -> (String, oneshot::Receiver<ReceivedUpload>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        let tx = std::sync::Arc::new(Mutex::new(Some(tx)));
        let app = Router::new()
            .route(
                "/predict",
                post(move |mut multipart: Multipart| {
                    let tx = tx.clone();
                    let body = body.clone();
                    async move {
                        if let Ok(Some(field)) = multipart.next_field().await {
                            let received = ReceivedUpload {
                                field: field.name().unwrap_or_default().to_string(),
                                file_name: field.file_name().map(str::to_string),
                                content_type: field.content_type().map(str::to_string),
                                bytes: field.bytes().await.unwrap_or_default().to_vec(),
                            };
                            if let Some(tx) = tx.lock().await.take() {
                                let _ = tx.send(received);
                            }
                        }
                        (status, Json(body))
                    }
                }),
            )
            .route(
                "/",
                get(|| async { Json(json!({"message": "Hello world from FastAPI!"})) }),
            );
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}/predict"), rx)
    }

    fn client_for(endpoint: &str) -> HttpPredictionClient {
        HttpPredictionClient::new(&ClientConfig {
            endpoint: endpoint.to_string(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    fn upload(name: &str, bytes: &[u8]) -> ImageUpload {
        ImageUpload {
            name: name.to_string(),
            content: Arc::from(bytes),
        }
    }

    #[tokio::test]
    async fn posts_image_as_multipart_file_field() {
        let (endpoint, received) = spawn_classifier(
            StatusCode::OK,
            json!({"message": "successfully predict", "prediction": "glioma", "class_number": 0}),
        )
        .await;
        let client = client_for(&endpoint);

        let label = client.predict(upload("scan.png", b"\x89PNG-ish")).await.unwrap();
        assert_eq!(label, "glioma");

        let received = received.await.unwrap();
        assert_eq!(received.field, UPLOAD_FIELD);
        assert_eq!(received.file_name.as_deref(), Some("scan.png"));
        assert_eq!(received.content_type.as_deref(), Some("image/png"));
        assert_eq!(received.bytes, b"\x89PNG-ish");
    }

    #[tokio::test]
    async fn server_error_status_is_a_failure() {
        let (endpoint, _rx) = spawn_classifier(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"detail": "model not loaded"}),
        )
        .await;
        let err = client_for(&endpoint)
            .predict(upload("scan.jpg", b"jpg"))
            .await
            .unwrap_err();
        match err {
            PredictionError::Status { status, detail } => {
                assert_eq!(status, 500);
                assert!(detail.contains("model not loaded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_prediction_field_is_malformed() {
        let (endpoint, _rx) = spawn_classifier(StatusCode::OK, json!({"label": "glioma"})).await;
        let err = client_for(&endpoint)
            .predict(upload("scan.png", b"png"))
            .await
            .unwrap_err();
        assert!(matches!(err, PredictionError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn empty_prediction_is_rejected() {
        let (endpoint, _rx) = spawn_classifier(StatusCode::OK, json!({"prediction": ""})).await;
        let err = client_for(&endpoint)
            .predict(upload("scan.png", b"png"))
            .await
            .unwrap_err();
        assert!(matches!(err, PredictionError::EmptyLabel));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = client_for(&format!("http://{addr}/predict"))
            .predict(upload("scan.png", b"png"))
            .await
            .unwrap_err();
        assert!(matches!(err, PredictionError::Transport(_)));
    }

    #[tokio::test]
    async fn health_reads_service_greeting() {
        let (endpoint, _rx) = spawn_classifier(StatusCode::OK, json!({})).await;
        let message = client_for(&endpoint).health().await.unwrap();
        assert_eq!(message, "Hello world from FastAPI!");
    }

    #[test]
    fn rejects_unparsable_endpoint() {
        let err = HttpPredictionClient::new(&ClientConfig {
            endpoint: "not a url".into(),
            request_timeout_secs: 5,
        })
        .unwrap_err();
        assert!(matches!(err, PredictionError::InvalidEndpoint(_)));
    }
}
