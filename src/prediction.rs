use crate::{config::PredictorConfig, image_codec::EncodedImage};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Label text and confidence fraction returned by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub label_text: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    RateLimited,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl PredictError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

pub type Outcome = Result<PredictionResult, PredictError>;

#[derive(Error, Debug)]
pub enum ModelClientError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("Request to model endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Model endpoint returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("Malformed prediction response: {0}")]
    MalformedResponse(String),
}

impl From<ModelClientError> for PredictError {
    fn from(err: ModelClientError) -> Self {
        let kind = match &err {
            ModelClientError::Unauthorized(_) => ErrorKind::Unauthorized,
            ModelClientError::NotFound(_) => ErrorKind::NotFound,
            ModelClientError::RateLimited(_) => ErrorKind::RateLimited,
            ModelClientError::Transport(_)
            | ModelClientError::UnexpectedStatus { .. }
            | ModelClientError::MalformedResponse(_) => ErrorKind::Other,
        };
        PredictError::new(kind, err.to_string())
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync + 'static {
    async fn predict(
        &self,
        model_id: &str,
        input_data: &str,
    ) -> Result<PredictionResult, ModelClientError>;
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    input_data: &'a str,
}

/// Talks to a hosted model over HTTP. One request per call, no retries and
/// no client-side timeout.
pub struct HttpModelClient {
    client: reqwest::Client,
    predict_url: String,
    auth_token: Option<String>,
}

impl HttpModelClient {
    pub fn new(config: &PredictorConfig) -> Result<Self, ModelClientError> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            predict_url: config.get_predict_url(),
            auth_token: config.get_auth_token().map(str::to_string),
        })
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    #[instrument(skip(self, input_data), fields(input_len = input_data.len()))]
    async fn predict(
        &self,
        model_id: &str,
        input_data: &str,
    ) -> Result<PredictionResult, ModelClientError> {
        let mut request = self
            .client
            .post(&self.predict_url)
            .query(&[("model_id", model_id)])
            .json(&PredictRequest { input_data });

        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        parse_prediction(&body)
    }
}

fn status_error(status: StatusCode, body: &str) -> ModelClientError {
    let body = body.trim();
    let text = if body.is_empty() {
        status.to_string()
    } else {
        body.to_string()
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelClientError::Unauthorized(text),
        StatusCode::NOT_FOUND => ModelClientError::NotFound(text),
        StatusCode::TOO_MANY_REQUESTS => ModelClientError::RateLimited(text),
        _ => ModelClientError::UnexpectedStatus {
            status: status.as_u16(),
            body: text,
        },
    }
}

/// The body is an ordered pair: label text first, confidence second.
/// Extra trailing elements are ignored.
pub fn parse_prediction(body: &str) -> Result<PredictionResult, ModelClientError> {
    let values: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| ModelClientError::MalformedResponse(e.to_string()))?;

    let label_text = match values.first() {
        Some(Value::String(label_text)) => label_text.clone(),
        other => {
            return Err(ModelClientError::MalformedResponse(format!(
                "expected label text at index 0, got {:?}",
                other
            )))
        }
    };

    let confidence = match values.get(1) {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|confidence| confidence.is_finite())
    .ok_or_else(|| {
        ModelClientError::MalformedResponse("expected a numeric confidence at index 1".into())
    })?;

    Ok(PredictionResult {
        label_text,
        confidence,
    })
}

#[derive(Clone)]
pub struct PredictionService {
    client: Arc<dyn ModelClient>,
}

impl PredictionService {
    pub fn new(client: impl ModelClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    #[instrument(skip(self, image), fields(jpeg_len = image.jpeg().len()))]
    pub async fn predict(&self, model_id: &str, image: &EncodedImage) -> Outcome {
        match self.client.predict(model_id, image.as_base64()).await {
            Ok(result) => {
                tracing::debug!(
                    "Prediction `{}` with confidence {:.3}",
                    result.label_text,
                    result.confidence
                );
                Ok(result)
            }
            Err(err) => {
                tracing::warn!("Prediction failed: {}", err);
                Err(PredictError::from(err))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::PredictorConfig;
    use axum::{
        extract::Query,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::post,
        Json, Router,
    };
    use std::collections::HashMap;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };
    use tokio::net::TcpListener;

    /// Replays a fixed answer and counts how often it was asked.
    pub(crate) struct MockModelClient {
        pub calls: Arc<AtomicUsize>,
        pub inputs: Arc<Mutex<Vec<String>>>,
        pub response: fn() -> Result<PredictionResult, ModelClientError>,
    }

    impl MockModelClient {
        pub(crate) fn new(response: fn() -> Result<PredictionResult, ModelClientError>) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                inputs: Arc::new(Mutex::new(Vec::new())),
                response,
            }
        }
    }

    #[async_trait]
    impl ModelClient for MockModelClient {
        async fn predict(
            &self,
            _model_id: &str,
            input_data: &str,
        ) -> Result<PredictionResult, ModelClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inputs.lock().unwrap().push(input_data.to_string());
            (self.response)()
        }
    }

    async fn stub_predict(
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> axum::response::Response {
        let model_id = params.get("model_id").cloned().unwrap_or_default();
        let authorized = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            == Some("Bearer secret");

        if body["input_data"].as_str().unwrap_or_default().is_empty() {
            return StatusCode::BAD_REQUEST.into_response();
        }

        match model_id.as_str() {
            _ if !authorized => (StatusCode::UNAUTHORIZED, "bad token").into_response(),
            "mdl-pair" => Json(serde_json::json!(["cat, dog", 0.87])).into_response(),
            "mdl-missing" => (StatusCode::NOT_FOUND, "model mdl-missing not found").into_response(),
            "mdl-busy" => StatusCode::TOO_MANY_REQUESTS.into_response(),
            "mdl-forbidden" => StatusCode::FORBIDDEN.into_response(),
            "mdl-garbage" => "not json".into_response(),
            _ => (StatusCode::BAD_GATEWAY, "upstream down").into_response(),
        }
    }

    async fn spawn_stub() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route("/predict", post(stub_predict));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(endpoint: String, token: Option<&str>) -> HttpModelClient {
        HttpModelClient::new(&PredictorConfig {
            endpoint,
            auth_token: token.map(str::to_string),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_client_returns_pair() {
        let client = client_for(spawn_stub().await, Some("secret"));

        let result = client.predict("mdl-pair", "aGVsbG8=").await.unwrap();

        assert_eq!(result.label_text, "cat, dog");
        assert!((result.confidence - 0.87).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_http_client_maps_status_codes() {
        let endpoint = spawn_stub().await;

        let client = client_for(endpoint.clone(), None);
        let err = client.predict("mdl-pair", "aGVsbG8=").await.unwrap_err();
        assert_eq!(PredictError::from(err).kind, ErrorKind::Unauthorized);

        let client = client_for(endpoint, Some("secret"));

        let err = client.predict("mdl-forbidden", "aGVsbG8=").await.unwrap_err();
        assert_eq!(PredictError::from(err).kind, ErrorKind::Unauthorized);

        let err = client.predict("mdl-missing", "aGVsbG8=").await.unwrap_err();
        let err = PredictError::from(err);
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.detail, "model mdl-missing not found");

        let err = client.predict("mdl-busy", "aGVsbG8=").await.unwrap_err();
        let err = PredictError::from(err);
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.detail, "429 Too Many Requests");

        let err = client.predict("mdl-other", "aGVsbG8=").await.unwrap_err();
        let err = PredictError::from(err);
        assert_eq!(err.kind, ErrorKind::Other);
        assert!(err.detail.contains("upstream down"));

        let err = client.predict("mdl-garbage", "aGVsbG8=").await.unwrap_err();
        assert!(matches!(err, ModelClientError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_other() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = client_for(endpoint, None);
        let err = client.predict("mdl-pair", "aGVsbG8=").await.unwrap_err();

        assert!(matches!(err, ModelClientError::Transport(_)));
        assert_eq!(PredictError::from(err).kind, ErrorKind::Other);
    }

    #[test]
    fn test_parse_prediction() {
        let result = parse_prediction(r#"["cat", 0.5]"#).unwrap();
        assert_eq!(result.label_text, "cat");
        assert_eq!(result.confidence, 0.5);

        let result = parse_prediction(r#"["cat", "0.25", {"extra": true}]"#).unwrap();
        assert_eq!(result.confidence, 0.25);

        assert!(parse_prediction(r#"[0.5, "cat"]"#).is_err());
        assert!(parse_prediction(r#"["cat"]"#).is_err());
        assert!(parse_prediction(r#"{"label": "cat"}"#).is_err());
    }

    #[tokio::test]
    async fn test_prediction_service_maps_errors_locally() {
        let service = PredictionService::new(MockModelClient::new(|| {
            Err(ModelClientError::RateLimited("slow down".into()))
        }));
        let image = EncodedImage::from_jpeg(vec![0xFF, 0xD8, 0xFF]);

        let outcome = service.predict("mdl-i5bsdoczyhmkp", &image).await;

        assert_eq!(
            outcome,
            Err(PredictError::new(ErrorKind::RateLimited, "slow down"))
        );
    }
}
