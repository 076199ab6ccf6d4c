//! The dual-transport layer under every WordPress call.
//!
//! Every endpoint builds an [`ApiRequest`] and hands it to a [`Transport`].
//! The production transport is [`DualTransport`]: a shared pooled client
//! first, and on *transport-level* failure only — connect, DNS, timeout —
//! one retry through a fresh single-shot client with a hand-built Basic
//! authorization header. A 4xx/5xx response is a real answer from the
//! server (bad credentials, rejected payload) and is never retried.

use reqwest::Method;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout; uploads and post creation stretch it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Username plus application password for Basic auth.
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub app_password: String,
}

/// Request payload kinds the API speaks.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart {
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

/// A transport-agnostic description of one API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn post_json(url: impl Into<String>, body: impl Serialize) -> Self {
        let value = serde_json::to_value(body).unwrap_or(serde_json::Value::Null);
        Self {
            method: Method::POST,
            url: url.into(),
            query: Vec::new(),
            body: RequestBody::Json(value),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn post_multipart(
        url: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            query: Vec::new(),
            body: RequestBody::Multipart {
                file_name: file_name.into(),
                mime_type: mime_type.into(),
                bytes,
            },
            timeout: UPLOAD_TIMEOUT,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A failed API call, classified so the retry policy can act on it.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client-side timeout fired before a response arrived.
    #[error("request timed out")]
    Timeout,
    /// Connection-layer failure: DNS, refused, reset, TLS.
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl TransportError {
    /// Whether this failure happened below the HTTP layer. Only these
    /// trigger the fallback transport.
    pub fn is_transport_level(&self) -> bool {
        !matches!(self, Self::Status { .. })
    }
}

/// Executes [`ApiRequest`]s. The seam every endpoint and every test mocks.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<serde_json::Value, TransportError>;
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

async fn dispatch(
    client: &reqwest::Client,
    credentials: &BasicCredentials,
    manual_auth: bool,
    request: ApiRequest,
) -> Result<serde_json::Value, TransportError> {
    let mut builder = client
        .request(request.method, &request.url)
        .timeout(request.timeout)
        .header(reqwest::header::ACCEPT, "application/json")
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT);

    builder = if manual_auth {
        let token = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            format!("{}:{}", credentials.username, credentials.app_password),
        );
        builder.header(reqwest::header::AUTHORIZATION, format!("Basic {token}"))
    } else {
        builder.basic_auth(&credentials.username, Some(&credentials.app_password))
    };

    if !request.query.is_empty() {
        builder = builder.query(&request.query);
    }

    builder = match request.body {
        RequestBody::Empty => builder,
        RequestBody::Json(value) => builder.json(&value),
        RequestBody::Multipart {
            file_name,
            mime_type,
            bytes,
        } => {
            let part = reqwest::multipart::Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(&mime_type)
                .map_err(classify)?;
            builder.multipart(reqwest::multipart::Form::new().part("file", part))
        }
    };

    let response = builder.send().await.map_err(classify)?;
    let status = response.status();
    let text = response.text().await.map_err(classify)?;

    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            body: truncate(&text),
        });
    }

    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|err| TransportError::Network(format!("invalid JSON response: {err}")))
}

fn truncate(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

/// Primary transport: one pooled client for the process.
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: BasicCredentials,
}

impl HttpTransport {
    pub fn new(credentials: BasicCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<serde_json::Value, TransportError> {
        dispatch(&self.client, &self.credentials, false, request).await
    }
}

/// Fallback transport: a fresh single-shot client per call, proxy
/// settings ignored, authorization header assembled by hand. Shares no
/// state with the primary.
pub struct RawTransport {
    credentials: BasicCredentials,
}

impl RawTransport {
    pub fn new(credentials: BasicCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait::async_trait]
impl Transport for RawTransport {
    async fn execute(&self, request: ApiRequest) -> Result<serde_json::Value, TransportError> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(classify)?;
        dispatch(&client, &self.credentials, true, request).await
    }
}

/// Primary-then-fallback strategy with the retry policy in one place.
pub struct DualTransport {
    primary: Box<dyn Transport>,
    fallback: Box<dyn Transport>,
}

impl DualTransport {
    pub fn new(credentials: BasicCredentials) -> Self {
        Self {
            primary: Box::new(HttpTransport::new(credentials.clone())),
            fallback: Box::new(RawTransport::new(credentials)),
        }
    }

    pub fn with_transports(primary: Box<dyn Transport>, fallback: Box<dyn Transport>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait::async_trait]
impl Transport for DualTransport {
    async fn execute(&self, request: ApiRequest) -> Result<serde_json::Value, TransportError> {
        match self.primary.execute(request.clone()).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_transport_level() => {
                log::warn!("primary transport failed ({err}), retrying via fallback");
                self.fallback.execute(request).await
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Transport stub answering from a script and recording invocations.
    pub(crate) struct ScriptedTransport {
        outcome: Result<serde_json::Value, fn() -> TransportError>,
        pub calls: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub fn ok(value: serde_json::Value) -> Self {
            Self {
                outcome: Ok(value),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(make: fn() -> TransportError) -> Self {
            Self {
                outcome: Err(make),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: ApiRequest) -> Result<serde_json::Value, TransportError> {
            self.calls.lock().unwrap().push(request);
            match &self.outcome {
                Ok(value) => Ok(value.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn network_error() -> TransportError {
        TransportError::Network("connection refused".into())
    }

    fn timeout_error() -> TransportError {
        TransportError::Timeout
    }

    fn unauthorized() -> TransportError {
        TransportError::Status {
            status: 401,
            body: "rest_not_logged_in".into(),
        }
    }

    #[tokio::test]
    async fn network_failure_triggers_fallback() {
        let primary = Box::new(ScriptedTransport::failing(network_error));
        let fallback = Box::new(ScriptedTransport::ok(serde_json::json!({"id": 7})));
        let dual = DualTransport::with_transports(primary, fallback);

        let value = dual
            .execute(ApiRequest::get("https://blog.example/wp-json/wp/v2/users/me"))
            .await
            .unwrap();
        assert_eq!(value["id"], 7);
    }

    #[tokio::test]
    async fn timeout_triggers_fallback() {
        let primary = Box::new(ScriptedTransport::failing(timeout_error));
        let fallback = Box::new(ScriptedTransport::ok(serde_json::json!([])));
        let dual = DualTransport::with_transports(primary, fallback);

        assert!(
            dual.execute(ApiRequest::get("https://blog.example/x"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn server_rejection_never_falls_back() {
        let primary = Box::new(ScriptedTransport::failing(unauthorized));
        let fallback = std::sync::Arc::new(ScriptedTransport::ok(serde_json::json!({})));

        struct Shared(std::sync::Arc<ScriptedTransport>);
        #[async_trait::async_trait]
        impl Transport for Shared {
            async fn execute(
                &self,
                request: ApiRequest,
            ) -> Result<serde_json::Value, TransportError> {
                self.0.execute(request).await
            }
        }

        let dual = DualTransport::with_transports(primary, Box::new(Shared(fallback.clone())));
        let err = dual
            .execute(ApiRequest::get("https://blog.example/x"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Status { status: 401, .. }));
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn both_transports_failing_surfaces_fallback_error() {
        let primary = Box::new(ScriptedTransport::failing(network_error));
        let fallback = Box::new(ScriptedTransport::failing(timeout_error));
        let dual = DualTransport::with_transports(primary, fallback);

        let err = dual
            .execute(ApiRequest::get("https://blog.example/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
    }

    #[test]
    fn error_classification() {
        assert!(network_error().is_transport_level());
        assert!(timeout_error().is_transport_level());
        assert!(!unauthorized().is_transport_level());
    }

    #[test]
    fn request_builders() {
        let req = ApiRequest::get("https://x").query("per_page", "100");
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.timeout, DEFAULT_TIMEOUT);
        assert_eq!(req.query, vec![("per_page".to_string(), "100".to_string())]);

        let req = ApiRequest::post_multipart("https://x", "a.jpg", "image/jpeg", vec![1, 2]);
        assert_eq!(req.timeout, UPLOAD_TIMEOUT);
        assert!(matches!(req.body, RequestBody::Multipart { .. }));

        let req = ApiRequest::post_json("https://x", serde_json::json!({"a": 1}))
            .timeout(Duration::from_secs(30));
        assert_eq!(req.timeout, Duration::from_secs(30));
    }

    #[test]
    fn truncate_caps_long_bodies() {
        let long = "x".repeat(2000);
        let out = truncate(&long);
        assert!(out.len() < 600);
        assert!(out.ends_with('…'));
        assert_eq!(truncate("short"), "short");
    }
}
