use std::fmt;
use std::time::Duration;

use purge_core::Signal;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use url::Url;

use crate::Governor;

/// HTTP status the remote uses to say "slow down".
pub const THROTTLED_STATUS: u16 = 429;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    /// Path relative to the transport's base URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl TransportRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(path)
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_throttled(&self) -> bool {
        self.status == THROTTLED_STATUS
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body)
            .map_err(|err| TransportError::new(TransportErrorKind::Decode, err.to_string()))
    }

    /// Turns any non-2xx status into an error.
    pub fn require_success(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::new(
                TransportErrorKind::HttpStatus(self.status),
                format!("unexpected status {}", self.status),
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64 },
    Decode,
    Network,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::InvalidUrl => write!(f, "invalid url"),
            TransportErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::TooLarge { max_bytes } => {
                write!(f, "response larger than {max_bytes} bytes")
            }
            TransportErrorKind::Decode => write!(f, "undecodable body"),
            TransportErrorKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_throttled(&self) -> bool {
        self.kind == TransportErrorKind::HttpStatus(THROTTLED_STATUS)
    }
}

/// Performs every request the engine sends to the remote side.
///
/// Implementations return `Ok` for any HTTP status; only faults that prevent a
/// response from arriving are errors.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 2 * 1024 * 1024,
            user_agent: concat!("purge/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: TransportSettings,
    base: Url,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        let mut base_url = settings.base_url.clone();
        // Url::join drops the last segment unless the base ends with a slash.
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base = Url::parse(&base_url)
            .map_err(|err| TransportError::new(TransportErrorKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| TransportError::new(TransportErrorKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            base,
            client,
        })
    }

    fn resolve(&self, request: &TransportRequest) -> Result<Url, TransportError> {
        let mut url = self
            .base
            .join(request.path.trim_start_matches('/'))
            .map_err(|err| TransportError::new(TransportErrorKind::InvalidUrl, err.to_string()))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = self.resolve(&request)?;
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|err| TransportError::new(TransportErrorKind::Decode, err.to_string()))?;
            builder = builder.header(CONTENT_TYPE, "application/json").body(bytes);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(TransportError::new(
                    TransportErrorKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                    },
                    "response too large",
                ));
            }
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        if body.len() as u64 > self.settings.max_bytes {
            return Err(TransportError::new(
                TransportErrorKind::TooLarge {
                    max_bytes: self.settings.max_bytes,
                },
                "response too large",
            ));
        }

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(TransportErrorKind::Timeout, err.to_string());
    }
    TransportError::new(TransportErrorKind::Network, err.to_string())
}

/// Reports every response to the governor before handing it back: a
/// throttling status becomes `Signal::Throttled`, any other status
/// `Signal::Success`. Faults without a response are passed through untouched.
pub struct GovernedTransport<T> {
    inner: T,
    governor: Governor,
}

impl<T> GovernedTransport<T> {
    pub fn new(inner: T, governor: Governor) -> Self {
        Self { inner, governor }
    }
}

#[async_trait::async_trait]
impl<T: Transport> Transport for GovernedTransport<T> {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let response = self.inner.execute(request).await?;
        let signal = if response.is_throttled() {
            Signal::Throttled
        } else {
            Signal::Success
        };
        self.governor.observe(signal);
        Ok(response)
    }
}
