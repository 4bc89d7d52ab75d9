use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{DswsError, TransportError};
use crate::wire::FaultBody;

/// One outbound POST. Every operation on the service is a JSON POST to an
/// operation-specific suffix of the service URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub body: String,
    pub timeout: Duration,
}

/// Raw HTTP outcome prior to classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failure below the HTTP layer: connect errors, timeouts, interrupted reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    timed_out: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn is_timeout(&self) -> bool {
        self.timed_out
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Transport seam. Production code uses [`ReqwestTransport`]; tests substitute
/// deterministic fakes.
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Blocking reqwest transport carrying the session's proxy, certificate and
/// timeout settings.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn from_config(config: &ClientConfig) -> Result<Self, DswsError> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(concat!("dsws-core/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|err| DswsError::Configuration(format!("invalid proxy URL: {err}")))?;
            builder = builder.proxy(proxy);
        }

        if let Some(path) = &config.ssl_ca_bundle {
            let pem = std::fs::read(path).map_err(|err| {
                DswsError::Configuration(format!(
                    "cannot read CA bundle {}: {err}",
                    path.display()
                ))
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .map_err(|err| DswsError::Configuration(format!("invalid CA bundle: {err}")))?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder
            .build()
            .map_err(|err| DswsError::Configuration(format!("cannot build HTTP client: {err}")))?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let response = self
            .client
            .post(&request.url)
            .header("content-type", "application/json")
            .timeout(request.timeout)
            .body(request.body)
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    HttpError::timed_out(err.to_string())
                } else {
                    HttpError::new(err.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| HttpError::new(format!("failed to read response body: {err}")))?;

        Ok(HttpResponse { status, body })
    }
}

/// Issues one POST per call and classifies the raw outcome into a typed
/// response, a service fault, or a transport error. Never retries.
#[derive(Clone)]
pub struct Invoker {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl Invoker {
    pub fn new(transport: Arc<dyn HttpTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Classification order:
    /// 1. 2xx with a parseable JSON body decodes as `Resp`;
    /// 2. 400/403 whose body matches `{Code, SubCode, Message}` is a service fault;
    /// 3. any other non-2xx, or 400/403 not matching the fault schema, is a
    ///    status-level transport error;
    /// 4. a 2xx body that is not JSON is a decode-level transport error.
    pub fn post_json<Req, Resp>(&self, url: &str, request: &Req) -> Result<Resp, DswsError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_string(request)
            .map_err(|err| TransportError::JsonDecode(format!("failed to encode request: {err}")))?;

        debug!(url, "dispatching POST");
        let response = self
            .transport
            .execute(HttpRequest {
                url: url.to_owned(),
                body,
                timeout: self.timeout,
            })
            .map_err(|err| {
                if err.is_timeout() {
                    TransportError::Timeout(err.message().to_owned())
                } else {
                    TransportError::Network(err.message().to_owned())
                }
            })?;

        if response.is_success() {
            return serde_json::from_str(&response.body)
                .map_err(|err| TransportError::JsonDecode(err.to_string()).into());
        }

        if response.status == 400 || response.status == 403 {
            if let Ok(fault) = serde_json::from_str::<FaultBody>(&response.body) {
                warn!(code = %fault.code, status = response.status, "service fault returned");
                return Err(DswsError::ServiceFault {
                    code: fault.code,
                    subcode: fault.sub_code,
                    message: fault.message,
                });
            }
            // malformed fault body degrades to a generic status error
        }

        Err(TransportError::Status {
            status: response.status,
        }
        .into())
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}
