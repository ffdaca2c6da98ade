//! HTTP transport layer.
//!
//! [`Transport`] owns the `reqwest` client and performs one logical request:
//! URL resolution, header merging, body encoding, credential injection and
//! response decoding, with every attempt driven through the [`RetryPolicy`].

use crate::config::ZscalerConfig;
use crate::errors::{ZscalerError, ZscalerResult};
use crate::keycase::KeyCaseTranslator;
use crate::observability::TracingHooks;
use crate::resilience::{
    classify_status, classify_transport_error, parse_retry_after, Classification, Failure,
    RetryPolicy,
};
use crate::types::{RateLimitInfo, Record};
use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use pin_project::pin_project;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use url::Url;

const APPLICATION_JSON: &str = "application/json";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Header carrying the client-connector session token.
pub const AUTH_TOKEN_HEADER: &str = "auth-token";

/// How a session token travels on outgoing requests.
#[derive(Debug, Clone)]
pub enum Injection {
    /// `Authorization: Bearer <token>`.
    Bearer(SecretString),
    /// `auth-token: <token>`.
    AuthToken(SecretString),
    /// `Cookie: <pairs>` as captured from the login response.
    Cookie(SecretString),
    /// A query parameter on every request.
    Query {
        /// Parameter name.
        name: String,
        /// Parameter value.
        value: SecretString,
    },
    /// A top-level field added to every JSON body.
    Body {
        /// Field name, as sent on the wire.
        name: String,
        /// Field value.
        value: SecretString,
    },
}

impl Injection {
    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Bearer(token) => builder.bearer_auth(token.expose_secret()),
            Self::AuthToken(token) => builder.header(AUTH_TOKEN_HEADER, token.expose_secret()),
            Self::Cookie(pairs) => builder.header(COOKIE, pairs.expose_secret()),
            Self::Query { name, value } => {
                builder.query(&[(name.as_str(), value.expose_secret().as_str())])
            }
            Self::Body { .. } => builder,
        }
    }

    fn apply_to_body(&self, body: &mut Value) {
        if let (Self::Body { name, value }, Value::Object(map)) = (self, body) {
            map.insert(name.clone(), Value::String(value.expose_secret().clone()));
        }
    }
}

/// One part of a multipart upload.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    /// Form field name.
    pub name: String,
    /// File name reported to the server.
    pub file_name: Option<String>,
    /// MIME type of the part.
    pub content_type: Option<String>,
    /// Part content.
    pub data: Bytes,
}

/// Multipart form body, rebuilt for every attempt.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    parts: Vec<MultipartPart>,
}

impl MultipartBody {
    /// Creates an empty multipart body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: Bytes::from(value.into()),
        });
        self
    }

    /// Adds a file part.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(MultipartPart {
            name: name.into(),
            file_name: Some(file_name.into()),
            content_type: Some(content_type.into()),
            data: data.into(),
        });
        self
    }

    /// The parts in insertion order.
    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    fn to_form(&self) -> ZscalerResult<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            let mut p = reqwest::multipart::Part::bytes(part.data.to_vec());
            if let Some(ref file_name) = part.file_name {
                p = p.file_name(file_name.clone());
            }
            if let Some(ref content_type) = part.content_type {
                p = p.mime_str(content_type).map_err(|e| {
                    ZscalerError::configuration(format!(
                        "Invalid content type '{}' for part '{}'",
                        content_type, part.name
                    ))
                    .with_cause(e)
                })?;
            }
            form = form.part(part.name.clone(), p);
        }
        Ok(form)
    }
}

/// Request body variants.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// JSON body; keys are translated to wire case unless disabled.
    Json(Value),
    /// `application/x-www-form-urlencoded` body.
    Form(Vec<(String, String)>),
    /// Multipart form.
    Multipart(MultipartBody),
    /// Raw bytes with an explicit content type.
    Bytes {
        /// Payload.
        data: Bytes,
        /// `Content-Type` header value.
        content_type: String,
    },
}

/// A request as composed by a resource method.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the service base URL, or an absolute URL.
    pub path: String,
    /// Query parameters, as sent.
    pub query: Vec<(String, String)>,
    /// Per-call headers; these win over defaults.
    pub headers: HeaderMap,
    /// Request body.
    pub body: RequestBody,
    /// Return the body as a byte stream instead of buffering it.
    pub stream: bool,
    /// Translate JSON response keys to snake_case.
    pub translate: bool,
    /// Translate JSON request body keys to wire case.
    pub translate_body: bool,
    /// Per-request timeout override.
    pub timeout: Option<Duration>,
    /// Per-request retry policy override.
    pub retry: Option<RetryPolicy>,
}

impl ApiRequest {
    /// Creates a request with defaults: no body, buffered, translated.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            stream: false,
            translate: true,
            translate_body: true,
            timeout: None,
            retry: None,
        }
    }

    /// GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Adds a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Adds a header; invalid names or values are rejected at send time.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Sets a form body.
    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(pairs);
        self
    }

    /// Sets a multipart body.
    pub fn multipart(mut self, body: MultipartBody) -> Self {
        self.body = RequestBody::Multipart(body);
        self
    }

    /// Sets a raw binary body.
    pub fn bytes(mut self, data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        self.body = RequestBody::Bytes {
            data: data.into(),
            content_type: content_type.into(),
        };
        self
    }

    /// Streams the response body instead of buffering it.
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Leaves response keys as sent by the server.
    pub fn raw_keys(mut self) -> Self {
        self.translate = false;
        self
    }

    /// Sends the JSON body without key translation.
    pub fn verbatim_body(mut self) -> Self {
        self.translate_body = false;
        self
    }

    /// Overrides the timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the retry policy for this request.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

/// Response body variants.
pub enum ResponseBody {
    /// No content.
    Empty,
    /// Parsed JSON body.
    Json(Record),
    /// Buffered non-JSON body.
    Raw(Bytes),
    /// Unbuffered body.
    Stream(ByteStream),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Json(record) => write!(f, "Json({:?})", record),
            Self::Raw(bytes) => write!(f, "Raw({} bytes)", bytes.len()),
            Self::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// Response envelope.
#[derive(Debug)]
pub struct ApiResponse {
    status: u16,
    headers: HeaderMap,
    body: ResponseBody,
    rate_limit: Option<RateLimitInfo>,
}

impl ApiResponse {
    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Rate-limit headers, when the server sent any.
    pub fn rate_limit(&self) -> Option<&RateLimitInfo> {
        self.rate_limit.as_ref()
    }

    /// Borrows the body.
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Returns the JSON body as a record; an empty body is a `null` record.
    pub fn into_record(self) -> ZscalerResult<Record> {
        match self.body {
            ResponseBody::Json(record) => Ok(record),
            ResponseBody::Empty => Ok(Record::default()),
            ResponseBody::Raw(bytes) => Err(ZscalerError::protocol(format!(
                "Expected a JSON body, got {} bytes of {}",
                bytes.len(),
                self.headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown content")
            ))
            .with_status(self.status)),
            ResponseBody::Stream(_) => Err(ZscalerError::protocol(
                "Expected a JSON body, got a streaming response",
            )),
        }
    }

    /// Returns the body as bytes, draining a stream if needed.
    pub async fn into_bytes(self) -> ZscalerResult<Bytes> {
        match self.body {
            ResponseBody::Empty => Ok(Bytes::new()),
            ResponseBody::Raw(bytes) => Ok(bytes),
            ResponseBody::Json(record) => Ok(Bytes::from(serde_json::to_vec(record.as_value())?)),
            ResponseBody::Stream(mut stream) => {
                let mut buf = Vec::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(Bytes::from(buf))
            }
        }
    }

    /// Returns the streaming body.
    pub fn into_stream(self) -> ZscalerResult<ByteStream> {
        match self.body {
            ResponseBody::Stream(stream) => Ok(stream),
            ResponseBody::Raw(bytes) => Ok(ByteStream::new(futures::stream::once(async {
                Ok(bytes)
            }))),
            ResponseBody::Empty => Ok(ByteStream::new(futures::stream::empty())),
            ResponseBody::Json(_) => Err(ZscalerError::protocol(
                "Response was buffered as JSON; request it with streaming()",
            )),
        }
    }
}

/// Byte stream for streaming downloads.
#[pin_project]
pub struct ByteStream {
    #[pin]
    inner: Pin<Box<dyn Stream<Item = ZscalerResult<Bytes>> + Send>>,
}

impl ByteStream {
    /// Creates a new byte stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = ZscalerResult<Bytes>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Copies the stream into `writer`, returning the number of bytes written.
    pub async fn copy_to<W>(mut self, writer: &mut W) -> ZscalerResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        while let Some(chunk) = self.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await.map_err(|e| {
                ZscalerError::protocol(format!("Failed to write download: {}", e)).with_cause(e)
            })?;
            written += chunk.len() as u64;
        }
        writer.flush().await.map_err(|e| {
            ZscalerError::protocol(format!("Failed to flush download: {}", e)).with_cause(e)
        })?;
        Ok(written)
    }
}

impl Stream for ByteStream {
    type Item = ZscalerResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        this.inner.poll_next(cx)
    }
}

/// Resolves `path` against `base`; absolute URLs pass through.
pub fn resolve_url(base: &str, path: &str) -> ZscalerResult<Url> {
    let raw = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else if path.is_empty() {
        base.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };

    Url::parse(&raw).map_err(|e| {
        ZscalerError::configuration(format!("Invalid request URL '{}': {}", raw, e)).with_cause(e)
    })
}

/// HTTP transport bound to one client configuration.
#[derive(Debug, Clone)]
pub struct Transport {
    http: Client,
    translator: Arc<KeyCaseTranslator>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Transport {
    /// Creates a transport from configuration.
    pub fn new(config: &ZscalerConfig) -> ZscalerResult<Self> {
        let http = Client::builder()
            .read_timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool.max_idle_per_host)
            .pool_idle_timeout(config.pool.idle_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                ZscalerError::configuration(format!("Failed to create HTTP client: {}", e))
                    .with_cause(e)
            })?;

        let translator = config
            .key_overrides
            .iter()
            .fold(KeyCaseTranslator::default(), |t, (snake, camel)| {
                t.with_override(snake.clone(), camel.clone())
            });

        Ok(Self {
            http,
            translator: Arc::new(translator),
            retry: RetryPolicy::from_config(&config.retry),
            cancel: config.cancellation.clone(),
        })
    }

    /// The key-case translator in use.
    pub fn translator(&self) -> &KeyCaseTranslator {
        &self.translator
    }

    /// The default retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Sends `request`, resolving relative paths against `base_url`.
    pub async fn send(
        &self,
        base_url: &str,
        injection: Option<&Injection>,
        mut request: ApiRequest,
    ) -> ZscalerResult<ApiResponse> {
        let url = resolve_url(base_url, &request.path)?;
        let path = request.path.clone();

        if let RequestBody::Json(ref mut body) = request.body {
            if request.translate_body {
                *body = self.translator.to_wire(std::mem::take(body));
            }
            if let Some(injection) = injection {
                injection.apply_to_body(body);
            }
        }

        let policy = request.retry.clone().unwrap_or_else(|| self.retry.clone());
        let label = format!("{} {}", request.method, path);
        let request = &request;
        let url = &url;

        policy
            .execute(&label, &self.cancel, |_| self.attempt(request, url, injection))
            .await
            .map_err(|e| {
                TracingHooks::on_request_error(request.method.as_str(), url.as_str(), &e);
                if e.path().is_none() {
                    e.with_path(path)
                } else {
                    e
                }
            })
    }

    fn build(
        &self,
        request: &ApiRequest,
        url: &Url,
        injection: Option<&Injection>,
    ) -> ZscalerResult<RequestBuilder> {
        let mut builder = self.http.request(request.method.clone(), url.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder.header(CONTENT_TYPE, APPLICATION_JSON),
            RequestBody::Json(body) => builder
                .header(CONTENT_TYPE, APPLICATION_JSON)
                .body(serde_json::to_vec(body)?),
            RequestBody::Form(pairs) => {
                let encoded = serde_urlencoded::to_string(pairs).map_err(|e| {
                    ZscalerError::configuration(format!("Failed to encode form body: {}", e))
                        .with_cause(e)
                })?;
                builder.header(CONTENT_TYPE, FORM_URLENCODED).body(encoded)
            }
            RequestBody::Multipart(body) => builder.multipart(body.to_form()?),
            RequestBody::Bytes { data, content_type } => builder
                .header(CONTENT_TYPE, content_type.as_str())
                .body(data.clone()),
        };

        if let Some(injection) = injection {
            builder = injection.apply(builder);
        }

        if !request.headers.is_empty() {
            builder = builder.headers(request.headers.clone());
        }

        // Total deadline, body included.
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(builder)
    }

    async fn attempt(
        &self,
        request: &ApiRequest,
        url: &Url,
        injection: Option<&Injection>,
    ) -> Result<ApiResponse, Failure> {
        let builder = self
            .build(request, url, injection)
            .map_err(Failure::Permanent)?;

        let method = request.method.as_str();
        TracingHooks::on_request_start(method, url.as_str(), &request.headers);
        let start = Instant::now();

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let transient = classify_transport_error(&e) == Classification::Transient;
                let error = ZscalerError::protocol(format!("Request failed: {}", e))
                    .with_path(request.path.clone())
                    .with_cause(e);
                return Err(if transient {
                    Failure::Transient {
                        error,
                        retry_after: None,
                    }
                } else {
                    Failure::Permanent(error)
                });
            }
        };

        let status = response.status().as_u16();
        TracingHooks::on_request_complete(method, url.as_str(), status, start.elapsed());

        match classify_status(status) {
            Classification::Success => self.read(response, request).await,
            Classification::Transient => {
                let retry_after = parse_retry_after(response.headers());
                let body = response.text().await.unwrap_or_default();
                Err(Failure::Transient {
                    error: ZscalerError::server(status, body).with_path(request.path.clone()),
                    retry_after,
                })
            }
            Classification::Permanent => {
                let body = response.text().await.unwrap_or_default();
                Err(Failure::Permanent(
                    ZscalerError::server(status, body).with_path(request.path.clone()),
                ))
            }
        }
    }

    async fn read(&self, response: Response, request: &ApiRequest) -> Result<ApiResponse, Failure> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let rate_limit = RateLimitInfo::from_headers(&headers);
        if let Some(ref info) = rate_limit {
            TracingHooks::on_rate_limit(info);
        }

        if request.stream {
            let stream = response.bytes_stream().map(|chunk| {
                chunk.map_err(|e| {
                    ZscalerError::protocol(format!("Stream error: {}", e)).with_cause(e)
                })
            });
            return Ok(ApiResponse {
                status,
                headers,
                body: ResponseBody::Stream(ByteStream::new(stream)),
                rate_limit,
            });
        }

        let bytes = response.bytes().await.map_err(|e| Failure::Transient {
            error: ZscalerError::protocol(format!("Failed to read response body: {}", e))
                .with_status(status)
                .with_path(request.path.clone())
                .with_cause(e),
            retry_after: None,
        })?;

        let body = if bytes.is_empty() {
            ResponseBody::Empty
        } else if is_json(&headers, &bytes) {
            let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
                Failure::Permanent(
                    ZscalerError::from(e)
                        .with_status(status)
                        .with_path(request.path.clone()),
                )
            })?;
            let value = if request.translate {
                self.translator.from_wire(value)
            } else {
                value
            };
            ResponseBody::Json(Record::new(value))
        } else {
            ResponseBody::Raw(bytes)
        };

        Ok(ApiResponse {
            status,
            headers,
            body,
            rate_limit,
        })
    }
}

fn is_json(headers: &HeaderMap, bytes: &[u8]) -> bool {
    match headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some(content_type) => content_type.contains("json"),
        None => matches!(
            bytes.iter().find(|b| !b.is_ascii_whitespace()),
            Some(b'{') | Some(b'[')
        ),
    }
}
