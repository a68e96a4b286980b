use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::TransportError;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Something that can carry an [`ApiRequest`] to the backend.
///
/// Implementations never panic and never leak transport exceptions; every
/// failure comes back as a [`TransportError`] the envelope decoder accepts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormContent {
    Text(String),
    File {
        filename: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub content: FormContent,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// Multipart payload; the transport picks the content type and boundary.
    Form(Vec<FormPart>),
}

impl RequestBody {
    pub fn is_form(&self) -> bool {
        matches!(self, RequestBody::Form(_))
    }
}

/// Per-call overrides, applied after the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    /// Drop the default `Content-Type` even for JSON bodies.
    pub omit_content_type: bool,
}

impl RequestOptions {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

/// A backend call described independently of the HTTP stack.
///
/// The path is kept as raw segments so keys such as config names or account
/// aliases are percent-encoded by the transport, not by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub body: RequestBody,
    pub options: RequestOptions,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        let segments = path
            .trim_start_matches('/')
            .split('/')
            .map(str::to_string)
            .collect();
        Self {
            method,
            segments,
            body: RequestBody::Empty,
            options: RequestOptions::default(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Appends one path segment, taken literally.
    pub fn segment(mut self, segment: impl ToString) -> Self {
        self.segments.push(segment.to_string());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Form(parts);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Unencoded path, for logs and matching.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub fn effective_method(&self) -> Method {
        self.options.method.clone().unwrap_or_else(|| self.method.clone())
    }

    /// Headers in merge order: method defaults, then caller headers, then
    /// caller options. Form bodies never get a default content type.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !self.body.is_form() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }

        for (name, value) in &self.options.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Skipping invalid header {}: {}", name, value),
            }
        }

        if self.options.omit_content_type {
            headers.remove(CONTENT_TYPE);
        }
        headers
    }
}

/// reqwest-backed transport rooted at the configured base URL.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            TransportError::Request(format!("Invalid base URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::Request(format!(
                "Base URL '{}' cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Value, TransportError> {
        self.send(ApiRequest::get(path).with_options(options)).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<Value, TransportError> {
        let mut request = ApiRequest::post(path).with_options(options);
        request.body = body;
        self.send(request).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<Value, TransportError> {
        let mut request = ApiRequest::put(path).with_options(options);
        request.body = body;
        self.send(request).await
    }

    pub async fn delete(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Value, TransportError> {
        self.send(ApiRequest::delete(path).with_options(options)).await
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        // Only the last segment may be empty (trailing slash); dot segments
        // would be normalized away by the url crate.
        let last = request.segments.len().saturating_sub(1);
        for (index, segment) in request.segments.iter().enumerate() {
            if segment == "." || segment == ".." || (segment.is_empty() && index != last) {
                return Err(TransportError::Request(format!(
                    "Invalid path segment in {}",
                    request.path()
                )));
            }
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                TransportError::Request(format!("Base URL '{}' cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(&request.segments);

        if !request.options.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.options.query);
        }
        Ok(url)
    }

    fn build_form(parts: Vec<FormPart>) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for part in parts {
            form = match part.content {
                FormContent::Text(text) => form.text(part.name, text),
                FormContent::File {
                    filename,
                    mime,
                    bytes,
                } => {
                    let mut file = Part::bytes(bytes).file_name(filename);
                    if let Some(mime) = mime {
                        file = file.mime_str(&mime).map_err(|e| {
                            TransportError::Request(format!("Invalid form part: {}", e))
                        })?;
                    }
                    form.part(part.name, file)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let request_id = Uuid::new_v4();
        let method = request.effective_method();
        let url = self.url_for(&request)?;
        let headers = request.headers();

        debug!(%request_id, %method, %url, "Sending request");

        let mut builder = self.client.request(method, url).headers(headers);
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.body(body.to_string()),
            RequestBody::Form(parts) => builder.multipart(Self::build_form(parts)?),
        };

        let resp = builder.send().await.map_err(|e| {
            debug!(%request_id, "Request failed: {}", e);
            TransportError::Network(e.to_string())
        })?;

        let status = resp.status();
        if !status.is_success() {
            debug!(%request_id, %status, "Non-success status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| TransportError::Decode(format!("Invalid JSON response: {}", e)))
    }
}
