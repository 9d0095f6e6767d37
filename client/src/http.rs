//! HTTP transport seam for the Atlas Command client.
//!
//! # Design
//! Requests and responses are described as plain data (`ApiRequest`,
//! `ApiResponse`): method, path relative to the base URL, query pairs,
//! header pairs, and a body that is either empty, JSON, or a multipart
//! upload. The [`Transport`] trait executes one such request; the client
//! never touches the network directly. This keeps every operation testable
//! against a capturing transport while [`HttpTransport`] (reqwest) does the
//! real I/O, including TLS and the per-request timeout.
//!
//! All fields use owned types (`String`, `Vec`, `Bytes`) so requests can be
//! recorded and replayed by test transports without lifetime concerns.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::TransportError;

/// HTTP method for a request. `Patch` covers the API's partial updates;
/// the Atlas endpoints use no other verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A multipart/form-data upload: one binary `file` part plus plain text
/// fields. The part carries its own content type; the transport supplies
/// the form boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
    pub fields: Vec<(String, String)>,
}

/// Request body variants the Atlas API uses.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// An HTTP request described as plain data.
///
/// `path` is relative to the transport's base URL and always starts with
/// `/`. Headers are attached by the client (JSON content type, bearer
/// token); multipart requests rely on the transport for their content type.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ApiResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup; first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Executes one request/response cycle.
///
/// Implementations must be safe for concurrent invocation; the client makes
/// no serialization guarantee beyond what the transport itself provides.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Default transport backed by a [`reqwest::Client`].
///
/// Owns the connection pool for the lifetime of the client; dropping the
/// last handle releases it. The request timeout is fixed at construction
/// and applies to every request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport for `base_url`, trimming trailing slashes, with
    /// `timeout` applied to each request.
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.to_reqwest(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => {
                let part = reqwest::multipart::Part::bytes(form.content)
                    .file_name(form.file_name)
                    .mime_str(&form.content_type)
                    .map_err(|e| TransportError::Other(e.to_string()))?;
                let mut multipart = reqwest::multipart::Form::new().part("file", part);
                for (name, value) in form.fields {
                    multipart = multipart.text(name, value);
                }
                builder.multipart(multipart)
            }
        };

        debug!(method = request.method.as_str(), url = %url, "sending request");
        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(classify_reqwest_error)?;
        debug!(status, bytes = body.len(), "response received");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = ApiResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "video/mp4".to_string())],
            body: Bytes::new(),
        };
        assert_eq!(response.header("content-type"), Some("video/mp4"));
        assert_eq!(response.header("content-length"), None);
    }

    #[test]
    fn success_covers_the_whole_2xx_range() {
        let mut response = ApiResponse {
            status: 200,
            headers: Vec::new(),
            body: Bytes::new(),
        };
        assert!(response.is_success());
        response.status = 204;
        assert!(response.is_success());
        response.status = 300;
        assert!(!response.is_success());
        response.status = 404;
        assert!(!response.is_success());
    }

    #[test]
    fn transport_trims_trailing_slashes() {
        let transport =
            HttpTransport::new("http://localhost:3000///", std::time::Duration::from_secs(1))
                .unwrap();
        assert_eq!(transport.base_url(), "http://localhost:3000");
    }

    #[test]
    fn method_names_match_the_wire() {
        assert_eq!(Method::Get.as_str(), "GET");
        assert_eq!(Method::Patch.as_str(), "PATCH");
    }
}
