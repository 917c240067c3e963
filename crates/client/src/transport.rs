//! HTTP transport seam.
//!
//! The gateway only needs `request -> status + body bytes`. Production uses
//! reqwest; tests plug in a scripted implementation.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;

use crate::error::ApiError;
use crate::request::{FormPart, MultipartForm, RequestBody};

/// Fully prepared request, headers already merged and credentialed.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Raw response. The body is left unparsed so the gateway decides whether
/// to parse it at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<TransportResponse, ApiError>;
}

/// reqwest-backed transport. Timeouts are reqwest's defaults.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<TransportResponse, ApiError> {
        let builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);

        // Raw bytes rather than `.json()` so a caller-removed Content-Type
        // stays removed.
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(
                serde_json::to_vec(&value).map_err(|e| ApiError::InvalidRequest(e.to_string()))?,
            ),
            RequestBody::Multipart(form) => builder.multipart(to_reqwest_form(form)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn to_reqwest_form(form: MultipartForm) -> Result<reqwest::multipart::Form, ApiError> {
    let mut out = reqwest::multipart::Form::new();
    for part in form.parts {
        out = match part {
            FormPart::Text { name, value } => out.text(name, value),
            FormPart::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                let mut file = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
                if let Some(content_type) = content_type {
                    file = file
                        .mime_str(&content_type)
                        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                }
                out.part(name, file)
            }
        };
    }
    Ok(out)
}
