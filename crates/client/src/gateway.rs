//! Authorized request gateway.
//!
//! Every call to the remote API goes through [`ApiClient::request`]. It
//! attaches the stored bearer token and treats a 401 as the end of the
//! session: tokens are cleared, the navigator is sent to the entry point
//! and the call fails without looking at the response body.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use villadmin_auth::{Navigator, NoopNavigator, ROOT_ROUTE, Session, TokenStore};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::request::RequestOptions;
use crate::transport::{ApiRequest, HttpTransport, ReqwestTransport};

const UNAUTHORIZED: u16 = 401;

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    tokens: TokenStore,
    transport: Arc<dyn HttpTransport>,
    navigator: Arc<dyn Navigator>,
}

impl core::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client over reqwest with a no-op navigator.
    pub fn new(base_url: impl Into<String>, tokens: TokenStore) -> Self {
        Self {
            base_url: base_url.into(),
            tokens,
            transport: Arc::new(ReqwestTransport::new()),
            navigator: Arc::new(NoopNavigator),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.base_url(), config.token_store())
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Hook invoked with [`ROOT_ROUTE`] when a 401 ends the session.
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }

    pub fn session(&self) -> Session {
        Session::new(self.tokens.clone())
    }

    /// Issue `options` against `base_url + endpoint` and return the parsed
    /// JSON body as-is (no envelope unwrapping).
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut headers = merge_headers(&options)?;
        let authenticated = self.attach_credential(&mut headers)?;

        tracing::debug!(method = %options.method, %url, authenticated, "api request");

        let response = self
            .transport
            .send(ApiRequest {
                method: options.method,
                url,
                headers,
                body: options.body,
            })
            .await?;

        if response.status == UNAUTHORIZED && self.tokens.is_interactive() {
            tracing::warn!(endpoint, "credential rejected; ending session");
            self.tokens.clear();
            self.navigator.navigate(ROOT_ROUTE);
            return Err(ApiError::Unauthorized);
        }

        let success = (200..300).contains(&response.status);
        let data = match parse_body(&response.body) {
            Ok(data) => data,
            Err(err) if success => return Err(ApiError::Parse(err.to_string())),
            Err(_) => Value::Null,
        };

        if !success {
            tracing::error!(
                status = response.status,
                body = %String::from_utf8_lossy(&response.body),
                "API error"
            );
            return Err(ApiError::Http {
                status: response.status,
                message: error_message(&data, response.status),
            });
        }

        Ok(data)
    }

    /// [`request`](Self::request), deserialized into `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let data = self.request(endpoint, options).await?;
        serde_json::from_value(data).map_err(|e| ApiError::Parse(e.to_string()))
    }

    pub async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(endpoint, RequestOptions::get()).await
    }

    pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.request(endpoint, RequestOptions::post().json(body)).await
    }

    pub async fn put(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.request(endpoint, RequestOptions::put().json(body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(endpoint, RequestOptions::delete()).await
    }

    /// Add `Authorization: Bearer ...` when a token is stored. Headless
    /// clients never look one up.
    fn attach_credential(&self, headers: &mut HeaderMap) -> Result<bool, ApiError> {
        if !self.tokens.is_interactive() {
            return Ok(false);
        }
        let Some(token) = self.tokens.access_token() else {
            return Ok(false);
        };

        let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ApiError::InvalidRequest("stored token is not a valid header value".into())
        })?;
        headers.insert(AUTHORIZATION, value);
        Ok(true)
    }
}

/// Defaults, then caller overrides, then caller removals.
fn merge_headers(options: &RequestOptions) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    if !options.body.is_multipart() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    for (name, value) in &options.headers {
        let name = parse_header_name(name)?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ApiError::InvalidRequest(format!("invalid value for header '{name}'")))?;
        headers.insert(name, value);
    }

    for name in &options.removed_headers {
        headers.remove(parse_header_name(name)?);
    }

    Ok(headers)
}

fn parse_header_name(name: &str) -> Result<HeaderName, ApiError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ApiError::InvalidRequest(format!("invalid header name '{name}'")))
}

/// Empty bodies (e.g. 204) read as `null`.
fn parse_body(body: &[u8]) -> Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
}

/// Server-provided `error`, then `message`, then a generic status line.
fn error_message(body: &Value, status: u16) -> String {
    ["error", "message"]
        .iter()
        .filter_map(|key| body.get(key))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_else(|| format!("API request failed with status {status}"))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::request::MultipartForm;
    use crate::transport::TransportResponse;

    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<TransportResponse, ApiError>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn replying(status: u16, body: &str) -> Arc<Self> {
            let transport = Self::default();
            transport.responses.lock().unwrap().push_back(Ok(TransportResponse {
                status,
                body: body.as_bytes().to_vec(),
            }));
            Arc::new(transport)
        }

        fn failing(err: ApiError) -> Arc<Self> {
            let transport = Self::default();
            transport.responses.lock().unwrap().push_back(Err(err));
            Arc::new(transport)
        }

        fn last_request(&self) -> ApiRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: ApiRequest) -> Result<TransportResponse, ApiError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted response left")
        }
    }

    #[derive(Default)]
    struct RecordingNavigator {
        routes: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, route: &str) {
            self.routes.lock().unwrap().push(route.to_string());
        }
    }

    fn logged_in_store() -> TokenStore {
        let store = TokenStore::in_memory();
        store.set("header.payload.sig", Some("refresh-1"));
        store
    }

    fn client(
        tokens: TokenStore,
        transport: Arc<ScriptedTransport>,
    ) -> (ApiClient, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::default());
        let client = ApiClient::new("https://api.example.org", tokens)
            .with_transport(transport)
            .with_navigator(navigator.clone());
        (client, navigator)
    }

    #[tokio::test]
    async fn attaches_bearer_and_default_content_type() {
        let transport = ScriptedTransport::replying(200, r#"{"data":{"id":1}}"#);
        let (client, _) = client(logged_in_store(), transport.clone());

        let body = client.get("/v1/articles").await.unwrap();

        assert_eq!(body, json!({ "data": { "id": 1 } }));
        let sent = transport.last_request();
        assert_eq!(sent.url, "https://api.example.org/v1/articles");
        assert_eq!(sent.headers[AUTHORIZATION], "Bearer header.payload.sig");
        assert_eq!(sent.headers[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn no_token_means_no_authorization_header() {
        let transport = ScriptedTransport::replying(200, "{}");
        let (client, _) = client(TokenStore::in_memory(), transport.clone());

        client.get("/v1/villages").await.unwrap();

        assert!(!transport.last_request().headers.contains_key(AUTHORIZATION));
    }

    #[tokio::test]
    async fn unauthorized_clears_session_and_navigates_home() {
        // Not JSON: proves the body is never parsed.
        let transport = ScriptedTransport::replying(401, "<html>denied</html>");
        let tokens = logged_in_store();
        let (client, navigator) = client(tokens.clone(), transport);

        let err = client.get("/v1/users").await.unwrap_err();

        assert_eq!(err, ApiError::Unauthorized);
        assert_eq!(err.to_string(), "Unauthorized");
        assert_eq!(tokens.access_token(), None);
        assert_eq!(tokens.refresh_token(), None);
        assert_eq!(*navigator.routes.lock().unwrap(), vec!["/"]);
    }

    #[tokio::test]
    async fn headless_401_is_an_ordinary_failure() {
        let transport = ScriptedTransport::replying(401, r#"{"message":"token expired"}"#);
        let (client, navigator) = client(TokenStore::headless(), transport.clone());

        let err = client.get("/v1/users").await.unwrap_err();

        assert_eq!(
            err,
            ApiError::Http {
                status: 401,
                message: "token expired".to_string(),
            }
        );
        assert!(navigator.routes.lock().unwrap().is_empty());
        assert!(!transport.last_request().headers.contains_key(AUTHORIZATION));
    }

    #[tokio::test]
    async fn not_found_uses_server_message() {
        let transport = ScriptedTransport::replying(404, r#"{"message":"not found"}"#);
        let tokens = logged_in_store();
        let (client, navigator) = client(tokens.clone(), transport);

        let err = client.get("/v1/units/9").await.unwrap_err();

        assert_eq!(err.to_string(), "not found");
        assert_eq!(err.status(), Some(404));
        assert!(tokens.access_token().is_some());
        assert!(navigator.routes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_field_wins_over_message() {
        let transport =
            ScriptedTransport::replying(422, r#"{"error":"name required","message":"invalid"}"#);
        let (client, _) = client(logged_in_store(), transport);

        let err = client.post("/v1/categories", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "name required");
    }

    #[tokio::test]
    async fn empty_error_falls_back_to_message() {
        let transport = ScriptedTransport::replying(400, r#"{"error":"","message":"bad input"}"#);
        let (client, _) = client(logged_in_store(), transport);

        let err = client.get("/v1/transactions").await.unwrap_err();
        assert_eq!(err.to_string(), "bad input");
    }

    #[tokio::test]
    async fn unparsable_error_body_uses_generic_message() {
        let transport = ScriptedTransport::replying(500, "Internal Server Error");
        let (client, _) = client(logged_in_store(), transport);

        let err = client.get("/v1/dashboard").await.unwrap_err();
        assert_eq!(err.to_string(), "API request failed with status 500");
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_parse_error() {
        let transport = ScriptedTransport::replying(200, "{not json");
        let (client, _) = client(logged_in_store(), transport);

        let err = client.get("/v1/articles").await.unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let transport = ScriptedTransport::replying(204, "");
        let (client, _) = client(logged_in_store(), transport);

        assert_eq!(client.delete("/v1/articles/3").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn caller_can_override_and_remove_headers() {
        let transport = ScriptedTransport::replying(200, "{}");
        let (client, _) = client(logged_in_store(), transport.clone());

        let options = RequestOptions::post()
            .header("content-type", "text/plain")
            .header("X-Village", "7");
        client.request("/v1/units", options).await.unwrap();
        let sent = transport.last_request();
        assert_eq!(sent.headers[CONTENT_TYPE], "text/plain");
        assert_eq!(sent.headers["x-village"], "7");

        transport.responses.lock().unwrap().push_back(Ok(TransportResponse {
            status: 200,
            body: b"{}".to_vec(),
        }));
        let options = RequestOptions::post().without_header("Content-Type");
        client.request("/v1/units", options).await.unwrap();
        assert!(!transport.last_request().headers.contains_key(CONTENT_TYPE));
    }

    #[tokio::test]
    async fn multipart_omits_default_content_type() {
        let transport = ScriptedTransport::replying(201, r#"{"data":{"id":5}}"#);
        let (client, _) = client(logged_in_store(), transport.clone());

        let form = MultipartForm::new()
            .text("title", "Harvest festival")
            .file("image", "cover.png", Some("image/png"), vec![1, 2, 3]);
        client
            .request("/v1/articles", RequestOptions::post().multipart(form))
            .await
            .unwrap();

        let sent = transport.last_request();
        assert!(!sent.headers.contains_key(CONTENT_TYPE));
        assert_eq!(sent.headers[AUTHORIZATION], "Bearer header.payload.sig");
        assert!(sent.body.is_multipart());
    }

    #[tokio::test]
    async fn invalid_header_name_is_rejected_before_sending() {
        let transport = ScriptedTransport::replying(200, "{}");
        let (client, _) = client(logged_in_store(), transport.clone());

        let err = client
            .request("/v1/units", RequestOptions::get().header("bad header", "x"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn network_failure_propagates_and_keeps_session() {
        let transport = ScriptedTransport::failing(ApiError::Network("connection refused".into()));
        let tokens = logged_in_store();
        let (client, _) = client(tokens.clone(), transport);

        let err = client.get("/v1/articles").await.unwrap_err();

        assert_eq!(err, ApiError::Network("connection refused".to_string()));
        assert!(tokens.access_token().is_some());
    }

    #[tokio::test]
    async fn request_json_deserializes_body() {
        #[derive(serde::Deserialize)]
        struct Village {
            name: String,
        }

        let transport = ScriptedTransport::replying(200, r#"{"name":"Butuh Kidul"}"#);
        let (client, _) = client(logged_in_store(), transport);

        let village: Village = client
            .request_json("/v1/village", RequestOptions::get())
            .await
            .unwrap();
        assert_eq!(village.name, "Butuh Kidul");
    }
}
